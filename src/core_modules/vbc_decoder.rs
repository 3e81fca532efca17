// THEORY:
// The `VbcDecoder` demodulates vibration pulses from a stream of raw amplitude
// samples. It is the one-dimensional sibling of the VLC decoder and walks the same
// Idle -> Sync -> Data machine, but its "detection" is an envelope follower instead
// of blob analysis:
//
// 1.  **Preprocessing**: every sample has the noise threshold subtracted (saturating
//     at zero) and is pushed into a 9-slot `EnvelopeWindow`. The window maximum is the
//     envelope, a cheap peak-hold that bridges the zero crossings of the motor signal.
// 2.  **Sync**: the preamble is a fixed number of pulse symbols. The first symbol
//     calibrates the peak amplitude and rejects glitches that die out before a full
//     period. The third symbol nudges the sample counter back into alignment when the
//     pulse falls off early. Symbol boundaries fire when the counter exceeds the period.
// 3.  **Data**: envelope values are queued; every `period + 1` samples the queue mean is
//     sliced at half the calibrated peak into a bit.
//
// All arithmetic is integer. `decode` never fails on well-formed state, so it returns a
// plain `VbcDecision`.

use crate::config::VbcConfig;
use crate::core_modules::envelope_window::EnvelopeWindow;
use crate::error::{DecodeError, Result};
use tracing::debug;

pub const DEFAULT_SYNC_SYMBOLS: u32 = 4;
pub const DEFAULT_DATA_SYMBOLS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VbcState {
    #[default]
    Idle,
    Sync,
    Data,
}

impl From<VbcState> for u8 {
    fn from(state: VbcState) -> u8 {
        match state {
            VbcState::Idle => 0,
            VbcState::Sync => 1,
            VbcState::Data => 2,
        }
    }
}

impl TryFrom<u8> for VbcState {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(VbcState::Idle),
            1 => Ok(VbcState::Sync),
            2 => Ok(VbcState::Data),
            other => Err(DecodeError::UnknownState(other)),
        }
    }
}

/// Outcome of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbcDecision {
    /// A symbol boundary was reached; carries 0 or 1.
    Bit(u8),
    NoDecision,
}

impl VbcDecision {
    pub fn bit(self) -> Option<u8> {
        match self {
            VbcDecision::Bit(bit) => Some(bit),
            VbcDecision::NoDecision => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VbcDecoder {
    threshold: u32,
    period: u32,
    sync_symbols: u32,
    data_symbols: u32,

    state: VbcState,
    window: EnvelopeWindow,
    /// Envelope values of the current symbol. Besides every symbol boundary it
    /// is also cleared on the glitch reset and the third-symbol realignment, so
    /// it never holds more than `period + 1` values.
    queue: Vec<u32>,
    peak: u32,
    sample_count: u32,
    symbol_count: u32,
}

impl VbcDecoder {
    pub fn new(threshold: u32, period: u32) -> Result<Self> {
        if period == 0 {
            return Err(DecodeError::invalid("symbol period must be at least one sample"));
        }
        Ok(Self {
            threshold,
            period,
            sync_symbols: DEFAULT_SYNC_SYMBOLS,
            data_symbols: DEFAULT_DATA_SYMBOLS,
            state: VbcState::Idle,
            window: EnvelopeWindow::new(),
            queue: Vec::with_capacity(period as usize + 1),
            peak: 0,
            sample_count: 0,
            symbol_count: 0,
        })
    }

    pub fn from_config(config: &VbcConfig) -> Result<Self> {
        Self::new(config.threshold, config.period)?
            .with_symbol_quotas(config.sync_symbols, config.data_symbols)
    }

    pub fn with_symbol_quotas(mut self, sync_symbols: u32, data_symbols: u32) -> Result<Self> {
        if sync_symbols == 0 || data_symbols == 0 {
            return Err(DecodeError::invalid("symbol quotas must be positive"));
        }
        self.sync_symbols = sync_symbols;
        self.data_symbols = data_symbols;
        Ok(self)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn state(&self) -> VbcState {
        self.state
    }

    pub fn peak(&self) -> u32 {
        self.peak
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn symbol_count(&self) -> u32 {
        self.symbol_count
    }

    pub fn window(&self) -> &EnvelopeWindow {
        &self.window
    }

    /// Envelope values queued for the symbol in progress.
    pub fn queued(&self) -> &[u32] {
        &self.queue
    }

    pub fn decode(&mut self, sample: u32) -> VbcDecision {
        self.window.push(sample.saturating_sub(self.threshold));
        let envelope = self.window.max();

        match self.state {
            VbcState::Idle => {
                self.process_idle(envelope);
                VbcDecision::NoDecision
            }
            VbcState::Sync => {
                self.process_sync(envelope);
                VbcDecision::NoDecision
            }
            VbcState::Data => self.process_data(envelope),
        }
    }

    fn process_idle(&mut self, envelope: u32) {
        if envelope == 0 {
            return;
        }
        debug!(envelope, "sync start");
        self.queue.clear();
        self.sample_count = 0;
        self.symbol_count = 0;
        self.peak = 0;
        self.state = VbcState::Sync;
    }

    fn process_sync(&mut self, envelope: u32) {
        self.sample_count += 1;
        self.queue.push(envelope);

        match self.symbol_count {
            0 => {
                if envelope > self.peak {
                    self.peak = envelope;
                } else if envelope == 0 && self.sample_count < self.period {
                    // Pulse died before a full symbol: a glitch, not a preamble.
                    self.sample_count = 0;
                    self.peak = 0;
                    self.queue.clear();
                }
            }
            2 => {
                if envelope <= self.peak / 2 && self.sample_count < self.period / 2 {
                    self.sample_count = 0;
                    self.queue.clear();
                }
            }
            _ => {}
        }

        if self.sample_count > self.period {
            self.sample_count = 0;
            self.symbol_count += 1;
            self.queue.clear();
        }

        if self.symbol_count >= self.sync_symbols {
            debug!(peak = self.peak, "sync locked");
            self.sample_count = 0;
            self.symbol_count = 0;
            self.queue.clear();
            self.state = VbcState::Data;
        }
    }

    fn process_data(&mut self, envelope: u32) -> VbcDecision {
        self.queue.push(envelope);
        if self.queue.len() <= self.period as usize {
            return VbcDecision::NoDecision;
        }

        let sum: u64 = self.queue.iter().map(|&v| u64::from(v)).sum();
        let mean = sum / self.queue.len() as u64;
        self.queue.clear();
        self.symbol_count += 1;

        let bit = u8::from(mean > u64::from(self.peak / 2));
        debug!(symbol = self.symbol_count, mean, bit, "vbc bit");

        if self.symbol_count >= self.data_symbols {
            self.sample_count = 0;
            self.symbol_count = 0;
            self.peak = 0;
            self.state = VbcState::Idle;
        }
        VbcDecision::Bit(bit)
    }
}
