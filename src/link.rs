// THEORY:
// A link is the execution context a decoder lives on. It owns one decoder outright,
// pulls input from one source channel, calls `decode` once per unit of input and pushes
// whatever comes out (raw bits, assembled values, preview frames) to the host over a
// second channel. The decoders themselves stay synchronous and know nothing about
// tasks; all concurrency is here.
//
// A link ends when its source runs dry, when the host drops the event receiver, when a
// decode call fails, or (VBC only) after the first assembled value if asked to. The
// join handle hands the decoder back so the host can inspect or reuse it.

use crate::assembler::BitAssembler;
use crate::core_modules::vbc_decoder::{VbcDecision, VbcDecoder};
use crate::core_modules::vlc_decoder::VlcDecoder;
use crate::error::Result;
use crate::source::CHANNEL_CAPACITY;
use image::GrayImage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Bits released by one decode call.
    Bits(Vec<u8>),
    /// A completed fixed-width value.
    Value(u32),
    /// The frame as it left the decoder, ROI outlines included.
    Preview(GrayImage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlcLinkOptions {
    pub value_bits: u32,
    pub emit_preview: bool,
}

impl Default for VlcLinkOptions {
    fn default() -> Self {
        Self {
            value_bits: 8,
            emit_preview: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbcLinkOptions {
    pub value_bits: u32,
    pub stop_after_value: bool,
}

impl Default for VbcLinkOptions {
    fn default() -> Self {
        Self {
            value_bits: 8,
            stop_after_value: true,
        }
    }
}

pub type LinkHandle<D> = JoinHandle<Result<D>>;

/// Moves `decoder` onto its own task fed by `frames`.
pub fn spawn_vlc_link(
    decoder: VlcDecoder,
    frames: mpsc::Receiver<GrayImage>,
    options: VlcLinkOptions,
) -> Result<(mpsc::Receiver<LinkEvent>, LinkHandle<VlcDecoder>)> {
    let assembler = BitAssembler::new(options.value_bits)?;
    let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(run_vlc_link(
        decoder,
        frames,
        assembler,
        options.emit_preview,
        events_tx,
    ));
    Ok((events_rx, handle))
}

/// Moves `decoder` onto its own task fed by `samples`.
pub fn spawn_vbc_link(
    decoder: VbcDecoder,
    samples: mpsc::Receiver<u32>,
    options: VbcLinkOptions,
) -> Result<(mpsc::Receiver<LinkEvent>, LinkHandle<VbcDecoder>)> {
    let assembler = BitAssembler::new(options.value_bits)?;
    let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(run_vbc_link(
        decoder,
        samples,
        assembler,
        options.stop_after_value,
        events_tx,
    ));
    Ok((events_rx, handle))
}

async fn run_vlc_link(
    mut decoder: VlcDecoder,
    mut frames: mpsc::Receiver<GrayImage>,
    mut assembler: BitAssembler,
    emit_preview: bool,
    events: mpsc::Sender<LinkEvent>,
) -> Result<VlcDecoder> {
    'frames: while let Some(mut frame) = frames.recv().await {
        let output = decoder.decode(&mut frame)?;

        if emit_preview && events.send(LinkEvent::Preview(frame)).await.is_err() {
            break;
        }
        if output.bits.is_empty() {
            continue;
        }

        let values = assembler.extend(output.bits.iter().copied());
        if events.send(LinkEvent::Bits(output.bits)).await.is_err() {
            break;
        }
        for value in values {
            info!(value, "vlc value assembled");
            if events.send(LinkEvent::Value(value)).await.is_err() {
                break 'frames;
            }
        }
    }
    debug!(state = ?decoder.state(), "vlc link finished");
    Ok(decoder)
}

async fn run_vbc_link(
    mut decoder: VbcDecoder,
    mut samples: mpsc::Receiver<u32>,
    mut assembler: BitAssembler,
    stop_after_value: bool,
    events: mpsc::Sender<LinkEvent>,
) -> Result<VbcDecoder> {
    while let Some(sample) = samples.recv().await {
        let VbcDecision::Bit(bit) = decoder.decode(sample) else {
            continue;
        };
        if events.send(LinkEvent::Bits(vec![bit])).await.is_err() {
            break;
        }
        let Some(value) = assembler.push(bit) else {
            continue;
        };
        info!(value, "vbc value assembled");
        if events.send(LinkEvent::Value(value)).await.is_err() || stop_after_value {
            break;
        }
    }
    debug!(state = ?decoder.state(), "vbc link finished");
    Ok(decoder)
}
