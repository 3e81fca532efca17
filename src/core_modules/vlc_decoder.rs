// THEORY:
// The `VlcDecoder` is the temporal engine of the optical receiver. It watches a camera
// stream one frame at a time and walks a three-state machine:
//
// 1.  **Idle**: difference the current frame against the previous one, clean the
//     mask with morphology and count blobs. A frame whose blob count equals the
//     number of transmitters is the start of a sync preamble.
// 2.  **Sync**: keep detecting. Every frame that still shows exactly one blob per
//     transmitter is folded into two running sums: the raw frames (the average becomes
//     the background brightness) and the rasterised blobs (their union becomes the
//     ROI map). After enough matching frames the ROI map is re-detected; if it yields
//     one region per transmitter, those regions become fixed `RoiBlock`s and the
//     average background inside each becomes its on/off baseline.
// 3.  **Data**: every ROI is sliced against its baseline into a bit. One ROI is the
//     clock; payload bits are released only on its rising edge. After a fixed number
//     of data frames the machine returns to Idle.
//
// Failure handling is built into the machine rather than surfaced as errors: frames
// that fail detection bump a consecutive-empty counter, and once that counter passes
// the idle threshold any state is abandoned for Idle. Only malformed input (empty or
// resized frames, inconsistent parameters) is reported to the caller.
//
// As a convenience for live previews, each call draws the outline of every confirmed
// ROI onto the caller's frame after the clean copy has been stored.

use crate::config::VlcConfig;
use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::blob_detector::find_blobs;
use crate::core_modules::imaging::{
    FloatImage, abs_diff, accumulate, dilate, draw_rect_outline, ensure_not_empty, erode,
    fill_convex, gaussian_blur_5x5, mean_in_rect, mean_in_rect_f32, saturate_to_gray, scale,
    threshold_binary,
};
use crate::core_modules::roi_block::RoiBlock;
use crate::error::{DecodeError, Result};
use image::GrayImage;
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const DEFAULT_THRESHOLD: u8 = 128;
pub const DEFAULT_IDLE_FRAMES: u32 = 10;
pub const DEFAULT_SYNC_FRAMES: u32 = 20;
pub const DEFAULT_DATA_FRAMES: u32 = 60;

/// Side of the square structuring element used to clean the difference mask.
const FILTER_SIZE: u32 = 5;
/// Level at which blobs are rasterised into the sync accumulator.
const SYNC_BLOB_LEVEL: u8 = 10;
const OVERLAY_LEVEL: u8 = 255;

/// Optical demodulation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderType {
    /// One transmitter per spatial region, one symbol per frame.
    Mimo,
    /// Rolling-shutter stripe decoding. Declared but not implemented.
    RollingShutter,
}

impl DecoderType {
    pub fn ensure_supported(self) -> Result<Self> {
        match self {
            DecoderType::Mimo => Ok(self),
            DecoderType::RollingShutter => Err(DecodeError::UnknownDecoderType(
                "rolling_shutter has no implementation".to_string(),
            )),
        }
    }
}

impl FromStr for DecoderType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mimo" => Ok(DecoderType::Mimo),
            "rolling_shutter" => Ok(DecoderType::RollingShutter),
            other => Err(DecodeError::UnknownDecoderType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VlcState {
    #[default]
    Idle,
    Sync,
    Data,
}

impl From<VlcState> for u8 {
    fn from(state: VlcState) -> u8 {
        match state {
            VlcState::Idle => 0,
            VlcState::Sync => 1,
            VlcState::Data => 2,
        }
    }
}

impl TryFrom<u8> for VlcState {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(VlcState::Idle),
            1 => Ok(VlcState::Sync),
            2 => Ok(VlcState::Data),
            other => Err(DecodeError::UnknownState(other)),
        }
    }
}

/// Result of one `decode` call. `bits` holds the payload bits released on a
/// clock rising edge, in ROI order with the clock removed; it is empty otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlcOutput {
    pub bits: Vec<u8>,
}

pub struct VlcDecoder {
    decoder_type: DecoderType,
    threshold: u8,
    data_width: usize,
    clock_index: usize,
    idle_frames: u32,
    sync_frames: u32,
    data_frames: u32,

    state: VlcState,
    prev_frame: Option<GrayImage>,
    /// Running sum of raw frames during sync.
    background: Option<FloatImage>,
    /// Running sum of rasterised blobs during sync.
    sync_image: Option<FloatImage>,
    rois: Vec<RoiBlock>,
    /// Per-ROI on/off decision level, parallel to `rois`.
    baselines: Vec<f64>,
    frame_counter: u32,
    empty_frames: u32,
    prev_clock: u8,
}

impl VlcDecoder {
    pub fn new(decoder_type: DecoderType, threshold: u8, data_width: usize) -> Result<Self> {
        Ok(Self {
            decoder_type: decoder_type.ensure_supported()?,
            threshold,
            data_width,
            clock_index: 0,
            idle_frames: DEFAULT_IDLE_FRAMES,
            sync_frames: DEFAULT_SYNC_FRAMES,
            data_frames: DEFAULT_DATA_FRAMES,
            state: VlcState::Idle,
            prev_frame: None,
            background: None,
            sync_image: None,
            rois: Vec::new(),
            baselines: Vec::new(),
            frame_counter: 0,
            empty_frames: 0,
            prev_clock: 0,
        })
    }

    pub fn from_config(config: &VlcConfig) -> Result<Self> {
        let decoder_type = DecoderType::from_str(&config.decoder)?;
        let mut decoder = Self::new(decoder_type, config.threshold, config.data_width)?
            .with_frame_quotas(config.idle_frames, config.sync_frames, config.data_frames)?;
        decoder.set_clock_index(config.clock_index);
        Ok(decoder)
    }

    /// Overrides the idle-timeout threshold and the sync/data frame quotas.
    pub fn with_frame_quotas(mut self, idle: u32, sync: u32, data: u32) -> Result<Self> {
        if sync == 0 || data == 0 {
            return Err(DecodeError::invalid("frame quotas must be positive"));
        }
        self.idle_frames = idle;
        self.sync_frames = sync;
        self.data_frames = data;
        Ok(self)
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        self.threshold = threshold;
    }

    pub fn set_data_width(&mut self, data_width: usize) {
        self.data_width = data_width;
    }

    pub fn set_clock_index(&mut self, clock_index: usize) {
        self.clock_index = clock_index;
    }

    pub fn decoder_type(&self) -> DecoderType {
        self.decoder_type
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn data_width(&self) -> usize {
        self.data_width
    }

    pub fn clock_index(&self) -> usize {
        self.clock_index
    }

    pub fn state(&self) -> VlcState {
        self.state
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn empty_frames(&self) -> u32 {
        self.empty_frames
    }

    pub fn rois(&self) -> &[RoiBlock] {
        &self.rois
    }

    pub fn baselines(&self) -> &[f64] {
        &self.baselines
    }

    pub fn previous_clock(&self) -> u8 {
        self.prev_clock
    }

    /// Feeds one frame through the state machine.
    ///
    /// The first call only stores the frame. Afterwards the frame must keep the
    /// same dimensions. On return `frame` carries the ROI outlines.
    pub fn decode(&mut self, frame: &mut GrayImage) -> Result<VlcOutput> {
        ensure_not_empty(frame, "frame")?;
        let Some(prev) = &self.prev_frame else {
            self.prev_frame = Some(frame.clone());
            return Ok(VlcOutput::default());
        };
        if self.data_width == 0 {
            return Err(DecodeError::invalid("data width must be at least 1"));
        }
        if self.clock_index >= self.data_width {
            return Err(DecodeError::invalid(format!(
                "clock index {} out of range for data width {}",
                self.clock_index, self.data_width
            )));
        }
        if prev.dimensions() != frame.dimensions() {
            return Err(DecodeError::invalid(format!(
                "frame size changed from {:?} to {:?}",
                prev.dimensions(),
                frame.dimensions()
            )));
        }
        if self.state == VlcState::Data && self.clock_index >= self.rois.len() {
            return Err(DecodeError::invalid("clock index outside the confirmed ROIs"));
        }

        if self.empty_frames > self.idle_frames {
            warn!(state = ?self.state, empty_frames = self.empty_frames, "idle timeout");
            self.state = VlcState::Idle;
            self.empty_frames = 0;
            self.frame_counter = 0;
        }

        let mut output = VlcOutput::default();
        match self.state {
            VlcState::Idle => self.process_idle(frame)?,
            VlcState::Sync => self.process_sync(frame)?,
            VlcState::Data => output.bits = self.process_data(frame)?,
        }

        self.prev_frame = Some(frame.clone());
        for roi in &self.rois {
            draw_rect_outline(frame, roi.bounding_rect(), OVERLAY_LEVEL);
        }
        Ok(output)
    }

    /// Blur both frames, difference, binarise, then dilate twice and erode once.
    fn detect_motion_blobs(&self, frame: &GrayImage) -> Result<Vec<Blob>> {
        let prev = self
            .prev_frame
            .as_ref()
            .ok_or_else(|| DecodeError::invalid("no previous frame"))?;
        let diff = abs_diff(&gaussian_blur_5x5(prev)?, &gaussian_blur_5x5(frame)?)?;
        let mask = threshold_binary(&diff, self.threshold);
        let mask = dilate(&mask, FILTER_SIZE)?;
        let mask = dilate(&mask, FILTER_SIZE)?;
        let mask = erode(&mask, FILTER_SIZE)?;
        find_blobs(&mask)
    }

    fn process_idle(&mut self, frame: &GrayImage) -> Result<()> {
        self.rois.clear();
        self.baselines.clear();

        let blobs = self.detect_motion_blobs(frame)?;
        if blobs.len() != self.data_width {
            self.empty_frames += 1;
            return Ok(());
        }

        debug!(blobs = blobs.len(), "sync start");
        let (w, h) = frame.dimensions();
        let mut sync_image = FloatImage::new(w, h);
        accumulate(&mut sync_image, &render_blobs(w, h, &blobs))?;
        self.sync_image = Some(sync_image);
        self.background = Some(FloatImage::new(w, h));
        self.empty_frames = 0;
        self.frame_counter = 0;
        self.state = VlcState::Sync;
        Ok(())
    }

    fn process_sync(&mut self, frame: &GrayImage) -> Result<()> {
        let blobs = self.detect_motion_blobs(frame)?;
        if blobs.len() != self.data_width {
            self.empty_frames += 1;
            return Ok(());
        }
        self.empty_frames = 0;

        let (Some(background), Some(sync_image)) =
            (self.background.as_mut(), self.sync_image.as_mut())
        else {
            return Err(DecodeError::UnknownState(VlcState::Sync.into()));
        };
        accumulate(background, frame)?;
        accumulate(sync_image, &render_blobs(frame.width(), frame.height(), &blobs))?;

        self.frame_counter += 1;
        if self.frame_counter < self.sync_frames {
            return Ok(());
        }

        let roi_blobs = find_blobs(&saturate_to_gray(sync_image))?;
        if roi_blobs.len() != self.data_width {
            warn!(
                found = roi_blobs.len(),
                expected = self.data_width,
                "roi detection failed, retrying"
            );
            self.reset_to_idle();
            return Ok(());
        }

        scale(background, 1.0 / self.sync_frames as f32);
        self.baselines = roi_blobs
            .iter()
            .map(|blob| mean_in_rect_f32(background, blob.bounding_rect))
            .collect();
        self.rois = roi_blobs
            .into_iter()
            .map(|blob| RoiBlock::new(blob.contour))
            .collect();
        self.background = None;
        self.sync_image = None;

        info!(rois = self.rois.len(), baselines = ?self.baselines, "roi detected");
        self.state = VlcState::Data;
        self.frame_counter = 0;
        self.prev_clock = 0;
        Ok(())
    }

    fn process_data(&mut self, frame: &GrayImage) -> Result<Vec<u8>> {
        let signals: Vec<u8> = self
            .rois
            .iter()
            .zip(&self.baselines)
            .map(|(roi, &baseline)| u8::from(mean_in_rect(frame, roi.bounding_rect()) >= baseline))
            .collect();
        let clock = *signals
            .get(self.clock_index)
            .ok_or_else(|| DecodeError::invalid("clock index outside the confirmed ROIs"))?;

        let rising = clock == 1 && self.prev_clock != 1;
        self.prev_clock = clock;

        self.frame_counter += 1;
        if self.frame_counter >= self.data_frames {
            debug!("data frames exhausted");
            self.reset_to_idle();
            return Ok(Vec::new());
        }

        let mut bits = Vec::new();
        if rising {
            bits = signals
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != self.clock_index)
                .map(|(_, &bit)| bit)
                .collect();
            debug!(frame = self.frame_counter, ?bits, "clock rising edge");
        }
        Ok(bits)
    }

    fn reset_to_idle(&mut self) {
        self.state = VlcState::Idle;
        self.frame_counter = 0;
        self.background = None;
        self.sync_image = None;
    }
}

fn render_blobs(width: u32, height: u32, blobs: &[Blob]) -> GrayImage {
    let mut image = GrayImage::new(width, height);
    for blob in blobs {
        fill_convex(&mut image, &blob.contour, SYNC_BLOB_LEVEL);
    }
    image
}
