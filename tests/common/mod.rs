//! Synthetic recordings shared by the integration tests.
#![allow(dead_code)]

use carlink::core_modules::envelope_window::WINDOW_SIZE;
use image::{GrayImage, Luma};

pub const WIDTH: u32 = 200;
pub const HEIGHT: u32 = 80;
pub const LED_X: [u32; 3] = [20, 80, 140];
pub const LED_Y: u32 = 20;
pub const LED_SIZE: u32 = 20;
pub const LED_ON: u8 = 200;

/// Number of sync frames needed to reach the data state with default quotas:
/// one bootstrap frame, one trigger frame and twenty accumulated frames.
pub const FRAMES_TO_DATA: usize = 22;

/// Three LEDs on a black background; `lit[i]` switches LED `i`.
pub fn led_frame(lit: [bool; 3]) -> GrayImage {
    let mut frame = GrayImage::new(WIDTH, HEIGHT);
    for (&x0, on) in LED_X.iter().zip(lit) {
        if !on {
            continue;
        }
        for y in LED_Y..LED_Y + LED_SIZE {
            for x in x0..x0 + LED_SIZE {
                frame.put_pixel(x, y, Luma([LED_ON]));
            }
        }
    }
    frame
}

/// Sync preamble: all LEDs blink together, starting dark.
pub fn sync_frames(count: usize) -> Vec<GrayImage> {
    (0..count)
        .map(|i| {
            let on = i % 2 == 1;
            led_frame([on, on, on])
        })
        .collect()
}

/// Data frames for LED 0 as clock: each payload pair is shown with the clock
/// high, followed by a frame with everything dark.
pub fn data_frames(payload: &[[u8; 2]]) -> Vec<GrayImage> {
    payload
        .iter()
        .flat_map(|&[a, b]| [led_frame([true, a == 1, b == 1]), led_frame([false; 3])])
        .collect()
}

/// Splits a byte MSB-first into the two-bit payload pairs of `data_frames`.
pub fn byte_pairs(value: u8) -> Vec<[u8; 2]> {
    (0..4)
        .map(|i| {
            let shift = 6 - 2 * i;
            [(value >> (shift + 1)) & 1, (value >> shift) & 1]
        })
        .collect()
}

/// Raw vibration samples of an undisturbed sync preamble: one trigger sample
/// plus `symbols` symbols of `period + 1` samples.
pub fn vbc_preamble(threshold: u32, amplitude: u32, period: u32, symbols: u32) -> Vec<u32> {
    vec![threshold + amplitude; 1 + (symbols * (period + 1)) as usize]
}

/// Raw samples for data symbols. A one is a pulse that keeps the envelope high
/// for exactly one symbol; a zero is silence. The preamble's envelope tail spills
/// into the first symbol, so the first bit should be a one. Needs `period >= 8`.
pub fn vbc_data(bits: &[u8], threshold: u32, amplitude: u32, period: u32) -> Vec<u32> {
    let symbol_len = period as usize + 1;
    let pulse_len = symbol_len - (WINDOW_SIZE - 1);
    bits.iter()
        .flat_map(|&bit| {
            (0..symbol_len).map(move |i| {
                if bit == 1 && i < pulse_len {
                    threshold + amplitude
                } else {
                    0
                }
            })
        })
        .collect()
}
