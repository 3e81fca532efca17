mod common;

use carlink::link::{LinkEvent, VbcLinkOptions, VlcLinkOptions, spawn_vbc_link, spawn_vlc_link};
use carlink::source::{
    CHANNEL_CAPACITY, SourceError, list_frames, load_signal_log, spawn_frame_replay,
    spawn_sample_replay,
};
use carlink::{DecodeError, DecoderType, VbcDecoder, VbcState, VlcDecoder, VlcState};
use common::*;
use std::time::Duration;
use tokio::sync::mpsc;

const PATTERN: [u8; 8] = [1, 0, 1, 1, 0, 0, 1, 0];

fn vbc_recording(trailing: usize) -> Vec<u32> {
    let mut samples = vbc_preamble(5, 100, 10, 4);
    samples.extend(vbc_data(&PATTERN, 5, 100, 10));
    samples.extend(std::iter::repeat_n(0, trailing));
    samples
}

fn vlc_recording(value: u8) -> Vec<image::GrayImage> {
    let mut frames = sync_frames(FRAMES_TO_DATA);
    frames.extend(data_frames(&byte_pairs(value)));
    frames
}

async fn collect(mut events: mpsc::Receiver<LinkEvent>) -> Vec<LinkEvent> {
    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        collected.push(event);
    }
    collected
}

fn values(events: &[LinkEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|event| match event {
            LinkEvent::Value(value) => Some(*value),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_vlc_link_assembles_vehicle_id() {
    let decoder = VlcDecoder::new(DecoderType::Mimo, 100, 3).unwrap();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (events, link) = spawn_vlc_link(decoder, rx, VlcLinkOptions::default()).unwrap();

    let feeder = tokio::spawn(async move {
        for frame in vlc_recording(0xA2) {
            tx.send(frame).await.unwrap();
        }
    });

    let events = collect(events).await;
    feeder.await.unwrap();
    let decoder = link.await.unwrap().unwrap();

    let bits: Vec<&Vec<u8>> = events
        .iter()
        .filter_map(|event| match event {
            LinkEvent::Bits(bits) => Some(bits),
            _ => None,
        })
        .collect();
    assert_eq!(bits.len(), 4);
    assert_eq!(values(&events), vec![0xA2]);
    assert!(!events.iter().any(|e| matches!(e, LinkEvent::Preview(_))));
    assert_eq!(decoder.state(), VlcState::Data);
}

#[tokio::test]
async fn test_vlc_link_previews_every_frame() {
    let decoder = VlcDecoder::new(DecoderType::Mimo, 100, 3).unwrap();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let options = VlcLinkOptions {
        value_bits: 8,
        emit_preview: true,
    };
    let (events, _link) = spawn_vlc_link(decoder, rx, options).unwrap();

    let recording = vlc_recording(0x0F);
    let frame_count = recording.len();
    tokio::spawn(async move {
        for frame in recording {
            tx.send(frame).await.unwrap();
        }
    });

    let events = collect(events).await;
    let previews = events
        .iter()
        .filter(|e| matches!(e, LinkEvent::Preview(_)))
        .count();
    assert_eq!(previews, frame_count);
    assert_eq!(values(&events), vec![0x0F]);
}

#[tokio::test]
async fn test_vlc_link_stops_on_decode_error() {
    let decoder = VlcDecoder::new(DecoderType::Mimo, 100, 3).unwrap();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (events, link) = spawn_vlc_link(decoder, rx, VlcLinkOptions::default()).unwrap();

    tx.send(led_frame([false; 3])).await.unwrap();
    tx.send(image::GrayImage::new(WIDTH / 2, HEIGHT)).await.unwrap();

    assert!(collect(events).await.is_empty());
    let result = link.await.unwrap();
    assert!(matches!(result, Err(DecodeError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_link_rejects_bad_value_width() {
    let decoder = VbcDecoder::new(5, 10).unwrap();
    let (_tx, rx) = mpsc::channel(1);
    let options = VbcLinkOptions {
        value_bits: 0,
        stop_after_value: true,
    };
    assert!(matches!(
        spawn_vbc_link(decoder, rx, options),
        Err(DecodeError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_vbc_link_stops_after_first_value() {
    let decoder = VbcDecoder::new(5, 10).unwrap();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let source = spawn_sample_replay(vbc_recording(500), tx);
    let (events, link) = spawn_vbc_link(decoder, rx, VbcLinkOptions::default()).unwrap();

    let events = collect(events).await;
    let bits: Vec<Vec<u8>> = events
        .iter()
        .filter_map(|event| match event {
            LinkEvent::Bits(bits) => Some(bits.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(bits, PATTERN.iter().map(|&b| vec![b]).collect::<Vec<_>>());
    assert_eq!(values(&events), vec![0b1011_0010]);

    let decoder = link.await.unwrap().unwrap();
    assert_eq!(decoder.state(), VbcState::Idle);
    assert!(matches!(source.await.unwrap(), Err(SourceError::ChannelClosed)));
}

#[tokio::test]
async fn test_vbc_link_keeps_running_without_stop() {
    let decoder = VbcDecoder::new(5, 10).unwrap();
    let mut samples = vbc_recording(20);
    samples.extend(vbc_recording(20));

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let source = spawn_sample_replay(samples, tx);
    let options = VbcLinkOptions {
        value_bits: 8,
        stop_after_value: false,
    };
    let (events, link) = spawn_vbc_link(decoder, rx, options).unwrap();

    assert_eq!(values(&collect(events).await), vec![0xB2, 0xB2]);
    link.await.unwrap().unwrap();
    assert!(source.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_dropping_events_stops_the_link() {
    let decoder = VbcDecoder::new(5, 10).unwrap();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let options = VbcLinkOptions {
        value_bits: 8,
        stop_after_value: false,
    };
    let (events, link) = spawn_vbc_link(decoder, rx, options).unwrap();
    drop(events);

    let samples = vbc_recording(0);
    let mut sent = 0;
    for sample in &samples {
        if tx.send(*sample).await.is_err() {
            break;
        }
        sent += 1;
    }
    assert!(sent < samples.len());
    assert!(link.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_replay_from_recording_files() {
    let dir = tempfile::tempdir().unwrap();
    for (i, frame) in vlc_recording(0x5A).iter().enumerate() {
        frame.save(dir.path().join(format!("{i:04}.png"))).unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();
    let log = dir.path().join("vbc.log");
    let text: Vec<String> = vbc_recording(5).iter().map(u32::to_string).collect();
    std::fs::write(&log, text.join("\n")).unwrap();

    let paths = list_frames(dir.path()).await.unwrap();
    assert_eq!(paths.len(), FRAMES_TO_DATA + 8);
    assert!(paths.windows(2).all(|w| w[0] < w[1]));

    let (frames_tx, frames_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let source = spawn_frame_replay(paths, Duration::ZERO, frames_tx);
    let decoder = VlcDecoder::new(DecoderType::Mimo, 100, 3).unwrap();
    let (events, link) = spawn_vlc_link(decoder, frames_rx, VlcLinkOptions::default()).unwrap();
    assert_eq!(values(&collect(events).await), vec![0x5A]);
    link.await.unwrap().unwrap();
    assert_eq!(source.await.unwrap().unwrap(), FRAMES_TO_DATA + 8);

    let samples = load_signal_log(&log, 0xFFFF).await.unwrap();
    assert_eq!(samples, vbc_recording(5));
}
