//! Testing utilities for masterframe.

#![allow(dead_code)]

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::frame::{Frame, FrameType, Header, IMAGETYP, MemoryStore, Shape};

/// Bias level of synthetic frames, in ADU.
pub const BIAS_LEVEL: f32 = 1000.0;
/// Read noise of synthetic frames, in ADU.
pub const READ_NOISE: f32 = 5.0;

/// Header tagged with `frame_type`, the way acquisition software writes it.
pub fn typed_header(frame_type: FrameType) -> Header {
    let mut header = Header::new();
    let label = match frame_type {
        FrameType::Bias => "Bias Frame",
        FrameType::Dark => "Dark Frame",
        FrameType::Flat => "Flat Field",
        FrameType::Light => "Light Frame",
    };
    header.insert(IMAGETYP, label);
    header.insert("EXPTIME", 0.0);
    header
}

/// Standard normal sample via Box-Muller.
pub fn gaussian(rng: &mut StdRng) -> f32 {
    let u1 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()) as f32
}

/// Frame of Gaussian noise around `level`.
pub fn noise_frame(shape: impl Into<Shape>, level: f32, sigma: f32, seed: u64) -> Frame {
    let shape = shape.into();
    let mut rng = StdRng::seed_from_u64(seed);
    let pixels = (0..shape.pixel_count())
        .map(|_| level + sigma * gaussian(&mut rng))
        .collect();
    Frame::new(shape, pixels)
}

/// `count` synthetic bias frames with bias headers.
pub fn bias_stack(count: usize, shape: impl Into<Shape>, seed: u64) -> Vec<Frame> {
    let shape = shape.into();
    (0..count)
        .map(|i| {
            noise_frame(shape.clone(), BIAS_LEVEL, READ_NOISE, seed + i as u64)
                .with_header(typed_header(FrameType::Bias))
        })
        .collect()
}

/// Insert `frames` into a fresh store under `bias_000.fit`, `bias_001.fit`, ...
pub fn store_stack(frames: &[Frame]) -> (MemoryStore, Vec<PathBuf>) {
    let store = MemoryStore::new();
    let paths: Vec<PathBuf> = (0..frames.len())
        .map(|i| PathBuf::from(format!("bias_{:03}.fit", i)))
        .collect();
    for (path, frame) in paths.iter().zip(frames) {
        store.insert(path.clone(), frame.clone());
    }
    (store, paths)
}

/// Population standard deviation of a pixel slice.
pub fn pixel_std(pixels: &[f32]) -> f32 {
    crate::math::std_f32(pixels)
}
