//! Example: build a master bias from a synthetic bias stack.
//!
//! Generates bias frames (bias level, read noise, a column pattern and a few
//! cosmic-ray hits) into an in-memory store, selects them through a header
//! catalog, and combines them with 5-sigma clipping.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example master_bias
//! MASTERFRAME_FRAMES=40 MASTERFRAME_MEMORY_LIMIT=4000000 RUST_LOG=debug \
//!     cargo run --example master_bias
//! ```
//!
//! A small `MASTERFRAME_MEMORY_LIMIT` forces the disk-backed cache and
//! row-block processing.

use std::env;
use std::time::Instant;

use anyhow::{Context, Result};
use common::{LogConfig, setup_logging};
use masterframe::{
    COMBINED, CombineConfig, Frame, FrameType, FrameWriter, Header, IMAGETYP, MemoryStore,
    NCOMBINE, ProgressCallback, StackingProgress, StackingStage, combine_paths_with_progress,
    master_path,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HEIGHT: usize = 512;
const WIDTH: usize = 768;
const BIAS_LEVEL: f32 = 1024.0;
const READ_NOISE: f32 = 6.0;

fn main() -> Result<()> {
    setup_logging(&LogConfig::default());

    let frame_count: usize = env::var("MASTERFRAME_FRAMES")
        .ok()
        .map(|v| v.parse::<usize>().context("MASTERFRAME_FRAMES must be a frame count"))
        .transpose()?
        .unwrap_or(20);
    let memory_limit: Option<u64> = env::var("MASTERFRAME_MEMORY_LIMIT")
        .ok()
        .map(|v| v.parse::<u64>().context("MASTERFRAME_MEMORY_LIMIT must be a byte count"))
        .transpose()?;

    let store = MemoryStore::new();
    populate_store(&store, frame_count);

    let catalog = store.catalog();
    let bias_paths = catalog.of_type(FrameType::Bias);
    tracing::info!(
        cataloged = catalog.len(),
        selected = bias_paths.len(),
        "Selected bias frames"
    );

    let mut config = CombineConfig::sigma_clipped(5.0, 5.0);
    if let Some(limit) = memory_limit {
        config = config.with_memory_limit(limit);
    }

    let start = Instant::now();
    let master = combine_paths_with_progress(
        &bias_paths,
        &store,
        FrameType::Bias,
        &config,
        create_progress_callback(),
    )
    .context("Failed to combine bias frames")?;
    let elapsed = start.elapsed();

    let out = master_path("masters", FrameType::Bias, &config);
    store
        .write(&master, &out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    let single_noise = std_dev(store.get(&bias_paths[0]).context("first frame")?.pixels());
    let master_noise = std_dev(master.pixels());

    tracing::info!(
        elapsed_ms = elapsed.as_millis() as u64,
        shape = %master.shape(),
        combined = ?master.header().get_bool(COMBINED),
        ncombine = ?master.header().get_int(NCOMBINE),
        single_noise = format!("{:.3}", single_noise),
        master_noise = format!("{:.3}", master_noise),
        path = %out.display(),
        "Master bias complete"
    );

    println!("\nMaster header:");
    for (key, value) in master.header().iter() {
        println!("  {:<8} = {}", key, value);
    }

    Ok(())
}

/// Fill the store with bias frames plus one dark frame the catalog should skip.
fn populate_store(store: &MemoryStore, frame_count: usize) {
    let mut pattern_rng = StdRng::seed_from_u64(7);
    let column_pattern: Vec<f32> = (0..WIDTH)
        .map(|_| pattern_rng.random_range(-3.0..3.0))
        .collect();

    for i in 0..frame_count {
        let mut rng = StdRng::seed_from_u64(1000 + i as u64);
        let mut pixels: Vec<f32> = (0..HEIGHT * WIDTH)
            .map(|idx| BIAS_LEVEL + column_pattern[idx % WIDTH] + READ_NOISE * gaussian(&mut rng))
            .collect();
        for _ in 0..5 {
            let hit = rng.random_range(0..pixels.len());
            pixels[hit] = rng.random_range(5_000.0..60_000.0);
        }
        let frame = Frame::new([HEIGHT, WIDTH], pixels).with_header(header("Bias Frame", 0.0));
        store.insert(format!("raw/bias_{:03}.fit", i), frame);
    }

    let dark =
        Frame::filled([HEIGHT, WIDTH], BIAS_LEVEL + 40.0).with_header(header("Dark Frame", 300.0));
    store.insert("raw/dark_000.fit", dark);
}

fn header(image_type: &str, exptime: f64) -> Header {
    let mut header = Header::new();
    header.insert(IMAGETYP, image_type);
    header.insert("EXPTIME", exptime);
    header.insert("INSTRUME", "synthetic");
    header
}

fn gaussian(rng: &mut StdRng) -> f32 {
    let u1 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()) as f32
}

fn std_dev(pixels: &[f32]) -> f64 {
    let n = pixels.len() as f64;
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / n;
    (pixels.iter().map(|&p| (p as f64 - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Create a progress callback that logs to console.
fn create_progress_callback() -> ProgressCallback {
    ProgressCallback::new(|progress: StackingProgress| {
        let stage = match progress.stage {
            StackingStage::Loading => "Loading",
            StackingStage::Processing => "Processing",
        };
        let percent = if progress.total > 0 {
            (progress.current as f32 / progress.total as f32) * 100.0
        } else {
            0.0
        };
        tracing::debug!(
            stage,
            current = progress.current,
            total = progress.total,
            percent = format!("{:.1}%", percent),
            "Progress"
        );
    })
}
