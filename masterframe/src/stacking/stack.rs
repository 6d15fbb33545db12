//! Combine entry points.
//!
//! `combine()` works on frames already in memory, `combine_paths()` loads a
//! stack through a [`FrameLoader`], and `combine_and_write()` persists the
//! master frame once it has been fully computed.

use std::path::{Path, PathBuf};

use crate::frame::{COMBINED, Frame, FrameLoader, FrameType, FrameWriter, NCOMBINE};

use super::cache::FrameCache;
use super::combine::PixelCombiner;
use super::config::CombineConfig;
use super::error::Error;
use super::progress::ProgressCallback;

/// Combine in-memory frames into one master frame.
///
/// Every output pixel is reduced independently from the values at the same
/// position in every frame: rejection first, then the combine method. The
/// result has the input shape and the first frame's header extended with
/// `COMBINED = T` and `NCOMBINE = <frame count>`.
///
/// # Errors
///
/// Returns an error if:
/// - No frames are provided
/// - Fewer than `config.min_frames` frames are provided
/// - Frame shapes don't match
///
/// # Examples
///
/// ```
/// use masterframe::{combine, CombineConfig, Frame};
///
/// let frames = vec![Frame::filled([2, 3], 100.0), Frame::filled([2, 3], 102.0)];
/// let master = combine(&frames, &CombineConfig::default())?;
/// assert!(master.is_combined());
/// # Ok::<(), masterframe::Error>(())
/// ```
pub fn combine(frames: &[Frame], config: &CombineConfig) -> Result<Frame, Error> {
    combine_with_progress(frames, config, ProgressCallback::default())
}

/// Same as `combine()` with progress reporting.
pub fn combine_with_progress(
    frames: &[Frame],
    config: &CombineConfig,
    progress: ProgressCallback,
) -> Result<Frame, Error> {
    check_frame_count(frames.len(), config)?;
    config.validate();

    tracing::info!(
        method = %config.method,
        rejection = %config.rejection,
        frame_count = frames.len(),
        "Starting combine"
    );

    let cache = FrameCache::from_frames(frames, &config.memory, progress)?;
    Ok(run_combine(&cache, config))
}

/// Load a stack through `loader` and combine it.
///
/// `frame_type` labels the run in logs; loaded frames whose `IMAGETYP`
/// names a different type are reported with a warning but still combined.
/// Stacks larger than the memory budget are spilled to a memory-mapped
/// disk cache under `config.memory.cache_dir`.
///
/// # Errors
///
/// Returns an error if:
/// - No paths are provided
/// - Fewer than `config.min_frames` paths are provided
/// - A frame fails to load (the loader's error is kept as the source)
/// - Frame shapes don't match
/// - The disk cache cannot be written
pub fn combine_paths<P, L>(
    paths: &[P],
    loader: &L,
    frame_type: FrameType,
    config: &CombineConfig,
) -> Result<Frame, Error>
where
    P: AsRef<Path> + Sync,
    L: FrameLoader + ?Sized,
{
    combine_paths_with_progress(paths, loader, frame_type, config, ProgressCallback::default())
}

/// Same as `combine_paths()` with progress reporting.
pub fn combine_paths_with_progress<P, L>(
    paths: &[P],
    loader: &L,
    frame_type: FrameType,
    config: &CombineConfig,
    progress: ProgressCallback,
) -> Result<Frame, Error>
where
    P: AsRef<Path> + Sync,
    L: FrameLoader + ?Sized,
{
    check_frame_count(paths.len(), config)?;
    config.validate();

    tracing::info!(
        frame_type = %frame_type,
        method = %config.method,
        rejection = %config.rejection,
        frame_count = paths.len(),
        "Starting combine"
    );

    let cache = FrameCache::from_paths(paths, loader, frame_type, &config.memory, progress)?;
    Ok(run_combine(&cache, config))
}

/// Combine a stack and write the master frame to `out_path`.
///
/// The writer is only called after the whole stack has been combined, so a
/// failed run never leaves a partial master behind. Returns the written frame
/// with its path set to `out_path`.
pub fn combine_and_write<P, L, W>(
    paths: &[P],
    loader: &L,
    writer: &W,
    frame_type: FrameType,
    config: &CombineConfig,
    out_path: &Path,
) -> Result<Frame, Error>
where
    P: AsRef<Path> + Sync,
    L: FrameLoader + ?Sized,
    W: FrameWriter + ?Sized,
{
    let master = combine_paths(paths, loader, frame_type, config)?;

    writer.write(&master, out_path).map_err(|e| Error::Write {
        path: out_path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(path = %out_path.display(), "Saved master {}", frame_type);
    Ok(master.with_path(out_path))
}

/// File name for a master frame: `master_<type>_<method>.fits`.
pub fn master_filename(frame_type: FrameType, config: &CombineConfig) -> String {
    format!("master_{}_{}.fits", frame_type, config.method)
}

/// Path of a master frame inside `dir`.
pub fn master_path<P: AsRef<Path>>(dir: P, frame_type: FrameType, config: &CombineConfig) -> PathBuf {
    dir.as_ref().join(master_filename(frame_type, config))
}

fn check_frame_count(count: usize, config: &CombineConfig) -> Result<(), Error> {
    if count == 0 {
        return Err(Error::EmptyStack);
    }
    if count < config.min_frames {
        return Err(Error::NotEnoughFrames {
            required: config.min_frames,
            actual: count,
        });
    }
    Ok(())
}

fn run_combine(cache: &FrameCache<'_>, config: &CombineConfig) -> Frame {
    let combiner = PixelCombiner::new(config);
    let result = cache.process_chunked(&combiner);

    if result.fallback_pixels > 0 {
        tracing::warn!(
            pixels = result.fallback_pixels,
            policy = %config.all_rejected,
            "Every sample was rejected for some pixels, applied fallback"
        );
    }

    let mut header = cache.header().clone();
    header.insert(COMBINED, true);
    header.insert(NCOMBINE, cache.frame_count());

    tracing::info!(
        shape = %cache.shape(),
        frame_count = cache.frame_count(),
        chunk_rows = result.chunk_rows,
        disk_backed = cache.is_disk_backed(),
        "Combine complete"
    );

    Frame::new(cache.shape().clone(), result.pixels).with_header(header)
}
