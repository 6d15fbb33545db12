//! Frame stack storage and chunked evaluation.
//!
//! Supports three modes:
//! - Borrowed: frames already in memory, owned by the caller
//! - In-memory: loaded frames fit in the memory budget and stay in RAM
//! - Disk-based: frames are spilled to raw `f32` files and memory-mapped
//!
//! Cache format (disk mode):
//! - One directory per run: `{cache_dir}/run_{pid}_{seq}`
//! - One file per frame: `{index:04}_{hash}.bin`, the hash taken from the source path
//! - Each file holds raw native-endian f32 pixels in row-major order

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Write};
use std::mem::size_of;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use memmap2::Mmap;
use rayon::prelude::*;

use crate::frame::{Frame, FrameLoader, FrameType, Header, Shape};
use crate::stacking::combine::PixelCombiner;
use crate::stacking::error::Error;
use crate::stacking::memory::{MemoryConfig, compute_chunk_rows, fits_in_memory};
use crate::stacking::progress::{ProgressCallback, StackingStage};
use crate::stacking::rejection::ScratchBuffers;

static RUN_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Generate a cache filename from the frame index and a hash of the source path.
fn cache_filename(index: usize, path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("{:04}_{:016x}.bin", index, hasher.finish())
}

/// Memory-mapped frame pixels.
#[derive(Debug)]
struct CachedFrame {
    mmap: Mmap,
    path: PathBuf,
}

/// Spilled frames of one run. Removes its run directory on drop unless kept.
#[derive(Debug)]
struct DiskStack {
    frames: Vec<CachedFrame>,
    run_dir: PathBuf,
    keep: bool,
}

impl Drop for DiskStack {
    fn drop(&mut self) {
        if self.keep {
            tracing::info!(run_dir = %self.run_dir.display(), "Keeping frame cache");
            return;
        }
        // unmap before deleting
        self.frames.clear();
        if let Err(e) = std::fs::remove_dir_all(&self.run_dir) {
            tracing::warn!(
                run_dir = %self.run_dir.display(),
                error = %e,
                "Failed to remove frame cache"
            );
        }
    }
}

/// Storage mode for the stack.
#[derive(Debug)]
enum Storage<'a> {
    Borrowed(&'a [Frame]),
    InMemory(Vec<Frame>),
    DiskBacked(DiskStack),
}

/// Output of [`FrameCache::process_chunked`].
#[derive(Debug)]
pub(crate) struct Combined {
    pub pixels: Vec<f32>,
    /// Pixels where every sample was rejected.
    pub fallback_pixels: usize,
    pub chunk_rows: usize,
}

/// An equal-shape frame stack that can be read one row block at a time.
#[derive(Debug)]
pub(crate) struct FrameCache<'a> {
    storage: Storage<'a>,
    shape: Shape,
    /// Header of the first frame.
    header: Header,
    usable_memory: u64,
    progress: ProgressCallback,
}

impl<'a> FrameCache<'a> {
    /// Wrap frames that are already in memory, checking that shapes agree.
    pub fn from_frames(
        frames: &'a [Frame],
        memory: &MemoryConfig,
        progress: ProgressCallback,
    ) -> Result<Self, Error> {
        let first = frames.first().ok_or(Error::EmptyStack)?;
        let shape = first.shape().clone();
        for (index, frame) in frames.iter().enumerate().skip(1) {
            check_shape(&shape, frame, index)?;
        }

        Ok(Self {
            storage: Storage::Borrowed(frames),
            header: first.header().clone(),
            shape,
            usable_memory: memory.usable_memory(),
            progress,
        })
    }
}

impl FrameCache<'static> {
    /// Load frames through `loader`.
    ///
    /// Keeps them in memory when the whole stack fits the memory budget;
    /// otherwise spills each frame to the disk cache right after loading it,
    /// so at most one loaded frame is resident at a time.
    pub fn from_paths<P, L>(
        paths: &[P],
        loader: &L,
        frame_type: FrameType,
        memory: &MemoryConfig,
        progress: ProgressCallback,
    ) -> Result<Self, Error>
    where
        P: AsRef<Path> + Sync,
        L: FrameLoader + ?Sized,
    {
        if paths.is_empty() {
            return Err(Error::EmptyStack);
        }

        progress.report(0, paths.len(), StackingStage::Loading);

        let first = load_frame(loader, paths[0].as_ref(), frame_type)?;
        let shape = first.shape().clone();
        let header = first.header().clone();

        let usable_memory = memory.usable_memory();
        let use_in_memory = fits_in_memory(shape.pixel_count(), paths.len(), usable_memory);

        tracing::info!(
            frame_count = paths.len(),
            shape = %shape,
            usable_mb = usable_memory / (1024 * 1024),
            use_in_memory,
            "Frame cache storage decision"
        );

        let storage = if use_in_memory {
            load_in_memory(paths, loader, frame_type, &shape, first, &progress)?
        } else {
            load_to_disk(paths, loader, frame_type, &shape, first, memory, &progress)?
        };

        Ok(Self {
            storage,
            shape,
            header,
            usable_memory,
            progress,
        })
    }
}

impl FrameCache<'_> {
    pub fn frame_count(&self) -> usize {
        match &self.storage {
            Storage::Borrowed(frames) => frames.len(),
            Storage::InMemory(frames) => frames.len(),
            Storage::DiskBacked(disk) => disk.frames.len(),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn is_disk_backed(&self) -> bool {
        matches!(self.storage, Storage::DiskBacked(_))
    }

    /// Reduce the stack pixel by pixel, one row block at a time.
    ///
    /// Block height comes from the memory budget. Rows inside a block run in
    /// parallel, each with its own sample and scratch buffers. Every output
    /// pixel depends only on its own samples, so the result does not depend on
    /// the block height.
    pub fn process_chunked(&self, combiner: &PixelCombiner) -> Combined {
        let frame_count = self.frame_count();
        let rows = self.shape.rows();
        let row_len = self.shape.row_len();
        let chunk_rows = compute_chunk_rows(row_len, frame_count, rows, self.usable_memory);

        let mut pixels = vec![0.0f32; self.shape.pixel_count()];
        let blocks = RowBlocks::new(rows, chunk_rows);
        let total = blocks.len();
        let mut fallback_pixels = 0;

        self.progress.report(0, total, StackingStage::Processing);

        for (block_idx, block) in blocks.enumerate() {
            let chunks: Vec<&[f32]> = (0..frame_count)
                .map(|frame_idx| self.read_rows(frame_idx, block.clone()))
                .collect();

            let output = &mut pixels[block.start * row_len..block.end * row_len];

            fallback_pixels += output
                .par_chunks_mut(row_len)
                .enumerate()
                .map(|(row_in_block, row_output)| {
                    // One buffer set per row task, reused for every pixel in the row
                    let mut values = vec![0.0f32; frame_count];
                    let mut scratch = ScratchBuffers::with_capacity(frame_count);
                    let row_offset = row_in_block * row_len;
                    let mut fallbacks = 0usize;

                    for (pixel_in_row, out) in row_output.iter_mut().enumerate() {
                        let pixel_idx = row_offset + pixel_in_row;
                        for (value, chunk) in values.iter_mut().zip(&chunks) {
                            *value = chunk[pixel_idx];
                        }
                        let result = combiner.combine(&mut values, &mut scratch);
                        *out = result.value;
                        fallbacks += usize::from(result.fallback);
                    }
                    fallbacks
                })
                .sum::<usize>();

            self.progress
                .report(block_idx + 1, total, StackingStage::Processing);
        }

        Combined {
            pixels,
            fallback_pixels,
            chunk_rows,
        }
    }

    /// Pixels of `rows` from one frame.
    fn read_rows(&self, frame_idx: usize, rows: Range<usize>) -> &[f32] {
        match &self.storage {
            Storage::Borrowed(frames) => frames[frame_idx].rows(rows),
            Storage::InMemory(frames) => frames[frame_idx].rows(rows),
            Storage::DiskBacked(disk) => {
                let row_bytes = self.shape.row_len() * size_of::<f32>();
                let bytes = &disk.frames[frame_idx].mmap[rows.start * row_bytes..rows.end * row_bytes];
                bytemuck::cast_slice(bytes)
            }
        }
    }
}

/// Iterator over consecutive row ranges of at most `chunk_rows` rows.
#[derive(Debug, Clone)]
pub(crate) struct RowBlocks {
    next: usize,
    rows: usize,
    chunk_rows: usize,
}

impl RowBlocks {
    pub fn new(rows: usize, chunk_rows: usize) -> Self {
        assert!(chunk_rows > 0, "Chunk rows must be positive");
        Self {
            next: 0,
            rows,
            chunk_rows,
        }
    }
}

impl Iterator for RowBlocks {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.next >= self.rows {
            return None;
        }
        let start = self.next;
        let end = (start + self.chunk_rows).min(self.rows);
        self.next = end;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.rows - self.next).div_ceil(self.chunk_rows);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowBlocks {}

fn check_shape(expected: &Shape, frame: &Frame, index: usize) -> Result<(), Error> {
    if frame.shape() != expected {
        return Err(Error::ShapeMismatch {
            index,
            expected: expected.clone(),
            actual: frame.shape().clone(),
        });
    }
    Ok(())
}

fn load_frame<L: FrameLoader + ?Sized>(
    loader: &L,
    path: &Path,
    frame_type: FrameType,
) -> Result<Frame, Error> {
    let frame = loader.load(path).map_err(|e| Error::Load {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(found) = frame.frame_type() {
        if found != frame_type {
            tracing::warn!(
                path = %path.display(),
                expected = %frame_type,
                found = %found,
                "Frame type does not match the requested stack"
            );
        }
    }

    Ok(frame)
}

fn load_in_memory<P, L>(
    paths: &[P],
    loader: &L,
    frame_type: FrameType,
    shape: &Shape,
    first: Frame,
    progress: &ProgressCallback,
) -> Result<Storage<'static>, Error>
where
    P: AsRef<Path> + Sync,
    L: FrameLoader + ?Sized,
{
    let total = paths.len();
    let loaded = AtomicUsize::new(1);
    progress.report(1, total, StackingStage::Loading);

    // Indexed parallel collect keeps stack order
    let remaining: Vec<Frame> = paths[1..]
        .par_iter()
        .enumerate()
        .map(|(i, path)| -> Result<Frame, Error> {
            let frame = load_frame(loader, path.as_ref(), frame_type)?;
            check_shape(shape, &frame, i + 1)?;
            let done = loaded.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(done, total, StackingStage::Loading);
            Ok(frame)
        })
        .collect::<Result<_, _>>()?;

    let mut frames = Vec::with_capacity(total);
    frames.push(first);
    frames.extend(remaining);

    tracing::info!("Loaded {} frames into memory", frames.len());
    Ok(Storage::InMemory(frames))
}

fn load_to_disk<P, L>(
    paths: &[P],
    loader: &L,
    frame_type: FrameType,
    shape: &Shape,
    first: Frame,
    memory: &MemoryConfig,
    progress: &ProgressCallback,
) -> Result<Storage<'static>, Error>
where
    P: AsRef<Path>,
    L: FrameLoader + ?Sized,
{
    let run_dir = memory.cache_dir.join(format!(
        "run_{}_{}",
        std::process::id(),
        RUN_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&run_dir).map_err(|e| Error::CreateCacheDir {
        path: run_dir.clone(),
        source: e,
    })?;

    // Owns the directory from here on, so an early return cleans up
    let mut disk = DiskStack {
        frames: Vec::with_capacity(paths.len()),
        run_dir,
        keep: memory.keep_cache,
    };

    let mut first = Some(first);
    for (index, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let frame = match first.take() {
            Some(frame) => frame,
            None => {
                let frame = load_frame(loader, path, frame_type)?;
                check_shape(shape, &frame, index)?;
                frame
            }
        };

        let cache_path = disk.run_dir.join(cache_filename(index, path));
        tracing::debug!(
            source = %path.display(),
            cache = %cache_path.display(),
            "Spilling frame to cache"
        );
        write_cache_file(&cache_path, frame.pixels())?;
        drop(frame);

        disk.frames.push(map_cache_file(cache_path)?);
        progress.report(index + 1, paths.len(), StackingStage::Loading);
    }

    tracing::info!(
        "Cached {} frames to disk at {:?}",
        disk.frames.len(),
        disk.run_dir
    );

    Ok(Storage::DiskBacked(disk))
}

/// Write raw f32 pixels to a cache file.
fn write_cache_file(path: &Path, pixels: &[f32]) -> Result<(), Error> {
    let file = File::create(path).map_err(|e| Error::CreateCacheFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    let bytes: &[u8] = bytemuck::cast_slice(pixels);
    writer.write_all(bytes).map_err(|e| Error::WriteCacheFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    writer.flush().map_err(|e| Error::WriteCacheFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

fn map_cache_file(path: PathBuf) -> Result<CachedFrame, Error> {
    let file = File::open(&path).map_err(|e| Error::OpenCacheFile {
        path: path.clone(),
        source: e,
    })?;
    // SAFETY: the file lives in a directory private to this run and is not
    // modified while mapped.
    let mmap = unsafe {
        Mmap::map(&file).map_err(|e| Error::MmapCacheFile {
            path: path.clone(),
            source: e,
        })?
    };
    Ok(CachedFrame { mmap, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacking::config::CombineConfig;
    use crate::testing::store_stack;

    fn ramp_frame(shape: [usize; 2], offset: f32) -> Frame {
        let count = shape[0] * shape[1];
        Frame::new(shape, (0..count).map(|i| i as f32 + offset).collect())
    }

    #[test]
    fn test_row_blocks() {
        let blocks: Vec<_> = RowBlocks::new(10, 4).collect();
        assert_eq!(blocks, vec![0..4, 4..8, 8..10]);
        assert_eq!(RowBlocks::new(10, 4).len(), 3);
        assert_eq!(RowBlocks::new(3, 10).collect::<Vec<_>>(), vec![0..3]);

        let mut blocks = RowBlocks::new(5, 2);
        blocks.next();
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_cache_filename() {
        let a = cache_filename(3, Path::new("/data/bias_001.fit"));
        let b = cache_filename(3, Path::new("/data/bias_002.fit"));
        assert!(a.starts_with("0003_"));
        assert!(a.ends_with(".bin"));
        assert_ne!(a, b);
        assert_eq!(a, cache_filename(3, Path::new("/data/bias_001.fit")));
    }

    #[test]
    fn test_cache_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.bin");
        let pixels = vec![1.5f32, -2.0, 3.25, f32::MAX];

        write_cache_file(&path, &pixels).unwrap();
        let cached = map_cache_file(path).unwrap();
        let read: &[f32] = bytemuck::cast_slice(&cached.mmap);
        assert_eq!(read, pixels.as_slice());
    }

    #[test]
    fn test_from_frames_shape_mismatch() {
        let frames = vec![Frame::filled([4, 4], 0.0), Frame::filled([4, 5], 0.0)];
        let err = FrameCache::from_frames(&frames, &MemoryConfig::default(), Default::default())
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { index: 1, .. }));
    }

    #[test]
    fn test_from_frames_empty() {
        let err = FrameCache::from_frames(&[], &MemoryConfig::default(), Default::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyStack));
    }

    #[test]
    fn test_from_paths_in_memory() {
        let frames: Vec<Frame> = (0..4).map(|i| ramp_frame([3, 5], i as f32)).collect();
        let (store, paths) = store_stack(&frames);

        let cache = FrameCache::from_paths(
            &paths,
            &store,
            FrameType::Bias,
            &MemoryConfig::default(),
            Default::default(),
        )
        .unwrap();

        assert!(!cache.is_disk_backed());
        assert_eq!(cache.frame_count(), 4);
        assert_eq!(store.load_count(), 4);
        // stack order follows path order
        assert_eq!(cache.read_rows(2, 0..1), frames[2].rows(0..1));
    }

    #[test]
    fn test_from_paths_disk_backed_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<Frame> = (0..3).map(|i| ramp_frame([6, 4], i as f32 * 10.0)).collect();
        let (store, paths) = store_stack(&frames);
        let memory = MemoryConfig::with_limit(64).with_cache_dir(dir.path());

        let cache =
            FrameCache::from_paths(&paths, &store, FrameType::Bias, &memory, Default::default())
                .unwrap();
        assert!(cache.is_disk_backed());
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(cache.read_rows(i, 2..5), frame.rows(2..5));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        drop(cache);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_keep_cache_leaves_files() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<Frame> = (0..2).map(|i| ramp_frame([2, 2], i as f32)).collect();
        let (store, paths) = store_stack(&frames);
        let memory = MemoryConfig {
            keep_cache: true,
            ..MemoryConfig::with_limit(1).with_cache_dir(dir.path())
        };

        let cache =
            FrameCache::from_paths(&paths, &store, FrameType::Bias, &memory, Default::default())
                .unwrap();
        drop(cache);

        let run_dir = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        assert_eq!(std::fs::read_dir(run_dir).unwrap().count(), 2);
    }

    #[test]
    fn test_disk_shape_mismatch_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![Frame::filled([4, 4], 1.0), Frame::filled([2, 2], 1.0)];
        let (store, paths) = store_stack(&frames);
        let memory = MemoryConfig::with_limit(1).with_cache_dir(dir.path());

        let err = FrameCache::from_paths(&paths, &store, FrameType::Bias, &memory, Default::default())
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { index: 1, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_process_chunked_matches_single_block() {
        let frames: Vec<Frame> = (0..5).map(|i| ramp_frame([7, 3], (i * i) as f32)).collect();
        let combiner = PixelCombiner::new(&CombineConfig::default());

        let whole = FrameCache::from_frames(&frames, &MemoryConfig::default(), Default::default())
            .unwrap()
            .process_chunked(&combiner);
        // one row of 5 frames x 3 pixels x 4 bytes = 60 bytes
        let chunked =
            FrameCache::from_frames(&frames, &MemoryConfig::with_limit(120), Default::default())
                .unwrap()
                .process_chunked(&combiner);

        assert_eq!(whole.chunk_rows, 7);
        assert_eq!(chunked.chunk_rows, 2);
        assert_eq!(whole.pixels, chunked.pixels);
    }
}
