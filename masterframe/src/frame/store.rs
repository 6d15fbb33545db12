//! Loader and writer seams, plus an in-memory implementation of both.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{Catalog, Frame};

/// Loads a frame from storage. Called from worker threads.
pub trait FrameLoader: Sync {
    fn load(&self, path: &Path) -> io::Result<Frame>;
}

/// Persists a frame, header included.
pub trait FrameWriter {
    fn write(&self, frame: &Frame, path: &Path) -> io::Result<()>;
}

impl<T: FrameLoader + ?Sized> FrameLoader for &T {
    fn load(&self, path: &Path) -> io::Result<Frame> {
        (**self).load(path)
    }
}

impl<T: FrameWriter + ?Sized> FrameWriter for &T {
    fn write(&self, frame: &Frame, path: &Path) -> io::Result<()> {
        (**self).write(frame, path)
    }
}

/// Path-keyed frame store kept in memory.
///
/// Serves as loader and writer for tests, benchmarks and the example.
#[derive(Debug, Default)]
pub struct MemoryStore {
    frames: RwLock<HashMap<PathBuf, Frame>>,
    loads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, frame: Frame) {
        let path = path.into();
        let frame = frame.with_path(path.clone());
        self.frames.write().insert(path, frame);
    }

    pub fn get(&self, path: &Path) -> Option<Frame> {
        self.frames.read().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.frames.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.frames.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.read().is_empty()
    }

    /// Number of successful `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of `write` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Catalog of the stored frames' headers, sorted by path.
    pub fn catalog(&self) -> Catalog {
        let frames = self.frames.read();
        let mut paths: Vec<&PathBuf> = frames.keys().collect();
        paths.sort();
        paths
            .into_iter()
            .map(|p| (p.clone(), frames[p].header().clone()))
            .collect()
    }
}

impl FrameLoader for MemoryStore {
    fn load(&self, path: &Path) -> io::Result<Frame> {
        let frame = self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no frame stored at {}", path.display()),
            )
        })?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(frame)
    }
}

impl FrameWriter for MemoryStore {
    fn write(&self, frame: &Frame, path: &Path) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.insert(path, frame.clone());
        Ok(())
    }
}
