//! Progress reporting for combine operations.

use std::fmt;
use std::sync::Arc;

/// Progress information for combine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackingProgress {
    /// Steps completed so far.
    pub current: usize,
    /// Total number of steps.
    pub total: usize,
    pub stage: StackingStage,
}

/// Stage of a combine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackingStage {
    /// Loading frames into memory or writing them to the disk cache.
    Loading,
    /// Reducing row blocks.
    Processing,
}

/// Optional shared progress callback. The default reports nothing.
#[derive(Clone, Default)]
pub struct ProgressCallback(Option<Arc<dyn Fn(StackingProgress) + Send + Sync>>);

impl ProgressCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(StackingProgress) + Send + Sync + 'static,
    {
        Self(Some(Arc::new(f)))
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Report progress if a callback is set.
    pub fn report(&self, current: usize, total: usize, stage: StackingStage) {
        if let Some(f) = &self.0 {
            f(StackingProgress {
                current,
                total,
                stage,
            });
        }
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProgressCallback")
            .field(&self.is_set())
            .finish()
    }
}
