//! Header-based selection of input frames.

use std::path::{Path, PathBuf};

use super::{FrameType, Header, HeaderValue};

/// A cataloged file: its path and the header read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub header: Header,
}

/// Ordered collection of cataloged files.
///
/// Entries are supplied by the caller (directory scanning and header parsing
/// happen outside this crate). Every query keeps catalog order, so the
/// resulting path lists are reproducible stack orders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>, header: Header) {
        self.entries.push(CatalogEntry {
            path: path.into(),
            header,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn header(&self, path: &Path) -> Option<&Header> {
        self.entries
            .iter()
            .find(|e| e.path == path)
            .map(|e| &e.header)
    }

    /// Paths of entries whose header satisfies `predicate`, in catalog order.
    pub fn filter<F>(&self, predicate: F) -> Vec<PathBuf>
    where
        F: Fn(&Header) -> bool,
    {
        self.entries
            .iter()
            .filter(|e| predicate(&e.header))
            .map(|e| e.path.clone())
            .collect()
    }

    /// Paths of entries where `key` loosely equals `value` (see [`HeaderValue::matches`]).
    pub fn matching(&self, key: &str, value: impl Into<HeaderValue>) -> Vec<PathBuf> {
        let value = value.into();
        self.filter(|h| h.get(key).is_some_and(|v| v.matches(&value)))
    }

    /// Paths of entries whose `IMAGETYP` resolves to `frame_type`.
    pub fn of_type(&self, frame_type: FrameType) -> Vec<PathBuf> {
        self.filter(|h| h.frame_type() == Some(frame_type))
    }
}

impl<P: Into<PathBuf>> FromIterator<(P, Header)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (P, Header)>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for (path, header) in iter {
            catalog.push(path, header);
        }
        catalog
    }
}
