//! Frame model: N-D pixel arrays with an attached header.

mod catalog;
mod header;
mod store;

pub use catalog::{Catalog, CatalogEntry};
pub use header::{COMBINED, Header, HeaderValue, IMAGETYP, NCOMBINE};
pub use store::{FrameLoader, FrameWriter, MemoryStore};

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use strum_macros::{Display, EnumIter};

/// Type of calibration frame, as recorded in the `IMAGETYP` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum FrameType {
    /// Zero-exposure readout frames.
    Bias,
    /// Thermal signal calibration.
    Dark,
    /// Vignetting and dust correction.
    Flat,
    /// Science exposures.
    Light,
}

impl FrameType {
    /// Parse an `IMAGETYP` value.
    ///
    /// Matches on the first word, case-insensitively, so acquisition-software
    /// variants like `"Bias Frame"` or `"DARK"` are recognized. IRAF's `"zero"`
    /// is accepted for bias and `"object"`/`"science"` for light frames.
    pub fn from_image_type(value: &str) -> Option<Self> {
        let word = value.split_whitespace().next()?.to_ascii_lowercase();
        match word.as_str() {
            "bias" | "zero" => Some(FrameType::Bias),
            "dark" => Some(FrameType::Dark),
            "flat" | "flatfield" => Some(FrameType::Flat),
            "light" | "object" | "science" => Some(FrameType::Light),
            _ => None,
        }
    }
}

/// Array extent. Axis 0 is the row axis; the remaining axes make up one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        let dims = dims.into();
        assert!(!dims.is_empty(), "Shape must have at least one axis");
        assert!(
            dims.iter().all(|&d| d > 0),
            "Shape axes must be positive, got {:?}",
            dims
        );
        Self(dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Extent of the row axis.
    pub fn rows(&self) -> usize {
        self.0[0]
    }

    /// Number of pixels in one row (product of all axes after the first).
    pub fn row_len(&self) -> usize {
        self.0[1..].iter().product()
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.0.iter().product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "x")?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

/// A frame: row-major `f32` pixels, their shape, a header and the path it was
/// loaded from.
///
/// Frames are not mutated once built; the `with_*` methods consume the frame
/// and are meant for construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    shape: Shape,
    pixels: Vec<f32>,
    header: Header,
    path: Option<PathBuf>,
}

impl Frame {
    /// Create a frame from row-major pixels.
    ///
    /// # Panics
    /// Panics if the pixel count does not match the shape.
    pub fn new(shape: impl Into<Shape>, pixels: Vec<f32>) -> Self {
        let shape = shape.into();
        assert_eq!(
            pixels.len(),
            shape.pixel_count(),
            "Pixel count {} does not match shape {}",
            pixels.len(),
            shape
        );
        Self {
            shape,
            pixels,
            header: Header::new(),
            path: None,
        }
    }

    /// Create a frame with every pixel set to `value`.
    pub fn filled(shape: impl Into<Shape>, value: f32) -> Self {
        let shape = shape.into();
        let pixels = vec![value; shape.pixel_count()];
        Self::new(shape, pixels)
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = header;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Pixels of the rows in `rows`, contiguous in row-major order.
    pub fn rows(&self, rows: Range<usize>) -> &[f32] {
        let row_len = self.shape.row_len();
        &self.pixels[rows.start * row_len..rows.end * row_len]
    }

    /// Frame type from the `IMAGETYP` keyword, if present and recognized.
    pub fn frame_type(&self) -> Option<FrameType> {
        self.header.frame_type()
    }

    /// Whether the header carries the combined-product marker.
    pub fn is_combined(&self) -> bool {
        self.header.get_bool(COMBINED).unwrap_or(false)
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }
}
