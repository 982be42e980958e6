//! Image Embedder
//!
//! Converts raw image bytes into a fixed-length, unit-norm [`Embedding`].
//! The default [`RasterEmbedder`] needs no model weights: it summarizes an
//! image by its colour distribution and its coarse luminance layout, which is
//! enough to tell a black wallet photographed on a table from a set of keys
//! on a carpet. A learned encoder can be dropped in behind [`ImageEmbedder`].

use crate::config::EmbedderConfig;
use findora_core::Embedding;
use image::imageops::FilterType;
use image::DynamicImage;

/// Bins per channel of the joint RGB histogram
const COLOR_BINS: usize = 4;

/// Cells per side of the luminance layout grid
const LAYOUT_GRID: usize = 8;

/// Dimension of every [`RasterEmbedder`] embedding
pub const RASTER_DIM: usize = COLOR_BINS * COLOR_BINS * COLOR_BINS + LAYOUT_GRID * LAYOUT_GRID;

/// Errors produced while extracting an embedding
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("image has no pixels")]
    Empty,
}

impl From<EmbedError> for findora_core::Error {
    fn from(e: EmbedError) -> Self {
        findora_core::Error::Decode(e.to_string())
    }
}

/// Turns image bytes into an embedding.
///
/// Implementations must be pure: identical bytes give an identical vector.
pub trait ImageEmbedder: Send + Sync {
    fn dim(&self) -> usize;

    fn embed(&self, image_bytes: &[u8]) -> Result<Embedding, EmbedError>;
}

/// Histogram + layout embedder built on the `image` crate
#[derive(Debug, Clone)]
pub struct RasterEmbedder {
    config: EmbedderConfig,
}

impl RasterEmbedder {
    pub fn new(config: EmbedderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmbedderConfig {
        &self.config
    }

    /// Embed an already decoded image
    pub fn embed_image(&self, image: &DynamicImage) -> Result<Embedding, EmbedError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EmbedError::Empty);
        }

        let size = self.config.thumbnail_size;
        let thumb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();

        let mut color = color_histogram(&thumb);
        let mut layout = luminance_layout(&thumb, size as usize);

        // Each block gets unit length first so neither dominates by scale,
        // then sqrt(weight) so block weights act on squared similarity.
        normalize_block(&mut color);
        normalize_block(&mut layout);
        let color_scale = self.config.color_weight.sqrt();
        let layout_scale = self.config.layout_weight.sqrt();

        let mut components = Vec::with_capacity(RASTER_DIM);
        components.extend(color.iter().map(|v| v * color_scale));
        components.extend(layout.iter().map(|v| v * layout_scale));

        Embedding::new(components).map_err(|e| EmbedError::Decode(e.to_string()))
    }
}

impl Default for RasterEmbedder {
    fn default() -> Self {
        Self::new(EmbedderConfig::default())
    }
}

impl ImageEmbedder for RasterEmbedder {
    fn dim(&self) -> usize {
        RASTER_DIM
    }

    fn embed(&self, image_bytes: &[u8]) -> Result<Embedding, EmbedError> {
        if image_bytes.len() > self.config.max_image_bytes {
            return Err(EmbedError::TooLarge {
                size: image_bytes.len(),
                limit: self.config.max_image_bytes,
            });
        }
        if image_bytes.is_empty() {
            return Err(EmbedError::Empty);
        }

        let image = image::load_from_memory(image_bytes)
            .map_err(|e| EmbedError::Decode(e.to_string()))?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            bytes = image_bytes.len(),
            "decoded image"
        );
        self.embed_image(&image)
    }
}

/// Joint RGB histogram, each bin the fraction of pixels that fall in it
fn color_histogram(thumb: &image::RgbImage) -> Vec<f32> {
    let mut bins = vec![0.0f32; COLOR_BINS * COLOR_BINS * COLOR_BINS];
    let shift = 8 - COLOR_BINS.trailing_zeros();
    let pixels = (thumb.width() * thumb.height()) as f32;

    for pixel in thumb.pixels() {
        let [r, g, b] = pixel.0;
        let r = (r >> shift) as usize;
        let g = (g >> shift) as usize;
        let b = (b >> shift) as usize;
        bins[(r * COLOR_BINS + g) * COLOR_BINS + b] += 1.0;
    }

    for bin in &mut bins {
        *bin /= pixels;
    }
    bins
}

/// Mean luminance per grid cell, centred on the image mean so that overall
/// brightness does not count as layout
fn luminance_layout(thumb: &image::RgbImage, size: usize) -> Vec<f32> {
    let mut cells = vec![0.0f32; LAYOUT_GRID * LAYOUT_GRID];
    let cell_side = size / LAYOUT_GRID;

    for (x, y, pixel) in thumb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0;
        let cx = x as usize / cell_side;
        let cy = y as usize / cell_side;
        cells[cy * LAYOUT_GRID + cx] += luma;
    }

    let per_cell = (cell_side * cell_side) as f32;
    for cell in &mut cells {
        *cell /= per_cell;
    }

    let mean = cells.iter().sum::<f32>() / cells.len() as f32;
    for cell in &mut cells {
        *cell -= mean;
    }
    cells
}

fn normalize_block(block: &mut [f32]) {
    let norm = findora_core::embedding::norm(block);
    if norm > f32::EPSILON {
        for v in block.iter_mut() {
            *v /= norm;
        }
    }
}
