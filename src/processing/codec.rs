//! HEIF container decoding
//!
//! The bitstream decoder itself is libheif, linked through the default `heif`
//! feature. Everything above it talks to the [`HeifDecoder`] trait so batches
//! can also be driven by other decoders, or built with `--no-default-features`.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;

use crate::error::{HeicConvError, Result};

/// Decoded raster owned by a single worker
#[derive(Debug, Clone)]
pub struct DecodedImage {
    raster: DynamicImage,
}

impl DecodedImage {
    pub fn new(raster: DynamicImage) -> Self {
        Self { raster }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &DynamicImage {
        &self.raster
    }
}

/// Turns the bytes of a HEIF container into its primary image
///
/// Implementations run on the blocking pool and must be shareable between
/// workers.
pub trait HeifDecoder: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Decode the primary image of `data`; `source` is only used for error context
    fn decode(&self, data: &[u8], source: &Path) -> Result<DecodedImage>;
}

/// Decoder backed by the native libheif library
#[cfg(feature = "heif")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LibheifDecoder;

#[cfg(feature = "heif")]
impl HeifDecoder for LibheifDecoder {
    fn name(&self) -> &'static str {
        "libheif"
    }

    fn decode(&self, data: &[u8], source: &Path) -> Result<DecodedImage> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};
        use tracing::debug;

        let file = Some(source.to_path_buf());

        let context = HeifContext::read_from_bytes(data)
            .map_err(|e| HeicConvError::context_creation(e.to_string(), file.clone()))?;

        let handle = context.primary_image_handle().map_err(|e| {
            HeicConvError::decode(format!("could not get primary image: {}", e), file.clone())
        })?;

        let width = handle.width();
        let height = handle.height();
        let has_alpha = handle.has_alpha_channel();
        debug!("Primary image {}x{} (alpha: {})", width, height, has_alpha);

        let chroma = if has_alpha { RgbChroma::Rgba } else { RgbChroma::Rgb };
        let image = LibHeif::new()
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .map_err(|e| HeicConvError::decode(e.to_string(), file.clone()))?;

        let planes = image.planes();
        let plane = planes.interleaved.ok_or_else(|| {
            HeicConvError::decode("decoded image has no interleaved plane", file.clone())
        })?;

        let channels = if has_alpha { 4 } else { 3 };
        let pixels = pack_rows(plane.data, plane.stride, width, height, channels)
            .ok_or_else(|| HeicConvError::decode("decoded plane is truncated", file.clone()))?;

        let raster = if has_alpha {
            image::RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
        } else {
            image::RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        };

        raster
            .map(DecodedImage::new)
            .ok_or_else(|| HeicConvError::decode("pixel buffer does not match dimensions", file))
    }
}

/// Stand-in used when the crate is built with `--no-default-features`
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDecoder;

impl HeifDecoder for UnavailableDecoder {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn decode(&self, _data: &[u8], source: &Path) -> Result<DecodedImage> {
        Err(HeicConvError::context_creation(
            "HEIF support was not compiled in (rebuild with the `heif` feature)",
            Some(source.to_path_buf()),
        ))
    }
}

/// The decoder this build was compiled with
pub fn default_decoder() -> Arc<dyn HeifDecoder> {
    #[cfg(feature = "heif")]
    {
        Arc::new(LibheifDecoder)
    }
    #[cfg(not(feature = "heif"))]
    {
        Arc::new(UnavailableDecoder)
    }
}

/// Copy `height` rows of `width * channels` bytes out of a strided plane
pub fn pack_rows(
    data: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    channels: usize,
) -> Option<Vec<u8>> {
    let row_len = width as usize * channels;
    if stride < row_len {
        return None;
    }

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(data.get(start..start + row_len)?);
    }
    Some(pixels)
}
