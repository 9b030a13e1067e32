//! Raster encoding and source format detection

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::DynamicImage;

use crate::config::OutputFormat;
use crate::error::{HeicConvError, Result};

/// Source extension matched by default during discovery
pub const DEFAULT_SOURCE_EXTENSION: &str = "heic";

/// Serialize a raster into `format`; `quality` only applies to JPEG
pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));

            // JPEG has no alpha channel
            let written = match image {
                DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => {
                    image.write_with_encoder(encoder)
                }
                _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder),
            };
            written.map_err(|e| HeicConvError::encode(format.name(), e.to_string(), None))?;
        }
        OutputFormat::Png => {
            image
                .write_with_encoder(PngEncoder::new(&mut out))
                .map_err(|e| HeicConvError::encode(format.name(), e.to_string(), None))?;
        }
    }

    Ok(out)
}

/// Check whether `extension` is one of `extensions`, ignoring ASCII case
pub fn is_source_extension(extension: &str, extensions: &[String]) -> bool {
    extensions
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(extension))
}

/// `ftyp` brands of HEIF image and sequence files, AVIF included
const HEIF_BRANDS: [&[u8; 4]; 9] = [
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1", b"avif",
];

/// Detect whether `data` starts with an ISO-BMFF `ftyp` box carrying a HEIF brand
///
/// Both the major brand and the compatible brands are checked. The box may be
/// truncated; only the brands present in `data` are considered.
pub fn is_heif_container(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }

    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size != 0 && box_size < 16 {
        return false;
    }
    let end = if box_size == 0 { data.len() } else { box_size.min(data.len()) };

    // major brand, then minor version, then compatible brands
    let major = &data[8..12];
    let compatible = data.get(16..end).unwrap_or_default().chunks_exact(4);

    std::iter::once(major)
        .chain(compatible)
        .any(|brand| HEIF_BRANDS.iter().any(|known| brand == &known[..]))
}

/// Best guess at what a non-HEIF source actually is, for error messages
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    infer::get(data).map(|kind| kind.mime_type())
}
