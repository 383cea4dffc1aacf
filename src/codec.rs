//! Decode and encode boundaries around the matting stages.
//!
//! Output is always PNG since it is the lossless format every consumer can
//! read with an alpha channel.

use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};

use crate::error::{Error, Result};

/// MIME type of encoded output.
pub const OUTPUT_MIME: &str = "image/png";

/// Decode raw image bytes of any supported format into an RGBA buffer.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the bytes are not a readable image.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(Error::Decode)?;
    Ok(img.to_rgba8())
}

/// Wrap an already-decoded, row-major RGBA buffer.
///
/// # Errors
///
/// Returns [`Error::BufferSize`] if `data` is not exactly `width * height * 4`
/// bytes long.
pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<RgbaImage> {
    let expected = width as usize * height as usize * 4;
    let actual = data.len();
    if actual != expected {
        return Err(Error::BufferSize {
            width,
            height,
            expected,
            actual,
        });
    }
    RgbaImage::from_raw(width, height, data).ok_or(Error::BufferSize {
        width,
        height,
        expected,
        actual,
    })
}

/// Encode an RGBA buffer as PNG bytes.
///
/// # Errors
///
/// Returns [`Error::Codec`] if the encoder rejects the buffer.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    PngEncoder::new(&mut out)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(Error::Codec)?;
    Ok(out.into_inner())
}

/// Encode an RGBA buffer as PNG and write it to `path`.
///
/// The file is written next to its destination first and renamed into
/// place, so a failed write never leaves a truncated file at `path`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if `path` has a non-PNG extension,
/// [`Error::Codec`] if encoding fails or [`Error::Io`] if writing fails.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(ext) = path.extension() {
        if !ext.eq_ignore_ascii_case("png") {
            return Err(Error::UnsupportedFormat(format!(
                "output must be PNG to keep transparency, got .{}",
                ext.to_string_lossy()
            )));
        }
    }
    let bytes = encode_png(image)?;

    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = Path::new(&staging);

    if let Err(e) = std::fs::write(staging, &bytes) {
        let _ = std::fs::remove_file(staging);
        return Err(e.into());
    }
    std::fs::rename(staging, path).map_err(|e| {
        let _ = std::fs::remove_file(staging);
        Error::from(e)
    })
}

/// Build a `data:` URI embedding encoded PNG bytes.
#[must_use]
pub fn to_data_uri(png: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    format!("data:{OUTPUT_MIME};base64,{encoded}")
}
