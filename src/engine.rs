//! Core matting engine: classify, mask, de-spill, encode.

use std::collections::hash_map::{Entry, HashMap};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::classify::{self, BackdropKind, KeyColor};
use crate::codec;
use crate::error::{Error, Result};
use crate::mask::{self, ToleranceProfile};
use crate::spill;

/// Options controlling matte processing behavior.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Edge-to-center match tolerance curve.
    pub tolerance: ToleranceProfile,
}

/// Summary of one matting run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatteReport {
    /// Detected backdrop kind.
    pub backdrop: BackdropKind,
    /// Key colors the mask was matched against.
    pub key_colors: Vec<KeyColor>,
    /// Pixels made transparent.
    pub cleared: usize,
    /// Subject pixels whose screen channel was corrected.
    pub despilled: usize,
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Where the matted image was written, on success.
    pub output: Option<PathBuf>,
    /// Whether processing succeeded.
    pub success: bool,
    /// Run summary, on success.
    pub report: Option<MatteReport>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failed(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            output: None,
            success: false,
            report: None,
            message,
        }
    }
}

/// The background removal engine.
///
/// Holds only options; every call processes one image end to end with no
/// state shared between calls, so one engine can serve many threads.
#[derive(Debug, Clone, Default)]
pub struct MatteEngine {
    options: ProcessOptions,
}

impl MatteEngine {
    /// Create an engine with the given options.
    #[must_use]
    pub fn new(options: ProcessOptions) -> Self {
        Self { options }
    }

    /// Options this engine was built with.
    #[must_use]
    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Remove the backdrop from an image in place.
    ///
    /// Runs classification, alpha masking and, for chroma screens, spill
    /// suppression. The image is validated before any pixel is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] if the image has zero width or height;
    /// the image is left untouched.
    pub fn matte(&self, image: &mut RgbaImage) -> Result<MatteReport> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Dimension { width, height });
        }

        let backdrop = classify::classify_backdrop(image);
        tracing::debug!(
            kind = %backdrop.kind,
            keys = backdrop.key_colors.len(),
            "classified {width}x{height} backdrop"
        );

        let cleared = mask::apply_mask(image, &backdrop, &self.options.tolerance);
        let despilled = spill::suppress_spill(image, backdrop.kind);
        tracing::debug!(cleared, despilled, "matte applied");

        Ok(MatteReport {
            backdrop: backdrop.kind,
            key_colors: backdrop.key_colors,
            cleared,
            despilled,
        })
    }

    /// Matte an already-decoded, row-major RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferSize`] if the buffer length does not match the
    /// dimensions, or [`Error::Dimension`] for a zero-sized image.
    pub fn matte_raw(
        &self,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<(RgbaImage, MatteReport)> {
        let mut image = codec::from_raw(width, height, data)?;
        let report = self.matte(&mut image)?;
        Ok((image, report))
    }

    /// Decode image bytes, matte them, and return PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`], [`Error::Dimension`] or [`Error::Codec`].
    pub fn matte_bytes(&self, bytes: &[u8]) -> Result<(Vec<u8>, MatteReport)> {
        let mut image = codec::decode(bytes)?;
        let report = self.matte(&mut image)?;
        let png = codec::encode_png(&image)?;
        Ok((png, report))
    }

    /// Decode image bytes, matte them, and return an embeddable PNG data URI.
    ///
    /// # Errors
    ///
    /// Same as [`MatteEngine::matte_bytes`].
    pub fn matte_to_data_uri(&self, bytes: &[u8]) -> Result<String> {
        let (png, _) = self.matte_bytes(bytes)?;
        Ok(codec::to_data_uri(&png))
    }

    /// Process a single image file: load, matte, save as PNG.
    ///
    /// Returns a [`ProcessResult`] indicating success or failure.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let bytes = match std::fs::read(input) {
            Ok(b) => b,
            Err(e) => return ProcessResult::failed(input, format!("Failed to read: {e}")),
        };

        let mut image = match codec::decode(&bytes) {
            Ok(img) => img,
            Err(e) => return ProcessResult::failed(input, format!("Failed to load: {e}")),
        };

        let report = match self.matte(&mut image) {
            Ok(r) => r,
            Err(e) => return ProcessResult::failed(input, e.to_string()),
        };

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ProcessResult::failed(
                        input,
                        format!("Failed to create output directory: {e}"),
                    );
                }
            }
        }

        if let Err(e) = codec::save_png(&image, output) {
            tracing::warn!(path = %output.display(), "save failed: {e}");
            return ProcessResult::failed(input, format!("Failed to save: {e}"));
        }

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            "wrote matted image"
        );

        ProcessResult {
            path: input.to_path_buf(),
            output: Some(output.to_path_buf()),
            success: true,
            message: format!(
                "{} backdrop, {} pixels cleared, {} de-spilled",
                report.backdrop, report.cleared, report.despilled
            ),
            report: Some(report),
        }
    }

    /// Process all supported images in a directory.
    ///
    /// Each input `name.ext` is written as `output_dir/name.png`. Inputs that
    /// share a stem keep their extension instead (`name.ext.png`), so no two
    /// inputs ever write the same file. Uses parallel iteration when the
    /// `parallel` feature is enabled (via rayon).
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };
        entries.sort();

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        tracing::info!(
            count = entries.len(),
            dir = %input_dir.display(),
            "processing directory"
        );

        let jobs = assign_outputs(&entries, output_dir);
        let run = |(input_path, output): &(&Path, std::result::Result<PathBuf, String>)| {
            match output {
                Ok(output_path) => self.process_file(input_path, output_path),
                Err(message) => ProcessResult::failed(input_path, message.clone()),
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            jobs.par_iter().map(run).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            jobs.iter().map(run).collect()
        }
    }
}

/// Pair each batch input with its output path, or with the reason it has none.
///
/// Runs before any file is written so two inputs never race on one output.
fn assign_outputs<'a>(
    entries: &'a [PathBuf],
    output_dir: &Path,
) -> Vec<(&'a Path, std::result::Result<PathBuf, String>)> {
    let mut stems: HashMap<&OsStr, usize> = HashMap::new();
    for input in entries {
        *stems.entry(input.file_stem().unwrap_or_default()).or_default() += 1;
    }

    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    entries
        .iter()
        .map(|input| {
            let shared = stems
                .get(input.file_stem().unwrap_or_default())
                .is_some_and(|&n| n > 1);
            let name = if shared {
                png_file_name_keeping_extension(input)
            } else {
                png_file_name(input)
            };
            let output = output_dir.join(name);
            let assigned = match claimed.entry(output.clone()) {
                Entry::Occupied(first) => {
                    tracing::warn!(
                        input = %input.display(),
                        first = %first.get().display(),
                        "output name collision"
                    );
                    Err(format!(
                        "Output {} is already written by {}",
                        output.display(),
                        first.get().display()
                    ))
                }
                Entry::Vacant(slot) => {
                    slot.insert(input.as_path());
                    Ok(output)
                }
            };
            (input.as_path(), assigned)
        })
        .collect()
}

/// `{stem}.png` for an input path.
fn png_file_name(input: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(".png");
    PathBuf::from(name)
}

/// `{file_name}.png` for an input path.
fn png_file_name_keeping_extension(input: &Path) -> PathBuf {
    let mut name = input.file_name().unwrap_or_default().to_os_string();
    name.push(".png");
    PathBuf::from(name)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Generate a default output path from an input path.
///
/// Output is always PNG so the alpha channel survives.
/// Example: `"photo.jpg"` becomes `"photo_matted.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_matted.png"))
}
