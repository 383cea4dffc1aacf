//! Strip chroma-key and plain backdrops from character photos.
//!
//! The engine inspects the image perimeter to decide whether the subject was
//! shot against a green screen, a blue screen, or an arbitrary flat backdrop,
//! then makes every backdrop pixel transparent. Matching is lenient near the
//! frame and strict toward the center so subject detail survives. On chroma
//! screens, color spill left on subject edges is blended away.
//!
//! # Quick Start
//!
//! ```no_run
//! use backdrop_matte::MatteEngine;
//!
//! let engine = MatteEngine::default();
//! let mut img = image::open("character.jpg").unwrap().to_rgba8();
//! let report = engine.matte(&mut img).unwrap();
//! println!("{} backdrop, {} pixels cleared", report.backdrop, report.cleared);
//! img.save("character.png").unwrap();
//! ```
//!
//! # Bytes in, transparent bytes out
//!
//! Compositors that treat the engine as a black box can hand it encoded
//! bytes and get PNG bytes or an embeddable data URI back.
//!
//! ```no_run
//! use backdrop_matte::MatteEngine;
//!
//! let engine = MatteEngine::default();
//! let bytes = std::fs::read("upload.webp").unwrap();
//! let uri = engine.matte_to_data_uri(&bytes).unwrap();
//! assert!(uri.starts_with("data:image/png;base64,"));
//! ```

#![deny(missing_docs)]

pub mod classify;
pub mod codec;
mod engine;
pub mod error;
pub mod mask;
pub mod spill;

pub use classify::{Backdrop, BackdropKind, KeyColor};
pub use engine::{
    default_output_path, is_supported_image, MatteEngine, MatteReport, ProcessOptions,
    ProcessResult,
};
pub use error::{Error, Result};
pub use mask::ToleranceProfile;
