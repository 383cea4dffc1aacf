//! Backdrop classification from the image perimeter.
//!
//! Every border pixel is tested for chroma dominance. When more than 10% of
//! the perimeter is chroma green or blue, the backdrop is a chroma screen and
//! its key color is the mean of the dominant bucket. Otherwise the backdrop is
//! treated as a plain color and keyed on up to eight fixed border samples.

use image::{Rgba, RgbaImage};

/// Dominance ratio a channel needs over both others to count as chroma.
const CHROMA_DOMINANCE: f32 = 1.2;
/// Minimum channel intensity for a chroma sample.
const CHROMA_INTENSITY: f32 = 60.0;
/// Share of the perimeter that must be chroma to call it a screen.
const CHROMA_COVERAGE: f32 = 0.10;

/// Kind of backdrop behind the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackdropKind {
    /// Green chroma screen.
    Green,
    /// Blue chroma screen.
    Blue,
    /// Arbitrary flat backdrop.
    Plain,
}

impl BackdropKind {
    /// Whether this backdrop is a chroma screen (green or blue).
    #[must_use]
    pub fn is_chroma(self) -> bool {
        !matches!(self, Self::Plain)
    }
}

impl std::fmt::Display for BackdropKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Green => "green screen",
            Self::Blue => "blue screen",
            Self::Plain => "plain",
        };
        f.write_str(name)
    }
}

/// A reference backdrop color. Channels may be fractional when averaged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyColor {
    /// Red channel, `0.0..=255.0`.
    pub r: f32,
    /// Green channel, `0.0..=255.0`.
    pub g: f32,
    /// Blue channel, `0.0..=255.0`.
    pub b: f32,
}

impl KeyColor {
    /// Create a key color from channel values.
    #[must_use]
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// L1 (sum of absolute channel differences) distance to an RGB color.
    #[must_use]
    pub fn l1_distance(&self, rgb: [u8; 3]) -> f32 {
        (f32::from(rgb[0]) - self.r).abs()
            + (f32::from(rgb[1]) - self.g).abs()
            + (f32::from(rgb[2]) - self.b).abs()
    }
}

impl From<[u8; 3]> for KeyColor {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(f32::from(rgb[0]), f32::from(rgb[1]), f32::from(rgb[2]))
    }
}

/// Outcome of backdrop classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Backdrop {
    /// Detected backdrop kind.
    pub kind: BackdropKind,
    /// Reference colors to match background pixels against.
    pub key_colors: Vec<KeyColor>,
}

/// Whether an RGB sample is a saturated chroma green.
#[must_use]
pub fn is_chroma_green(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    g > r * CHROMA_DOMINANCE && g > b * CHROMA_DOMINANCE && g > CHROMA_INTENSITY
}

/// Whether an RGB sample is a saturated chroma blue.
#[must_use]
pub fn is_chroma_blue(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    b > r * CHROMA_DOMINANCE && b > g * CHROMA_DOMINANCE && b > CHROMA_INTENSITY
}

/// Running channel sums for one chroma bucket.
#[derive(Default)]
struct Bucket {
    count: usize,
    sum: [f64; 3],
}

impl Bucket {
    fn add(&mut self, px: Rgba<u8>) {
        self.count += 1;
        for (sum, &value) in self.sum.iter_mut().zip(&px.0[..3]) {
            *sum += f64::from(value);
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn mean(&self) -> KeyColor {
        let n = self.count.max(1) as f64;
        KeyColor::new(
            (self.sum[0] / n) as f32,
            (self.sum[1] / n) as f32,
            (self.sum[2] / n) as f32,
        )
    }
}

/// Coordinates of every distinct border pixel, each visited once.
fn perimeter(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let top = (0..width).map(|x| (x, 0));
    let bottom = (0..width)
        .filter(move |_| height > 1)
        .map(move |x| (x, height - 1));
    let inner_rows = 1..height.saturating_sub(1);
    let left = inner_rows.clone().map(|y| (0, y));
    let right = inner_rows
        .filter(move |_| width > 1)
        .map(move |y| (width - 1, y));
    top.chain(bottom).chain(left).chain(right)
}

/// Four corners plus four edge midpoints, duplicates removed in order.
fn plain_key_colors(image: &RgbaImage) -> Vec<KeyColor> {
    let (w, h) = image.dimensions();
    let (max_x, max_y) = (w - 1, h - 1);
    let points = [
        (0, 0),
        (max_x, 0),
        (0, max_y),
        (max_x, max_y),
        (w / 2, 0),
        (0, h / 2),
        (max_x, h / 2),
        (w / 2, max_y),
    ];

    let mut seen: Vec<[u8; 3]> = Vec::with_capacity(points.len());
    for (x, y) in points {
        let px = image.get_pixel(x, y);
        let rgb = [px[0], px[1], px[2]];
        if !seen.contains(&rgb) {
            seen.push(rgb);
        }
    }
    seen.into_iter().map(KeyColor::from).collect()
}

/// Classify the backdrop of a non-empty image from its perimeter.
///
/// Callers must reject zero-sized images first; the engine does this before
/// invoking any stage. Tiny images still classify: a 1x1 image is its own
/// perimeter and its own key color.
#[must_use]
pub fn classify_backdrop(image: &RgbaImage) -> Backdrop {
    let (width, height) = image.dimensions();
    debug_assert!(width > 0 && height > 0, "classify_backdrop needs a non-empty image");

    let mut green = Bucket::default();
    let mut blue = Bucket::default();
    let mut sampled = 0usize;

    for (x, y) in perimeter(width, height) {
        let px = *image.get_pixel(x, y);
        sampled += 1;
        if is_chroma_green(px[0], px[1], px[2]) {
            green.add(px);
        } else if is_chroma_blue(px[0], px[1], px[2]) {
            blue.add(px);
        }
    }

    // A lone pixel has no frame (`2(W+H)-4` is zero), so it never counts as a screen.
    #[allow(clippy::cast_precision_loss)]
    let coverage = if sampled <= 1 {
        0.0
    } else {
        (green.count + blue.count) as f32 / sampled as f32
    };

    if coverage > CHROMA_COVERAGE {
        let (kind, bucket) = if green.count >= blue.count {
            (BackdropKind::Green, &green)
        } else {
            (BackdropKind::Blue, &blue)
        };
        return Backdrop {
            kind,
            key_colors: vec![bucket.mean()],
        };
    }

    Backdrop {
        kind: BackdropKind::Plain,
        key_colors: plain_key_colors(image),
    }
}
