//! Alpha mask generation with an edge-feathered match tolerance.
//!
//! Each pixel is compared against the backdrop key colors by L1 distance.
//! The allowed distance depends on how close the pixel sits to the frame:
//! lenient near the border where backdrop dominates, strict in the interior
//! where the subject lives. Chroma backdrops additionally require the pixel
//! itself to be dominated by the screen channel.
//!
//! This stage only ever writes alpha, and only the value 0.

use std::cmp::Ordering;

use image::RgbaImage;

use crate::classify::{Backdrop, BackdropKind};
use crate::error::{Error, Result};

/// Dominance ratio a pixel's screen channel needs to be erased on chroma backdrops.
const SCREEN_DOMINANCE: f32 = 1.3;

/// Pixel count above which rows are processed in parallel.
#[cfg(feature = "parallel")]
pub(crate) const PARALLEL_PIXEL_THRESHOLD: usize = 256 * 256;

/// Match tolerance as a function of normalized distance to the nearest edge.
///
/// Distances below `feather_start` use `edge`, distances above `feather_end`
/// use `center`, and the band between interpolates linearly. The only
/// constructors are [`ToleranceProfile::new`] and `Default`, so every profile
/// is non-increasing from edge to center with a non-empty feather band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceProfile {
    edge: f32,
    center: f32,
    feather_start: f32,
    feather_end: f32,
}

impl Default for ToleranceProfile {
    fn default() -> Self {
        Self {
            edge: 85.0,
            center: 15.0,
            feather_start: 0.05,
            feather_end: 0.30,
        }
    }
}

impl ToleranceProfile {
    /// Build a validated profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTolerance`] if any value is not finite or
    /// negative, if `center > edge`, or if the feather band is empty.
    pub fn new(edge: f32, center: f32, feather_start: f32, feather_end: f32) -> Result<Self> {
        let values = [edge, center, feather_start, feather_end];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::InvalidTolerance(format!(
                "values must be finite and non-negative: {values:?}"
            )));
        }
        if center > edge {
            return Err(Error::InvalidTolerance(format!(
                "center tolerance {center} exceeds edge tolerance {edge}"
            )));
        }
        if feather_start >= feather_end {
            return Err(Error::InvalidTolerance(format!(
                "feather band {feather_start}..{feather_end} is empty"
            )));
        }
        Ok(Self {
            edge,
            center,
            feather_start,
            feather_end,
        })
    }

    /// Tolerance in the frame region near the border.
    #[must_use]
    pub fn edge(&self) -> f32 {
        self.edge
    }

    /// Tolerance in the image interior.
    #[must_use]
    pub fn center(&self) -> f32 {
        self.center
    }

    /// Normalized distance where feathering begins.
    #[must_use]
    pub fn feather_start(&self) -> f32 {
        self.feather_start
    }

    /// Normalized distance where feathering ends.
    #[must_use]
    pub fn feather_end(&self) -> f32 {
        self.feather_end
    }

    /// Tolerance at a normalized edge distance.
    #[must_use]
    pub fn tolerance_at(&self, normalized_dist: f32) -> f32 {
        if normalized_dist < self.feather_start {
            self.edge
        } else if normalized_dist > self.feather_end {
            self.center
        } else {
            let progress =
                (normalized_dist - self.feather_start) / (self.feather_end - self.feather_start);
            self.edge - (self.edge - self.center) * progress
        }
    }
}

/// Distance from `(x, y)` to the nearest frame edge, normalized by the
/// half-width and half-height. Zero on the left and top border.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalized_edge_distance(x: u32, y: u32, width: u32, height: u32) -> f32 {
    let half_w = width as f32 / 2.0;
    let half_h = height as f32 / 2.0;
    let (x, y) = (x as f32, y as f32);

    let left = x / half_w;
    let right = (width as f32 - x) / half_w;
    let top = y / half_h;
    let bottom = (height as f32 - y) / half_h;
    left.min(right).min(top).min(bottom)
}

/// Whether an RGB color counts as background at the given tolerance.
///
/// The nearest key color (by L1 distance) must be strictly closer than
/// `tolerance`; chroma backdrops also require the screen channel to exceed
/// both others by 30%. A NaN tolerance matches nothing.
#[must_use]
pub fn is_background(rgb: [u8; 3], backdrop: &Backdrop, tolerance: f32) -> bool {
    let min_diff = backdrop
        .key_colors
        .iter()
        .map(|key| key.l1_distance(rgb))
        .fold(f32::INFINITY, f32::min);

    if min_diff.partial_cmp(&tolerance) != Some(Ordering::Less) {
        return false;
    }

    let (r, g, b) = (f32::from(rgb[0]), f32::from(rgb[1]), f32::from(rgb[2]));
    match backdrop.kind {
        BackdropKind::Green => g > r * SCREEN_DOMINANCE && g > b * SCREEN_DOMINANCE,
        BackdropKind::Blue => b > r * SCREEN_DOMINANCE && b > g * SCREEN_DOMINANCE,
        BackdropKind::Plain => true,
    }
}

/// Clear background pixels in one row. Returns how many were newly cleared.
fn mask_row(
    row: &mut [u8],
    y: u32,
    width: u32,
    height: u32,
    backdrop: &Backdrop,
    profile: &ToleranceProfile,
) -> usize {
    let mut cleared = 0;
    for (x, px) in (0..width).zip(row.chunks_exact_mut(4)) {
        let tolerance = profile.tolerance_at(normalized_edge_distance(x, y, width, height));
        if is_background([px[0], px[1], px[2]], backdrop, tolerance) {
            if px[3] != 0 {
                cleared += 1;
            }
            px[3] = 0;
        }
    }
    cleared
}

/// Zero the alpha of every background pixel in place.
///
/// Color channels are never written and subject pixels keep their alpha.
/// Returns the number of pixels whose alpha changed from non-zero to zero.
pub fn apply_mask(image: &mut RgbaImage, backdrop: &Backdrop, profile: &ToleranceProfile) -> usize {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0;
    }
    let stride = width as usize * 4;
    let pixels: &mut [u8] = image;

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if pixels.len() / 4 >= PARALLEL_PIXEL_THRESHOLD {
            return pixels
                .par_chunks_mut(stride)
                .zip(0..height)
                .map(|(row, y)| mask_row(row, y, width, height, backdrop, profile))
                .sum();
        }
    }

    (0..height)
        .zip(pixels.chunks_exact_mut(stride))
        .map(|(y, row)| mask_row(row, y, width, height, backdrop, profile))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeyColor;
    use image::Rgba;

    fn plain(keys: &[[u8; 3]]) -> Backdrop {
        Backdrop {
            kind: BackdropKind::Plain,
            key_colors: keys.iter().copied().map(KeyColor::from).collect(),
        }
    }

    #[test]
    fn default_profile_hits_endpoints() {
        let p = ToleranceProfile::default();
        assert!((p.tolerance_at(0.0) - 85.0).abs() < 1e-4);
        assert!((p.tolerance_at(0.049) - 85.0).abs() < 1e-4);
        assert!((p.tolerance_at(0.30) - 15.0).abs() < 1e-4);
        assert!((p.tolerance_at(0.75) - 15.0).abs() < 1e-4);
        // Midpoint of the feather band.
        assert!((p.tolerance_at(0.175) - 50.0).abs() < 1e-3);
    }

    #[test]
    fn profile_rejects_increasing_or_empty_band() {
        assert!(matches!(
            ToleranceProfile::new(10.0, 20.0, 0.05, 0.3),
            Err(Error::InvalidTolerance(_))
        ));
        assert!(ToleranceProfile::new(85.0, 15.0, 0.3, 0.3).is_err());
        assert!(ToleranceProfile::new(f32::NAN, 15.0, 0.05, 0.3).is_err());
        assert!(ToleranceProfile::new(85.0, -1.0, 0.05, 0.3).is_err());
        assert_eq!(
            ToleranceProfile::new(85.0, 15.0, 0.05, 0.30).unwrap(),
            ToleranceProfile::default()
        );
    }

    #[test]
    fn edge_distance_is_zero_on_left_and_top() {
        assert!(normalized_edge_distance(0, 5, 10, 10).abs() < f32::EPSILON);
        assert!(normalized_edge_distance(5, 0, 10, 10).abs() < f32::EPSILON);
        assert!((normalized_edge_distance(9, 5, 10, 10) - 0.2).abs() < 1e-6);
        assert!((normalized_edge_distance(5, 5, 10, 10) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn green_dominance_gates_matching_distance() {
        let backdrop = Backdrop {
            kind: BackdropKind::Green,
            key_colors: vec![KeyColor::new(30.0, 200.0, 40.0)],
        };
        // Within a generous tolerance, but green is not 30% over red.
        assert!(!is_background([190, 200, 185], &backdrop, 400.0));
        assert!(is_background([190, 200, 185], &plain(&[[30, 200, 40]]), 400.0));
        assert!(is_background([35, 205, 45], &backdrop, 85.0));
    }

    #[test]
    fn blue_dominance_gates_matching_distance() {
        let backdrop = Backdrop {
            kind: BackdropKind::Blue,
            key_colors: vec![KeyColor::new(100.0, 100.0, 125.0)],
        };
        assert!(!is_background([100, 100, 125], &backdrop, 85.0));

        let screen = Backdrop {
            kind: BackdropKind::Blue,
            key_colors: vec![KeyColor::new(20.0, 40.0, 200.0)],
        };
        assert!(is_background([20, 40, 200], &screen, 15.0));
    }

    #[test]
    fn tolerance_comparison_is_strict() {
        let backdrop = plain(&[[100, 100, 100]]);
        assert!(!is_background([110, 100, 105], &backdrop, 15.0));
        assert!(is_background([110, 100, 104], &backdrop, 15.0));
    }

    #[test]
    fn nan_tolerance_matches_nothing() {
        let backdrop = plain(&[[255, 255, 255]]);
        assert!(!is_background([255, 255, 255], &backdrop, f32::NAN));
        assert!(!is_background([255, 0, 0], &backdrop, f32::NAN));
    }

    #[test]
    fn degenerate_feather_band_keeps_subject() {
        // Bypasses `new`: at distance 0.2 the interpolation divides 0 by 0.
        let profile = ToleranceProfile {
            edge: 85.0,
            center: 15.0,
            feather_start: 0.2,
            feather_end: 0.2,
        };
        assert!(profile.tolerance_at(0.2).is_nan());

        let mut img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let cleared = apply_mask(&mut img, &plain(&[[255, 255, 255]]), &profile);
        assert_eq!(cleared, 0);
        assert!(img.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn getters_expose_validated_values() {
        let p = ToleranceProfile::new(60.0, 10.0, 0.1, 0.4).unwrap();
        assert!((p.edge() - 60.0).abs() < f32::EPSILON);
        assert!((p.center() - 10.0).abs() < f32::EPSILON);
        assert!((p.feather_start() - 0.1).abs() < f32::EPSILON);
        assert!((p.feather_end() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn nearest_key_color_wins() {
        let backdrop = plain(&[[0, 0, 0], [255, 255, 255]]);
        assert!(is_background([250, 250, 250], &backdrop, 20.0));
        assert!(is_background([5, 5, 5], &backdrop, 20.0));
        assert!(!is_background([128, 128, 128], &backdrop, 20.0));
    }

    #[test]
    fn pure_green_image_is_fully_cleared() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]));
        let backdrop = Backdrop {
            kind: BackdropKind::Green,
            key_colors: vec![KeyColor::new(0.0, 255.0, 0.0)],
        };
        let cleared = apply_mask(&mut img, &backdrop, &ToleranceProfile::default());
        assert_eq!(cleared, 16);
        assert!(img.pixels().all(|p| p[3] == 0));
        assert!(img.pixels().all(|p| p.0[..3] == [0, 255, 0]));
    }

    #[test]
    fn interior_uses_strict_tolerance() {
        // Gray drift of 30 matches at the border but not in the center.
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([130, 130, 130, 255]));
        let backdrop = plain(&[[120, 120, 120]]);
        apply_mask(&mut img, &backdrop, &ToleranceProfile::default());
        assert_eq!(img.get_pixel(0, 10)[3], 0);
        assert_eq!(img.get_pixel(10, 10)[3], 255);
    }

    #[test]
    fn second_pass_clears_nothing_new() {
        let mut img = RgbaImage::from_fn(12, 12, |x, y| {
            if (3..9).contains(&x) && (3..9).contains(&y) {
                Rgba([200, 30, 30, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let backdrop = plain(&[[255, 255, 255]]);
        let profile = ToleranceProfile::default();
        let first = apply_mask(&mut img, &backdrop, &profile);
        let snapshot = img.clone();
        let second = apply_mask(&mut img, &backdrop, &profile);
        assert!(first > 0);
        assert_eq!(second, 0);
        assert_eq!(img, snapshot);
    }
}
