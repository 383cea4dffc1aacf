//! Chroma spill suppression for subject pixels.
//!
//! Backdrop light bouncing onto the subject leaves its edges tinted with the
//! screen color. For every opaque pixel whose screen channel dominates, the
//! channel is blended toward the mean of nearby uncontaminated subject pixels,
//! proportionally to how strong the tint is. Pixels with no clean neighbor
//! fall back to clamping the screen channel to the larger of the other two.
//!
//! All neighbor reads come from a snapshot taken before the stage runs, so
//! the result does not depend on visiting order.

use image::RgbaImage;

use crate::classify::BackdropKind;

/// Neighborhood radius; the search window is `(2r+1)^2` pixels.
const NEIGHBOR_RADIUS: i64 = 3;
/// Margin a neighbor's screen channel may exceed the others and still be clean.
const CLEAN_MARGIN: f32 = 1.05;
/// Spill amount at which the correction fully adopts the neighbor mean.
const FULL_BLEND_SPILL: f32 = 80.0;

/// Channel layout for one screen color: the tinted channel and the two others.
#[derive(Debug, Clone, Copy)]
struct Channels {
    screen: usize,
    others: [usize; 2],
}

impl Channels {
    fn for_kind(kind: BackdropKind) -> Option<Self> {
        match kind {
            BackdropKind::Green => Some(Self {
                screen: 1,
                others: [0, 2],
            }),
            BackdropKind::Blue => Some(Self {
                screen: 2,
                others: [0, 1],
            }),
            BackdropKind::Plain => None,
        }
    }

    fn other_max(self, px: &[u8]) -> u8 {
        px[self.others[0]].max(px[self.others[1]])
    }

    /// A subject pixel whose screen channel strictly exceeds both others.
    fn has_spill(self, px: &[u8]) -> bool {
        px[self.screen] > self.other_max(px)
    }

    /// A neighbor whose screen channel stays within a 5% margin of the others.
    fn is_clean(self, px: &[u8]) -> bool {
        f32::from(px[self.screen]) <= f32::from(self.other_max(px)) * CLEAN_MARGIN
    }
}

/// Read-only view of the pre-stage pixel buffer.
struct Snapshot<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl Snapshot<'_> {
    fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        &self.data[idx..idx + 4]
    }

    /// Mean screen channel over clean, opaque neighbors, if any exist.
    #[allow(clippy::cast_precision_loss)]
    fn clean_neighbor_mean(&self, x: u32, y: u32, channels: Channels) -> Option<f32> {
        let mut total = 0u32;
        let mut count = 0u32;

        for dy in -NEIGHBOR_RADIUS..=NEIGHBOR_RADIUS {
            for dx in -NEIGHBOR_RADIUS..=NEIGHBOR_RADIUS {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = i64::from(x) + dx;
                let ny = i64::from(y) + dy;
                let (Ok(nx), Ok(ny)) = (u32::try_from(nx), u32::try_from(ny)) else {
                    continue;
                };
                if nx >= self.width || ny >= self.height {
                    continue;
                }

                let n = self.pixel(nx, ny);
                if n[3] > 0 && channels.is_clean(n) {
                    total += u32::from(n[channels.screen]);
                    count += 1;
                }
            }
        }

        (count > 0).then(|| total as f32 / count as f32)
    }
}

/// Corrected screen channel value for a spill pixel.
///
/// Rounds halves to even and never drops below the larger of the other two
/// channels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn corrected_value(px: &[u8], channels: Channels, neighbor_mean: Option<f32>) -> u8 {
    let other = channels.other_max(px);
    let Some(mean) = neighbor_mean else {
        return other;
    };

    let value = f32::from(px[channels.screen]);
    let spill = value - f32::from(other);
    let blend = (spill / FULL_BLEND_SPILL).clamp(0.0, 1.0);
    let blended = value * (1.0 - blend) + mean * blend;
    (blended.round_ties_even().clamp(0.0, 255.0) as u8).max(other)
}

fn despill_row(row: &mut [u8], y: u32, snapshot: &Snapshot<'_>, channels: Channels) -> usize {
    let mut corrected = 0;
    for (x, px) in (0..snapshot.width).zip(row.chunks_exact_mut(4)) {
        let src = snapshot.pixel(x, y);
        if src[3] == 0 || !channels.has_spill(src) {
            continue;
        }
        let mean = snapshot.clean_neighbor_mean(x, y, channels);
        let value = corrected_value(src, channels, mean);
        if value != src[channels.screen] {
            px[channels.screen] = value;
            corrected += 1;
        }
    }
    corrected
}

/// Suppress screen-color spill on subject pixels in place.
///
/// Does nothing for [`BackdropKind::Plain`]. Only the screen channel (G for
/// green, B for blue) of pixels with non-zero alpha is written; alpha is
/// never touched. Returns the number of pixels whose channel changed.
pub fn suppress_spill(image: &mut RgbaImage, kind: BackdropKind) -> usize {
    let Some(channels) = Channels::for_kind(kind) else {
        return 0;
    };
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0;
    }

    let before = image.as_raw().clone();
    let snapshot = Snapshot {
        data: &before,
        width,
        height,
    };
    let stride = width as usize * 4;
    let pixels: &mut [u8] = image;

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        if pixels.len() / 4 >= crate::mask::PARALLEL_PIXEL_THRESHOLD {
            return pixels
                .par_chunks_mut(stride)
                .zip(0..height)
                .map(|(row, y)| despill_row(row, y, &snapshot, channels))
                .sum();
        }
    }

    (0..height)
        .zip(pixels.chunks_exact_mut(stride))
        .map(|(y, row)| despill_row(row, y, &snapshot, channels))
        .sum()
}
