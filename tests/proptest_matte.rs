//! Property-based tests for the matting stages.
//!
//! These tests verify the invariants each stage promises about which
//! channels it may write.

use backdrop_matte::classify::classify_backdrop;
use backdrop_matte::mask::apply_mask;
use backdrop_matte::spill::suppress_spill;
use backdrop_matte::{BackdropKind, MatteEngine, ToleranceProfile};
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

/// Strategy for small opaque RGBA images with arbitrary colors.
fn opaque_image() -> impl Strategy<Value = RgbaImage> {
    (1u32..12, 1u32..12).prop_flat_map(|(w, h)| {
        prop::collection::vec(any::<[u8; 3]>(), (w * h) as usize).prop_map(move |colors| {
            let mut img = RgbaImage::new(w, h);
            for (px, c) in img.pixels_mut().zip(colors) {
                *px = Rgba([c[0], c[1], c[2], 255]);
            }
            img
        })
    })
}

/// Strategy for images framed by a screen color, so chroma paths get exercised.
fn framed_image() -> impl Strategy<Value = RgbaImage> {
    (
        prop_oneof![Just([20u8, 220, 30]), Just([15u8, 40, 210]), Just([240u8, 240, 240])],
        opaque_image(),
    )
        .prop_map(|(frame, mut img)| {
            let (w, h) = img.dimensions();
            for (x, y, px) in img.enumerate_pixels_mut() {
                if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                    *px = Rgba([frame[0], frame[1], frame[2], 255]);
                }
            }
            img
        })
}

/// Strategy for validated tolerance profiles.
fn profile() -> impl Strategy<Value = ToleranceProfile> {
    (0.0f32..200.0, 0.0f32..1.0, 0.0f32..0.5, 0.01f32..0.5).prop_map(
        |(edge, center_frac, start, width)| {
            ToleranceProfile::new(edge, edge * center_frac, start, start + width)
                .expect("generated profile is valid")
        },
    )
}

proptest! {
    /// Property: tolerance is edge-valued at 0, center-valued past the band,
    /// and never increases with distance.
    #[test]
    fn tolerance_is_monotonic(p in profile(), a in 0.0f32..2.0, b in 0.0f32..2.0) {
        prop_assert!((p.tolerance_at(0.0) - p.edge()).abs() < 1e-3);
        prop_assert!((p.tolerance_at(p.feather_end() + 0.01) - p.center()).abs() < 1e-3);
        let (near, far) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(p.tolerance_at(near) + 1e-3 >= p.tolerance_at(far));
    }

    /// Property: the default profile hits 85 at the border and 15 past 0.30.
    #[test]
    fn default_profile_endpoints(d in 0.3001f32..10.0) {
        let p = ToleranceProfile::default();
        prop_assert!((p.tolerance_at(0.0) - 85.0).abs() < 1e-4);
        prop_assert!((p.tolerance_at(d) - 15.0).abs() < 1e-4);
    }

    /// Property: masking writes only alpha, and only the value 0.
    #[test]
    fn mask_writes_only_alpha(img in framed_image()) {
        let backdrop = classify_backdrop(&img);
        let mut out = img.clone();
        apply_mask(&mut out, &backdrop, &ToleranceProfile::default());
        for (before, after) in img.pixels().zip(out.pixels()) {
            prop_assert_eq!(&before.0[..3], &after.0[..3]);
            prop_assert!(after[3] == before[3] || after[3] == 0);
        }
    }

    /// Property: a second mask pass clears exactly the same pixel set.
    #[test]
    fn mask_is_idempotent(img in framed_image()) {
        let backdrop = classify_backdrop(&img);
        let profile = ToleranceProfile::default();
        let mut once = img.clone();
        apply_mask(&mut once, &backdrop, &profile);
        let mut twice = once.clone();
        let newly_cleared = apply_mask(&mut twice, &backdrop, &profile);
        prop_assert_eq!(newly_cleared, 0);
        prop_assert_eq!(once, twice);
    }

    /// Property: spill suppression writes only the screen channel of opaque
    /// pixels and never drives it below the other two channels' max.
    #[test]
    fn spill_writes_only_screen_channel(
        img in framed_image(),
        kind in prop_oneof![Just(BackdropKind::Green), Just(BackdropKind::Blue)],
    ) {
        let backdrop = classify_backdrop(&img);
        let mut masked = img.clone();
        apply_mask(&mut masked, &backdrop, &ToleranceProfile::default());
        let mut out = masked.clone();
        suppress_spill(&mut out, kind);

        let (screen, others) = match kind {
            BackdropKind::Green => (1, [0, 2]),
            _ => (2, [0, 1]),
        };
        for (before, after) in masked.pixels().zip(out.pixels()) {
            prop_assert_eq!(before[3], after[3]);
            for ch in others {
                prop_assert_eq!(before[ch], after[ch]);
            }
            if before[3] == 0 {
                prop_assert_eq!(before, after);
            } else if before[screen] != after[screen] {
                let other_max = before[others[0]].max(before[others[1]]);
                prop_assert!(after[screen] >= other_max);
            }
        }
    }

    /// Property: the engine never resizes and never changes a color channel
    /// on a plain backdrop.
    #[test]
    fn engine_preserves_dimensions(img in opaque_image()) {
        let engine = MatteEngine::default();
        let mut out = img.clone();
        let report = engine.matte(&mut out).unwrap();
        prop_assert_eq!(out.dimensions(), img.dimensions());
        if report.backdrop == BackdropKind::Plain {
            for (before, after) in img.pixels().zip(out.pixels()) {
                prop_assert_eq!(&before.0[..3], &after.0[..3]);
            }
        }
    }
}
