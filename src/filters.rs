//! Image Filter Engine: a closed set of visual effects dispatched through a
//! single capability trait. The compositor treats each as an opaque
//! image-to-image function keyed by identifier.

use crate::{
    core::FrameRgba,
    error::{ReelcutError, ReelcutResult},
};

/// Visual effect identifier. Brightness and temperature are ordinary
/// identifiers here even though the timeline schedules them from separate
/// toggles.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    None,
    MotionBlur,
    Noir,
    Brightness,
    Temperature,
    AnalogFilm,
    Focus,
    Vignette,
}

/// Capability consumed by the frame compositor: one pure function per
/// filter identifier.
pub trait FilterEngine: Send + Sync {
    fn apply(&self, frame: &FrameRgba, kind: FilterKind) -> ReelcutResult<FrameRgba>;
}

/// CPU raster implementation of the filter set.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuFilterEngine;

impl FilterEngine for CpuFilterEngine {
    fn apply(&self, frame: &FrameRgba, kind: FilterKind) -> ReelcutResult<FrameRgba> {
        validate_frame(frame)?;
        match kind {
            FilterKind::None => Ok(frame.clone()),
            FilterKind::MotionBlur => motion_blur(frame, 10),
            FilterKind::Noir => Ok(map_rgb(frame, |r, g, b| {
                let l = luma(r, g, b);
                let boosted = ((l - 128.0) * 1.1 + 128.0).clamp(0.0, 255.0);
                (boosted, boosted, boosted)
            })),
            FilterKind::Brightness => Ok(map_rgb(frame, |r, g, b| {
                // Brightness lift of 0.4 in normalized color space.
                (
                    (r + 102.0).min(255.0),
                    (g + 102.0).min(255.0),
                    (b + 102.0).min(255.0),
                )
            })),
            FilterKind::Temperature => Ok(map_rgb(frame, |r, g, b| {
                // Warm white-point shift toward tungsten.
                ((r * 1.18).min(255.0), (g * 1.04).min(255.0), b * 0.82)
            })),
            FilterKind::AnalogFilm => Ok(analog_film(frame)),
            FilterKind::Focus => focus(frame),
            FilterKind::Vignette => Ok(vignette(frame)),
        }
    }
}

fn validate_frame(frame: &FrameRgba) -> ReelcutResult<()> {
    let expected = FrameRgba::byte_len(frame.width, frame.height);
    if frame.data.len() != expected {
        return Err(ReelcutError::validation(
            "filter input frame data does not match width*height*4",
        ));
    }
    Ok(())
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

fn map_rgb(frame: &FrameRgba, f: impl Fn(f32, f32, f32) -> (f32, f32, f32)) -> FrameRgba {
    let mut out = frame.clone();
    for px in out.data.chunks_exact_mut(4) {
        let (r, g, b) = f(f32::from(px[0]), f32::from(px[1]), f32::from(px[2]));
        px[0] = r as u8;
        px[1] = g as u8;
        px[2] = b as u8;
    }
    out
}

/// Horizontal-only box blur: a directional streak.
fn motion_blur(frame: &FrameRgba, radius: i32) -> ReelcutResult<FrameRgba> {
    let w = frame.width as i32;
    let h = frame.height as i32;
    let mut out = frame.clone();
    let span = (2 * radius + 1) as u32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 4];
            for dx in -radius..=radius {
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u32::from(frame.data[idx + c]);
                }
            }
            let idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                out.data[idx + c] = (acc[c] / span) as u8;
            }
        }
    }
    Ok(out)
}

/// Separable box blur used by the focus falloff.
fn box_blur(frame: &FrameRgba, radius: i32) -> FrameRgba {
    let w = frame.width as i32;
    let h = frame.height as i32;
    let span = (2 * radius + 1) as u32;

    let mut tmp = frame.clone();
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 4];
            for dx in -radius..=radius {
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u32::from(frame.data[idx + c]);
                }
            }
            let idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                tmp.data[idx + c] = (acc[c] / span) as u8;
            }
        }
    }

    let mut out = tmp.clone();
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 4];
            for dy in -radius..=radius {
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u32::from(tmp.data[idx + c]);
                }
            }
            let idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                out.data[idx + c] = (acc[c] / span) as u8;
            }
        }
    }
    out
}

/// Deterministic per-pixel noise in [-1, 1], FNV-1a over the coordinates.
fn grain_noise(x: u32, y: u32) -> f32 {
    let mut h = 0xcbf2_9ce4_8422_2325u64;
    for b in x.to_le_bytes().into_iter().chain(y.to_le_bytes()) {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01B3);
    }
    ((h >> 40) as f32 / 8_388_608.0) - 1.0
}

/// Sepia tone at full intensity with fine grain layered on top.
fn analog_film(frame: &FrameRgba) -> FrameRgba {
    let mut out = frame.clone();
    let w = frame.width;
    for (i, px) in out.data.chunks_exact_mut(4).enumerate() {
        let (r, g, b) = (f32::from(px[0]), f32::from(px[1]), f32::from(px[2]));
        let sr = 0.393 * r + 0.769 * g + 0.189 * b;
        let sg = 0.349 * r + 0.686 * g + 0.168 * b;
        let sb = 0.272 * r + 0.534 * g + 0.131 * b;

        let x = (i as u32) % w;
        let y = (i as u32) / w;
        let n = grain_noise(x, y) * 12.0;

        px[0] = (sr + n).clamp(0.0, 255.0) as u8;
        px[1] = (sg + n).clamp(0.0, 255.0) as u8;
        px[2] = (sb + n).clamp(0.0, 255.0) as u8;
    }
    out
}

/// Radial depth-of-field: sharp inside 0.4x the short dimension, feathering
/// into a blurred copy out to 1.2x that radius.
fn focus(frame: &FrameRgba) -> ReelcutResult<FrameRgba> {
    let blurred = box_blur(frame, 5);
    let w = frame.width as f32;
    let h = frame.height as f32;
    let r0 = 0.4 * w.min(h);
    let r1 = r0 * 1.2;
    let (cx, cy) = (w / 2.0, h / 2.0);

    let mut out = frame.clone();
    for y in 0..frame.height {
        for x in 0..frame.width {
            let d = (x as f32 - cx).hypot(y as f32 - cy);
            let t = ((d - r0) / (r1 - r0)).clamp(0.0, 1.0);
            if t == 0.0 {
                continue;
            }
            let idx = (y * frame.width + x) as usize * 4;
            for c in 0..4 {
                let sharp = f32::from(frame.data[idx + c]);
                let soft = f32::from(blurred.data[idx + c]);
                out.data[idx + c] = (sharp + (soft - sharp) * t) as u8;
            }
        }
    }
    Ok(out)
}

/// Darken radially beyond 0.5x the short dimension.
fn vignette(frame: &FrameRgba) -> FrameRgba {
    let w = frame.width as f32;
    let h = frame.height as f32;
    let r0 = 0.5 * w.min(h);
    let r1 = (w / 2.0).hypot(h / 2.0);
    let (cx, cy) = (w / 2.0, h / 2.0);

    let mut out = frame.clone();
    for y in 0..frame.height {
        for x in 0..frame.width {
            let d = (x as f32 - cx).hypot(y as f32 - cy);
            let t = ((d - r0) / (r1 - r0).max(1.0)).clamp(0.0, 1.0);
            if t == 0.0 {
                continue;
            }
            let fade = 1.0 - 0.75 * t;
            let idx = (y * frame.width + x) as usize * 4;
            for c in 0..3 {
                out.data[idx + c] = (f32::from(out.data[idx + c]) * fade) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> FrameRgba {
        let mut f = FrameRgba::transparent(w, h).unwrap();
        for px in f.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        f
    }

    #[test]
    fn none_is_identity() {
        let engine = CpuFilterEngine;
        let f = solid(4, 4, [10, 20, 30, 255]);
        assert_eq!(engine.apply(&f, FilterKind::None).unwrap(), f);
    }

    #[test]
    fn noir_desaturates() {
        let engine = CpuFilterEngine;
        let f = solid(4, 4, [200, 50, 80, 255]);
        let out = engine.apply(&f, FilterKind::Noir).unwrap();
        let px = &out.data[..4];
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn brightness_lifts_and_saturates() {
        let engine = CpuFilterEngine;
        let out = engine
            .apply(&solid(2, 2, [100, 200, 0, 255]), FilterKind::Brightness)
            .unwrap();
        assert_eq!(&out.data[..4], &[202, 255, 102, 255]);
    }

    #[test]
    fn temperature_warms() {
        let engine = CpuFilterEngine;
        let out = engine
            .apply(&solid(2, 2, [100, 100, 100, 255]), FilterKind::Temperature)
            .unwrap();
        assert!(out.data[0] > 100);
        assert!(out.data[2] < 100);
        assert_eq!(out.data[3], 255);
    }

    #[test]
    fn motion_blur_preserves_flat_regions() {
        let engine = CpuFilterEngine;
        let f = solid(32, 4, [90, 90, 90, 255]);
        let out = engine.apply(&f, FilterKind::MotionBlur).unwrap();
        assert_eq!(out, f);
    }

    #[test]
    fn vignette_darkens_corners_not_center() {
        let engine = CpuFilterEngine;
        let f = solid(64, 64, [200, 200, 200, 255]);
        let out = engine.apply(&f, FilterKind::Vignette).unwrap();
        let center = (32 * 64 + 32) * 4;
        assert_eq!(out.data[center], 200);
        assert!(out.data[0] < 200);
    }

    #[test]
    fn focus_keeps_center_sharp() {
        let engine = CpuFilterEngine;
        // Checkerboard so blur actually changes pixels.
        let mut f = FrameRgba::transparent(64, 64).unwrap();
        for y in 0..64u32 {
            for x in 0..64u32 {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                let idx = ((y * 64 + x) * 4) as usize;
                f.data[idx..idx + 4].copy_from_slice(&[v, v, v, 255]);
            }
        }
        let out = engine.apply(&f, FilterKind::Focus).unwrap();
        let center = ((32 * 64 + 32) * 4) as usize;
        assert_eq!(out.data[center], f.data[center]);
        assert_ne!(out.data[..8], f.data[..8]);
    }

    #[test]
    fn grain_is_deterministic() {
        assert_eq!(grain_noise(7, 11), grain_noise(7, 11));
        assert!((-1.0..=1.0).contains(&grain_noise(3, 9)));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let engine = CpuFilterEngine;
        let bad = FrameRgba {
            width: 4,
            height: 4,
            data: vec![0u8; 12],
        };
        assert!(engine.apply(&bad, FilterKind::Noir).is_err());
    }
}
