//! Per-frame evaluation: look up the active fit transform, rotation and
//! filter set for a presentation timestamp and produce the final composed
//! frame.

use crate::{
    core::{Affine, Canvas, FrameRgba, Point, TimeRange},
    error::{ReelcutError, ReelcutResult},
    filters::{FilterEngine, FilterKind},
    timeline::{TimedFilter, TimedRotation},
    transform::transformed_extent,
};

/// One per-segment fit-transform interval, produced when the composed track
/// is built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedTransform {
    pub transform: Affine,
    pub range: TimeRange,
}

/// Read-only per-frame evaluator handed to the export/preview backends as
/// the visual processor.
pub struct FrameCompositor {
    canvas: Canvas,
    transforms: Vec<TimedTransform>,
    rotations: Vec<TimedRotation>,
    filters: Vec<TimedFilter>,
    engine: Box<dyn FilterEngine>,
}

impl FrameCompositor {
    pub fn new(
        canvas: Canvas,
        transforms: Vec<TimedTransform>,
        rotations: Vec<TimedRotation>,
        filters: Vec<TimedFilter>,
        engine: Box<dyn FilterEngine>,
    ) -> Self {
        Self {
            canvas,
            transforms,
            rotations,
            filters,
            engine,
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Active fit transform at `t`; identity when no interval matches.
    /// Overlapping entries resolve last-write-wins.
    pub fn fit_at(&self, t: f64) -> Affine {
        self.transforms
            .iter()
            .filter(|e| e.range.contains(t))
            .next_back()
            .map(|e| e.transform)
            .unwrap_or(Affine::IDENTITY)
    }

    /// Active rotation angle at `t`, if any interval matches.
    pub fn rotation_at(&self, t: f64) -> Option<f64> {
        self.rotations
            .iter()
            .filter(|e| e.range.contains(t))
            .next_back()
            .map(|e| e.angle_rad)
    }

    /// All filter identifiers active at `t`, in schedule order.
    pub fn filters_at(&self, t: f64) -> Vec<FilterKind> {
        self.filters
            .iter()
            .filter(|e| e.range.contains(t))
            .map(|e| e.filter)
            .collect()
    }

    /// Compose one output frame from an unfiltered source frame, in fixed
    /// order: fit transform, rotation about the canvas center (with the
    /// corrective scale for sideways quarter-turns), composite over a
    /// transparent canvas, then the active filter chain.
    pub fn compose(&self, t: f64, src: &FrameRgba) -> ReelcutResult<FrameRgba> {
        let fit = self.fit_at(t);
        let rotation = self.rotation_affine(t, fit, src);
        let mut frame = resample(src, self.canvas, rotation * fit)?;

        for kind in self.filters_at(t) {
            frame = self.engine.apply(&frame, kind)?;
        }
        Ok(frame)
    }

    /// Canvas-center rotation: translate to center, rotate, rescale so the
    /// rotated content still fits (swapping width/height reasoning for odd
    /// quarter-turns), translate back. No matching interval means an
    /// identity that still centers the canvas.
    fn rotation_affine(&self, t: f64, fit: Affine, src: &FrameRgba) -> Affine {
        let cx = f64::from(self.canvas.width) / 2.0;
        let cy = f64::from(self.canvas.height) / 2.0;
        let center = Affine::translate((cx, cy));
        let uncenter = Affine::translate((-cx, -cy));

        let Some(angle) = self.rotation_at(t) else {
            return center * uncenter;
        };

        let (mut image_w, mut image_h) =
            transformed_extent(fit, f64::from(src.width), f64::from(src.height));
        // Angles are quarter-turn multiples; odd ones present sideways.
        let quarter_turns = (angle * 2.0 / std::f64::consts::PI).round() as i64;
        if quarter_turns % 2 == 1 {
            std::mem::swap(&mut image_w, &mut image_h);
        }

        let canvas_w = f64::from(self.canvas.width);
        let canvas_h = f64::from(self.canvas.height);
        let image_ratio = image_h / image_w;
        let mut actual_w = canvas_h / image_ratio;
        if actual_w > canvas_w {
            actual_w = canvas_w;
        }
        let scale = actual_w / image_w;

        center * Affine::rotate(angle) * Affine::scale(scale) * uncenter
    }
}

/// Inverse-mapped bilinear resample of `src` through `transform` into a
/// transparent canvas-sized frame. Pixels mapping outside the source stay
/// transparent, which clips and pads to exact canvas bounds.
fn resample(src: &FrameRgba, canvas: Canvas, transform: Affine) -> ReelcutResult<FrameRgba> {
    if src.data.len() != FrameRgba::byte_len(src.width, src.height) {
        return Err(ReelcutError::validation(
            "resample source data does not match width*height*4",
        ));
    }
    let det = transform.determinant();
    if !det.is_finite() || det.abs() < 1e-12 {
        return FrameRgba::transparent(canvas.width, canvas.height);
    }
    let inv = transform.inverse();

    let mut out = FrameRgba::transparent(canvas.width, canvas.height)?;
    let src_w = src.width as i64;
    let src_h = src.height as i64;

    for y in 0..canvas.height {
        for x in 0..canvas.width {
            let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let sx = p.x - 0.5;
            let sy = p.y - 0.5;

            let x0 = sx.floor() as i64;
            let y0 = sy.floor() as i64;
            let fx = sx - x0 as f64;
            let fy = sy - y0 as f64;

            let mut acc = [0.0f64; 4];
            let mut covered = false;
            for (dx, dy, w) in [
                (0i64, 0i64, (1.0 - fx) * (1.0 - fy)),
                (1, 0, fx * (1.0 - fy)),
                (0, 1, (1.0 - fx) * fy),
                (1, 1, fx * fy),
            ] {
                let tx = x0 + dx;
                let ty = y0 + dy;
                if tx < 0 || ty < 0 || tx >= src_w || ty >= src_h {
                    continue;
                }
                covered = true;
                let idx = ((ty * src_w + tx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += w * f64::from(src.data[idx + c]);
                }
            }
            if !covered {
                continue;
            }

            let idx = ((y * canvas.width + x) as usize) * 4;
            for c in 0..4 {
                out.data[idx + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Ok(out)
}
