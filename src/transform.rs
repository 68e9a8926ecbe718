//! Fit-transform computation: maps one source's native pixels into the
//! canonical output canvas, accounting for orientation and uniform scale.

use crate::core::{Affine, Canvas, Orientation, Point};

/// The source container's preferred transform for a given orientation, in
/// the usual `[a, b, c, d, tx, ty]` layout. Applying it to the natural
/// `w x h` pixel rect lands the upright image in an origin-anchored box
/// (swapped to `h x w` for the sideways variants).
pub fn native_transform(natural_w: f64, natural_h: f64, orientation: Orientation) -> Affine {
    let (w, h) = (natural_w, natural_h);
    match orientation {
        Orientation::Up => Affine::IDENTITY,
        Orientation::UpMirrored => Affine::new([-1.0, 0.0, 0.0, 1.0, w, 0.0]),
        Orientation::Down => Affine::new([-1.0, 0.0, 0.0, -1.0, w, h]),
        Orientation::DownMirrored => Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, h]),
        Orientation::Right => Affine::new([0.0, 1.0, -1.0, 0.0, h, 0.0]),
        Orientation::RightMirrored => Affine::new([0.0, 1.0, 1.0, 0.0, 0.0, 0.0]),
        Orientation::Left => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, w]),
        Orientation::LeftMirrored => Affine::new([0.0, -1.0, -1.0, 0.0, h, w]),
    }
}

/// Axis-aligned extent of the `w x h` rect under `t`.
pub fn transformed_extent(t: Affine, w: f64, h: f64) -> (f64, f64) {
    let corners = [
        t * Point::new(0.0, 0.0),
        t * Point::new(w, 0.0),
        t * Point::new(w, h),
        t * Point::new(0.0, h),
    ];
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for c in corners {
        min_x = min_x.min(c.x);
        max_x = max_x.max(c.x);
        min_y = min_y.min(c.y);
        max_y = max_y.max(c.y);
    }
    (max_x - min_x, max_y - min_y)
}

/// Uniform letterbox scale fitting an `eff_w x eff_h` source into the canvas:
/// width-derived, falling back to height when the scaled height would
/// overflow. Never anisotropic.
fn letterbox_scale(eff_w: f64, eff_h: f64, canvas: Canvas) -> f64 {
    let canvas_w = f64::from(canvas.width);
    let canvas_h = f64::from(canvas.height);
    let ratio = eff_h / eff_w;

    let mut target_w = canvas_w;
    let target_h = canvas_w * ratio;
    if target_h > canvas_h {
        target_w = canvas_h / ratio;
    }
    target_w / eff_w
}

/// Compute the affine mapping a source's native pixels into the canvas,
/// letterboxed with uniform scale and centered.
///
/// The sideways (`Left`/`Right`) orientations keep their native transform
/// and compose: cancel the translation components already embedded in it,
/// re-center around the origin, scale, rotate by a congruent ±180°, then
/// translate to the canvas center. Every other orientation takes the direct
/// scale-then-center path — its native transform already puts the image
/// upright in an origin-anchored box.
///
/// Invoked once per segment per composition build, never per frame.
pub fn fit_transform(
    natural_w: f64,
    natural_h: f64,
    orientation: Orientation,
    canvas: Canvas,
) -> Affine {
    let preferred = native_transform(natural_w, natural_h, orientation);
    let (eff_w, eff_h) = if orientation.swaps_dimensions() {
        (natural_h, natural_w)
    } else {
        (natural_w, natural_h)
    };
    let scale = letterbox_scale(eff_w, eff_h, canvas);

    let canvas_w = f64::from(canvas.width);
    let canvas_h = f64::from(canvas.height);
    let coeffs = preferred.as_coeffs();
    let (tx, ty) = (coeffs[4], coeffs[5]);

    match orientation {
        Orientation::Right => {
            Affine::translate((canvas_w / 2.0, canvas_h / 2.0))
                * Affine::rotate(-std::f64::consts::PI)
                * Affine::scale(scale)
                * Affine::translate((natural_h / 2.0, -natural_w / 2.0))
                * Affine::translate((-tx, -ty))
                * preferred
        }
        Orientation::Left => {
            Affine::translate((canvas_w / 2.0, canvas_h / 2.0))
                * Affine::rotate(std::f64::consts::PI)
                * Affine::scale(scale)
                * Affine::translate((-natural_h / 2.0, natural_w / 2.0))
                * Affine::translate((-tx, -ty))
                * preferred
        }
        _ => {
            let (box_w, box_h) = transformed_extent(preferred, natural_w, natural_h);
            let pos_x = canvas_w / 2.0 - box_w * scale / 2.0;
            let pos_y = canvas_h / 2.0 - box_h * scale / 2.0;
            Affine::translate((pos_x, pos_y)) * Affine::scale(scale) * preferred
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn canvas(w: u32, h: u32) -> Canvas {
        Canvas::new(w, h).unwrap()
    }

    fn assert_pt(t: Affine, src: (f64, f64), expect: (f64, f64)) {
        let p = t * Point::new(src.0, src.1);
        assert!(
            (p.x - expect.0).abs() < EPS && (p.y - expect.1).abs() < EPS,
            "mapped {:?} to ({}, {}), expected {:?}",
            src,
            p.x,
            p.y,
            expect
        );
    }

    #[test]
    fn upright_same_aspect_is_identity_fit() {
        let t = fit_transform(1920.0, 1080.0, Orientation::Up, canvas(1920, 1080));
        assert_pt(t, (0.0, 0.0), (0.0, 0.0));
        assert_pt(t, (1920.0, 1080.0), (1920.0, 1080.0));
    }

    #[test]
    fn upright_downscale_centers_with_letterbox() {
        // 4:3 source into a 16:9 canvas: fit by height, centered horizontally.
        let t = fit_transform(1440.0, 1080.0, Orientation::Up, canvas(1920, 1080));
        assert_pt(t, (0.0, 0.0), (240.0, 0.0));
        assert_pt(t, (1440.0, 1080.0), (1680.0, 1080.0));
    }

    #[test]
    fn sideways_right_fills_portrait_canvas() {
        // Sensor-landscape 1920x1080 recorded rotated-right, shown 1080x1920.
        let t = fit_transform(1920.0, 1080.0, Orientation::Right, canvas(1080, 1920));
        assert_pt(t, (0.0, 0.0), (0.0, 1920.0));
        assert_pt(t, (1920.0, 1080.0), (1080.0, 0.0));
    }

    #[test]
    fn sideways_left_fills_portrait_canvas() {
        let t = fit_transform(1920.0, 1080.0, Orientation::Left, canvas(1080, 1920));
        assert_pt(t, (0.0, 0.0), (1080.0, 0.0));
        assert_pt(t, (1920.0, 1080.0), (0.0, 1920.0));
    }

    #[test]
    fn sideways_into_landscape_letterboxes_by_height() {
        // Effective 1080x1920 into 1920x1080: height-derived scale, centered.
        let t = fit_transform(1920.0, 1080.0, Orientation::Right, canvas(1920, 1080));
        let (w, h) = transformed_extent(t, 1920.0, 1080.0);
        assert!((h - 1080.0).abs() < 1e-6);
        assert!(w < 1080.0 + 1e-6);

        let center = t * Point::new(960.0, 540.0);
        assert!((center.x - 960.0).abs() < 1e-6);
        assert!((center.y - 540.0).abs() < 1e-6);
    }

    #[test]
    fn upside_down_maps_into_canvas_bounds() {
        let t = fit_transform(1920.0, 1080.0, Orientation::Down, canvas(1920, 1080));
        assert_pt(t, (0.0, 0.0), (1920.0, 1080.0));
        assert_pt(t, (1920.0, 1080.0), (0.0, 0.0));
    }

    #[test]
    fn mirrored_sideways_takes_direct_path_and_stays_centered() {
        let t = fit_transform(1920.0, 1080.0, Orientation::RightMirrored, canvas(1080, 1920));
        let (w, h) = transformed_extent(t, 1920.0, 1080.0);
        assert!((w - 1080.0).abs() < 1e-6);
        assert!((h - 1920.0).abs() < 1e-6);
        let center = t * Point::new(960.0, 540.0);
        assert!((center.x - 540.0).abs() < 1e-6);
        assert!((center.y - 960.0).abs() < 1e-6);
    }

    #[test]
    fn scale_is_uniform() {
        // Unit vectors along both axes scale by the same factor.
        let t = fit_transform(1280.0, 720.0, Orientation::Up, canvas(640, 360));
        let o = t * Point::new(0.0, 0.0);
        let dx = t * Point::new(1.0, 0.0) - o;
        let dy = t * Point::new(0.0, 1.0) - o;
        assert!((dx.hypot() - dy.hypot()).abs() < EPS);
    }
}
