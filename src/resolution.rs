use crate::{core::Canvas, media::MediaInfo};

/// Default canvas when no segment carries media.
pub const DEFAULT_CANVAS: Canvas = Canvas {
    width: 1920,
    height: 1080,
};

/// Export quality tier. `Unspecified` is the preview passthrough: geometry
/// comes straight from the sources' aspect computation, no tier override.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    #[default]
    Unspecified,
    Q360,
    Q480,
    Q720,
    Q1080,
    Q2160,
}

impl QualityTier {
    /// Target height when the output is portrait.
    fn portrait_target(self) -> Option<u32> {
        match self {
            Self::Unspecified => None,
            Self::Q360 => Some(640),
            Self::Q480 => Some(852),
            Self::Q720 => Some(1280),
            Self::Q1080 => Some(1920),
            Self::Q2160 => Some(3840),
        }
    }

    /// Target width when the output is landscape or square.
    fn landscape_target(self) -> Option<u32> {
        match self {
            Self::Unspecified => None,
            Self::Q360 => Some(360),
            Self::Q480 => Some(480),
            Self::Q720 => Some(720),
            Self::Q1080 => Some(1080),
            Self::Q2160 => Some(2160),
        }
    }
}

/// Target constant frame rate for exports and re-encodes.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FrameRateTier {
    #[default]
    Unspecified,
    Fps24,
    Fps25,
    Fps30,
    Fps50,
    Fps60,
}

impl FrameRateTier {
    pub fn fps(self) -> u32 {
        match self {
            Self::Unspecified | Self::Fps30 => 30,
            Self::Fps24 => 24,
            Self::Fps25 => 25,
            Self::Fps50 => 50,
            Self::Fps60 => 60,
        }
    }
}

/// Round to the nearest multiple of 10; a remainder above 5 rounds up,
/// 5 and below round down.
fn round_to_grid(v: u32) -> u32 {
    if v % 10 > 5 { (v / 10 + 1) * 10 } else { (v / 10) * 10 }
}

/// Negotiate the concrete output geometry for a set of segments.
///
/// The aspect ratio comes from the first media-bearing segment encountered
/// (first wins, not an average); the base size from the largest single
/// effective dimension across all media. With no media at all the fixed
/// default canvas is returned untouched. The tier fixes one dimension from
/// its preset table; the other is derived from the ratio and snapped to the
/// 10-pixel grid.
pub fn negotiate(media: &[&MediaInfo], tier: QualityTier) -> Canvas {
    let mut aspect_ratio = 0.0f64;
    let mut max_size = 0.0f64;

    for info in media {
        let (eff_w, eff_h) = info.effective_size();
        if aspect_ratio == 0.0 && eff_w > 0.0 {
            aspect_ratio = eff_h / eff_w;
        }
        max_size = max_size.max(eff_w).max(eff_h);
    }

    if aspect_ratio == 0.0 || max_size == 0.0 {
        return DEFAULT_CANVAS;
    }

    // The larger dimension carries the max size; the other follows the ratio.
    let (base_w, base_h) = if aspect_ratio > 1.0 {
        (max_size / aspect_ratio, max_size)
    } else {
        (max_size, max_size * aspect_ratio)
    };

    if base_h > base_w {
        let target_h = tier.portrait_target().unwrap_or(base_h.round() as u32);
        let derived_w = (f64::from(target_h) * base_w / base_h).round() as u32;
        Canvas {
            width: round_to_grid(derived_w),
            height: target_h,
        }
    } else {
        let target_w = tier.landscape_target().unwrap_or(base_w.round() as u32);
        let derived_h = (f64::from(target_w) * base_h / base_w).round() as u32;
        Canvas {
            width: target_w,
            height: round_to_grid(derived_h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Orientation;
    use std::path::PathBuf;

    fn info(w: u32, h: u32, orientation: Orientation) -> MediaInfo {
        MediaInfo {
            source_path: PathBuf::from("clip.mp4"),
            width: w,
            height: h,
            duration_sec: 1.0,
            orientation,
            has_audio: false,
        }
    }

    #[test]
    fn no_media_yields_default_canvas() {
        assert_eq!(negotiate(&[], QualityTier::Q360), DEFAULT_CANVAS);
        assert_eq!(negotiate(&[], QualityTier::Unspecified), DEFAULT_CANVAS);
    }

    #[test]
    fn landscape_tier_table_is_exact_in_width() {
        let clip = info(1920, 1080, Orientation::Up);
        for (tier, w) in [
            (QualityTier::Q360, 360),
            (QualityTier::Q480, 480),
            (QualityTier::Q720, 720),
            (QualityTier::Q1080, 1080),
            (QualityTier::Q2160, 2160),
        ] {
            let out = negotiate(&[&clip], tier);
            assert_eq!(out.width, w);
            assert_eq!(out.height % 10, 0);
        }
    }

    #[test]
    fn portrait_tier_table_is_exact_in_height() {
        // Landscape sensor frames recorded sideways: effective 1080x1920.
        let clip = info(1920, 1080, Orientation::Right);
        for (tier, h) in [
            (QualityTier::Q360, 640),
            (QualityTier::Q480, 852),
            (QualityTier::Q720, 1280),
            (QualityTier::Q1080, 1920),
            (QualityTier::Q2160, 3840),
        ] {
            let out = negotiate(&[&clip], tier);
            assert_eq!(out.height, h);
            assert_eq!(out.width % 10, 0);
        }
    }

    #[test]
    fn derived_dimension_rounds_on_the_grid() {
        // 1920x1080 at Q720: derived height = 720 * 1080/1920 = 405 -> 400
        // (remainder 5 rounds down).
        let clip = info(1920, 1080, Orientation::Up);
        let out = negotiate(&[&clip], QualityTier::Q720);
        assert_eq!(out, Canvas { width: 720, height: 400 });

        // 852-wide portrait from a 9:16 source: 852 * 1080/1920 = 479.25
        // -> 479 -> remainder 9 rounds up to 480.
        let portrait = info(1080, 1920, Orientation::Up);
        let out = negotiate(&[&portrait], QualityTier::Q480);
        assert_eq!(out, Canvas { width: 480, height: 852 });
    }

    #[test]
    fn first_media_segment_wins_aspect_ratio() {
        let wide = info(1920, 1080, Orientation::Up);
        let square = info(1000, 1000, Orientation::Up);
        let out_a = negotiate(&[&wide, &square], QualityTier::Q1080);
        let out_b = negotiate(&[&square, &wide], QualityTier::Q1080);
        // Same inputs, different order: the leading segment's ratio decides.
        assert_ne!(out_a, out_b);
        assert_eq!(out_a.height, 610); // 1080 * (1080/1920) = 607.5 -> 608 -> 610
        assert_eq!(out_b.height, 1080); // square ratio keeps height == width
    }

    #[test]
    fn unspecified_tier_is_aspect_passthrough() {
        let clip = info(1280, 720, Orientation::Up);
        let out = negotiate(&[&clip], QualityTier::Unspecified);
        assert_eq!(out, Canvas { width: 1280, height: 720 });
    }
}
