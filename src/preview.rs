use crate::{
    compositor::FrameCompositor,
    core::FrameRgba,
    error::{ReelcutError, ReelcutResult},
    filters::CpuFilterEngine,
    media::decode_single_frame_rgba8,
    resolution::{QualityTier, negotiate},
    timeline::Timeline,
    track::{ComposedTrack, build_composed_track},
};

/// Composed track plus compositor at preview (tier-unspecified) geometry:
/// what playback-side collaborators render from.
pub struct PreviewSource {
    pub track: ComposedTrack,
    pub compositor: FrameCompositor,
}

/// Build the preview frame source for the current timeline state.
pub fn preview_source(timeline: &Timeline) -> ReelcutResult<PreviewSource> {
    let media: Vec<_> = timeline
        .segments()
        .iter()
        .filter_map(|s| s.media.as_ref())
        .collect();
    let canvas = negotiate(&media, QualityTier::Unspecified);
    let track = build_composed_track(timeline, canvas)?;
    let compositor = FrameCompositor::new(
        canvas,
        track.transforms.clone(),
        timeline.rotation_schedule().to_vec(),
        timeline.filter_schedule().to_vec(),
        Box::new(CpuFilterEngine),
    );
    Ok(PreviewSource { track, compositor })
}

impl PreviewSource {
    /// Decode and compose the frame at timeline timestamp `t`.
    pub fn frame_at(&self, t: f64) -> ReelcutResult<FrameRgba> {
        let entry = self.track.entry_at(t).ok_or_else(|| {
            ReelcutError::validation(format!(
                "timestamp {t:.3}s is outside the composed track (duration {:.3}s)",
                self.track.total_duration()
            ))
        })?;
        let local = t - entry.range.start;
        let src = decode_single_frame_rgba8(&entry.media, local)?;
        self.compositor.compose(t, &src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Canvas, Orientation};
    use crate::media::MediaInfo;
    use std::path::PathBuf;

    fn media(w: u32, h: u32, duration: f64) -> MediaInfo {
        MediaInfo {
            source_path: PathBuf::from("clip.mp4"),
            width: w,
            height: h,
            duration_sec: duration,
            orientation: Orientation::Up,
            has_audio: false,
        }
    }

    #[test]
    fn preview_geometry_is_tier_unspecified() {
        let mut tl = Timeline::new(2);
        tl.assign_media(0, media(1280, 720, 2.0)).unwrap();

        let preview = preview_source(&tl).unwrap();
        assert_eq!(
            preview.compositor.canvas(),
            Canvas { width: 1280, height: 720 }
        );
        assert_eq!(preview.track.entries.len(), 1);
    }

    #[test]
    fn empty_timeline_previews_the_default_canvas() {
        let tl = Timeline::new(2);
        let preview = preview_source(&tl).unwrap();
        assert_eq!(
            preview.compositor.canvas(),
            Canvas { width: 1920, height: 1080 }
        );
        assert!(preview.frame_at(0.0).is_err());
    }
}
