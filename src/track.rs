use crate::{
    compositor::TimedTransform,
    core::{Canvas, TimeRange},
    error::ReelcutResult,
    media::MediaInfo,
    timeline::Timeline,
    transform::fit_transform,
};

/// One media-bearing segment placed on the composed clock.
#[derive(Clone, Debug)]
pub struct TrackEntry {
    pub media: MediaInfo,
    pub range: TimeRange,
}

/// The gapless concatenation of all insertable segments' media, with one
/// fit-transform interval per entry. The audio track exists only when at
/// least one entry supplies audio; entries without audio leave silence over
/// their range.
#[derive(Clone, Debug)]
pub struct ComposedTrack {
    pub entries: Vec<TrackEntry>,
    pub transforms: Vec<TimedTransform>,
    pub canvas: Canvas,
    pub has_audio: bool,
}

impl ComposedTrack {
    pub fn total_duration(&self) -> f64 {
        self.entries.last().map(|e| e.range.end).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry covering timestamp `t`, if any.
    pub fn entry_at(&self, t: f64) -> Option<&TrackEntry> {
        self.entries.iter().find(|e| e.range.contains(t))
    }
}

/// Build the composed track for `timeline` at the negotiated `canvas`,
/// walking slots in order and placing each insertable segment back-to-back
/// with no gaps. A segment whose media fails the insertion check is logged
/// and skipped without advancing the offset, so one bad segment does not
/// abort the composition.
pub fn build_composed_track(timeline: &Timeline, canvas: Canvas) -> ReelcutResult<ComposedTrack> {
    let mut entries = Vec::new();
    let mut transforms = Vec::new();
    let mut has_audio = false;
    let mut last_time = 0.0f64;

    for (slot, segment) in timeline.segments().iter().enumerate() {
        let Some(media) = segment.media.as_ref() else {
            continue;
        };
        if let Err(err) = media.validate() {
            tracing::warn!(slot, %err, "failed to insert segment track, skipping");
            continue;
        }

        let range = TimeRange::new(last_time, last_time + media.duration_sec)?;
        let transform = fit_transform(
            f64::from(media.width),
            f64::from(media.height),
            media.orientation,
            canvas,
        );

        has_audio |= media.has_audio;
        entries.push(TrackEntry {
            media: media.clone(),
            range,
        });
        transforms.push(TimedTransform { transform, range });
        last_time = range.end;
    }

    Ok(ComposedTrack {
        entries,
        transforms,
        canvas,
        has_audio,
    })
}
