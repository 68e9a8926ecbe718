use std::f64::consts::{FRAC_PI_2, PI};

use crate::{
    core::TimeRange,
    error::{ReelcutError, ReelcutResult},
    filters::FilterKind,
    media::MediaInfo,
};

/// One timeline slot: optional source media plus its effect flags. Slots are
/// created empty at timeline construction, mutated in place, and never
/// destroyed individually.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub media: Option<MediaInfo>,
    pub filter: FilterKind,
    pub brightness: bool,
    pub temperature: bool,
    /// Rotation in radians, always a multiple of 90°, wrapped into [0, 2π).
    pub rotation_rad: f64,
}

/// One scheduled filter interval on the composed timeline clock.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimedFilter {
    pub filter: FilterKind,
    pub range: TimeRange,
}

/// One scheduled rotation interval on the composed timeline clock.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimedRotation {
    pub angle_rad: f64,
    pub range: TimeRange,
}

/// Ordered segment list plus the two schedules derived from it. Every
/// mutation recomputes both schedules from scratch; invalidation is total,
/// not diffed.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    segments: Vec<Segment>,
    filter_schedule: Vec<TimedFilter>,
    rotation_schedule: Vec<TimedRotation>,
}

impl Timeline {
    pub fn new(slot_count: usize) -> Self {
        Self {
            segments: vec![Segment::default(); slot_count],
            filter_schedule: Vec::new(),
            rotation_schedule: Vec::new(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, slot: usize) -> ReelcutResult<&Segment> {
        self.segments
            .get(slot)
            .ok_or_else(|| slot_error(slot, self.segments.len()))
    }

    pub fn filter_schedule(&self) -> &[TimedFilter] {
        &self.filter_schedule
    }

    pub fn rotation_schedule(&self) -> &[TimedRotation] {
        &self.rotation_schedule
    }

    /// Sum of all media-bearing segments' durations: the composed clock's end.
    pub fn total_duration(&self) -> f64 {
        self.segments
            .iter()
            .filter_map(|s| s.media.as_ref())
            .map(|m| m.duration_sec)
            .sum()
    }

    /// Replace a slot's media. The slot's filter, brightness, temperature
    /// and rotation survive; only the media reference changes.
    pub fn assign_media(&mut self, slot: usize, media: MediaInfo) -> ReelcutResult<()> {
        self.segment_mut(slot)?.media = Some(media);
        self.recompute_schedules();
        Ok(())
    }

    pub fn set_filter(&mut self, slot: usize, filter: FilterKind) -> ReelcutResult<()> {
        self.segment_mut(slot)?.filter = filter;
        self.recompute_schedules();
        Ok(())
    }

    pub fn set_brightness(&mut self, slot: usize, on: bool) -> ReelcutResult<()> {
        self.segment_mut(slot)?.brightness = on;
        self.recompute_schedules();
        Ok(())
    }

    pub fn set_temperature(&mut self, slot: usize, on: bool) -> ReelcutResult<()> {
        self.segment_mut(slot)?.temperature = on;
        self.recompute_schedules();
        Ok(())
    }

    /// Advance the slot's rotation by a quarter turn, wrapping past a full
    /// revolution back to zero. Returns the new angle.
    pub fn rotate_quarter_turn(&mut self, slot: usize) -> ReelcutResult<f64> {
        let segment = self.segment_mut(slot)?;
        let mut angle = segment.rotation_rad + FRAC_PI_2;
        if angle >= 2.0 * PI {
            angle -= 2.0 * PI;
        }
        segment.rotation_rad = angle;
        self.recompute_schedules();
        Ok(angle)
    }

    fn segment_mut(&mut self, slot: usize) -> ReelcutResult<&mut Segment> {
        let len = self.segments.len();
        self.segments
            .get_mut(slot)
            .ok_or_else(|| slot_error(slot, len))
    }

    /// Walk slots in order, accumulating each media-bearing segment's
    /// duration as the running offset. Empty slots contribute no entry and
    /// do not advance the offset, so later media lands immediately after the
    /// last media-bearing segment.
    fn recompute_schedules(&mut self) {
        self.filter_schedule.clear();
        self.rotation_schedule.clear();

        let mut last_time = 0.0f64;
        for segment in &self.segments {
            let Some(media) = segment.media.as_ref() else {
                continue;
            };
            let range = TimeRange {
                start: last_time,
                end: last_time + media.duration_sec,
            };

            self.filter_schedule.push(TimedFilter {
                filter: segment.filter,
                range,
            });
            if segment.brightness {
                self.filter_schedule.push(TimedFilter {
                    filter: FilterKind::Brightness,
                    range,
                });
            }
            if segment.temperature {
                self.filter_schedule.push(TimedFilter {
                    filter: FilterKind::Temperature,
                    range,
                });
            }
            self.rotation_schedule.push(TimedRotation {
                angle_rad: segment.rotation_rad,
                range,
            });

            last_time = range.end;
        }
    }
}

fn slot_error(slot: usize, len: usize) -> ReelcutError {
    ReelcutError::validation(format!("slot {slot} out of range (timeline has {len} slots)"))
}
