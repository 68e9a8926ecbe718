#![forbid(unsafe_code)]

pub mod compositor;
pub mod convert;
pub mod core;
pub mod error;
pub mod export;
pub mod filters;
pub mod media;
pub mod preview;
pub mod resolution;
pub mod timeline;
pub mod track;
pub mod transform;

pub use compositor::{FrameCompositor, TimedTransform};
pub use convert::convert_frame_rate;
pub use core::{Affine, Canvas, FrameRgba, Orientation, TimeRange, Vec2};
pub use error::{ReelcutError, ReelcutResult};
pub use export::{ExportHandle, ExportOutcome, ExportRequest, ExportState, export, merge_output_path};
pub use filters::{CpuFilterEngine, FilterEngine, FilterKind};
pub use media::{MediaInfo, probe_media};
pub use preview::{PreviewSource, preview_source};
pub use resolution::{DEFAULT_CANVAS, FrameRateTier, QualityTier, negotiate};
pub use timeline::{Segment, TimedFilter, TimedRotation, Timeline};
pub use track::{ComposedTrack, TrackEntry, build_composed_track};
pub use transform::fit_transform;
