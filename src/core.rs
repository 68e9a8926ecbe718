use crate::error::{ReelcutError, ReelcutResult};

pub use kurbo::{Affine, Point, Vec2};

/// Output canvas size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> ReelcutResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelcutError::validation("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn is_portrait(self) -> bool {
        self.height > self.width
    }
}

/// Half-open interval of seconds on the composed timeline's single clock.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64, // exclusive
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> ReelcutResult<Self> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(ReelcutError::validation(
                "TimeRange start must be finite and <= end",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn duration(self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Inclusive start, exclusive end.
    pub fn contains(self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

/// Source orientation/mirroring descriptor, recovered from the container's
/// display matrix. The four sideways variants swap effective width/height.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl Orientation {
    /// True for the 90°-rotated variants whose stored frames are sideways.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Left | Self::Right | Self::LeftMirrored | Self::RightMirrored
        )
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Self::UpMirrored | Self::DownMirrored | Self::LeftMirrored | Self::RightMirrored
        )
    }

    /// Map a display-matrix rotation (degrees, counter-clockwise, as reported
    /// by ffprobe) plus a mirror flag to an orientation descriptor.
    pub fn from_rotation_deg(rotation: i32, mirrored: bool) -> Self {
        let rot = rotation.rem_euclid(360);
        match (rot, mirrored) {
            (90, false) => Self::Right,
            (90, true) => Self::RightMirrored,
            (180, false) => Self::Down,
            (180, true) => Self::DownMirrored,
            (270, false) => Self::Left,
            (270, true) => Self::LeftMirrored,
            (_, true) => Self::UpMirrored,
            _ => Self::Up,
        }
    }
}

/// Straight-alpha RGBA8 frame buffer (`width * height * 4` bytes, row-major).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRgba {
    /// Fully transparent frame of the given size.
    pub fn transparent(width: u32, height: u32) -> ReelcutResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| ReelcutError::validation("frame buffer size overflow"))?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    pub fn from_data(width: u32, height: u32, data: Vec<u8>) -> ReelcutResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| ReelcutError::validation("frame buffer size overflow"))?;
        if data.len() != expected {
            return Err(ReelcutError::validation(format!(
                "frame data length {} does not match {}x{}x4",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }
}
