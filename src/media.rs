use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::{
    core::Orientation,
    error::{ReelcutError, ReelcutResult},
};

pub const MIX_SAMPLE_RATE: u32 = 48_000;
pub const MIX_CHANNELS: u16 = 2;

/// Everything the pipeline needs to know about one source file: natural
/// pixel size, duration, orientation metadata and audio presence.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub duration_sec: f64,
    pub orientation: Orientation,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Natural size with the orientation swap applied: the dimensions the
    /// viewer actually sees.
    pub fn effective_size(&self) -> (f64, f64) {
        if self.orientation.swaps_dimensions() {
            (f64::from(self.height), f64::from(self.width))
        } else {
            (f64::from(self.width), f64::from(self.height))
        }
    }

    /// The track-insertion check: a source that cannot contribute a valid
    /// video track fails here and gets skipped by the composition builder.
    pub fn validate(&self) -> ReelcutResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelcutError::media(format!(
                "'{}' has zero-sized video track",
                self.source_path.display()
            )));
        }
        if !self.duration_sec.is_finite() || self.duration_sec <= 0.0 {
            return Err(ReelcutError::media(format!(
                "'{}' has no positive duration",
                self.source_path.display()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioPcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Vec<f32>,
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_responds("ffmpeg")
}

pub fn is_ffprobe_on_path() -> bool {
    tool_responds("ffprobe")
}

fn tool_responds(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn probe_media(source_path: &Path) -> ReelcutResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeSideData {
        side_data_type: Option<String>,
        rotation: Option<f64>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        #[serde(default)]
        side_data_list: Vec<ProbeSideData>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| ReelcutError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ReelcutError::media(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ReelcutError::media(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            ReelcutError::media(format!(
                "no video track in '{}'",
                source_path.display()
            ))
        })?;
    let width = video_stream
        .width
        .ok_or_else(|| ReelcutError::media("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| ReelcutError::media("missing video height from ffprobe"))?;

    // ffprobe reports display-matrix rotation in counter-clockwise degrees.
    let rotation = video_stream
        .side_data_list
        .iter()
        .find(|sd| sd.side_data_type.as_deref() == Some("Display Matrix"))
        .and_then(|sd| sd.rotation)
        .map(|r| r.round() as i32)
        .unwrap_or(0);
    let orientation = Orientation::from_rotation_deg(rotation, false);

    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        duration_sec,
        orientation,
        has_audio,
    })
}

/// Pull-style decoded-frame reader over an `ffmpeg` child process.
///
/// Frames come out in natural (sensor) orientation — `-noautorotate` is
/// passed so the fit transform stays responsible for orientation — resampled
/// to a constant `fps` in strict presentation order.
pub struct VideoFrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    frame_len: usize,
    width: u32,
    height: u32,
}

impl VideoFrameReader {
    pub fn open(info: &MediaInfo, fps: u32) -> ReelcutResult<Self> {
        if fps == 0 {
            return Err(ReelcutError::validation("decode fps must be non-zero"));
        }
        info.validate()?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-noautorotate", "-i"])
            .arg(&info.source_path)
            .args([
                "-vf",
                &format!("fps={fps}"),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            ReelcutError::media(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelcutError::media("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelcutError::media("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            child,
            stdout,
            stderr_drain: Some(stderr_drain),
            frame_len: crate::core::FrameRgba::byte_len(info.width, info.height),
            width: info.width,
            height: info.height,
        })
    }

    /// Read the next decoded frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> ReelcutResult<Option<crate::core::FrameRgba>> {
        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self
                .stdout
                .read(&mut buf[filled..])
                .map_err(|e| ReelcutError::media(format!("ffmpeg frame read failed: {e}")))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ReelcutError::media(
                    "ffmpeg stream ended mid-frame (truncated rawvideo output)",
                ));
            }
            filled += n;
        }
        Ok(Some(crate::core::FrameRgba::from_data(
            self.width,
            self.height,
            buf,
        )?))
    }

    /// Wait for the decoder to exit; surfaces its stderr on failure.
    pub fn finish(mut self) -> ReelcutResult<()> {
        let status = self
            .child
            .wait()
            .map_err(|e| ReelcutError::media(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelcutError::media("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelcutError::media(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            return Err(ReelcutError::media(format!(
                "ffmpeg decode exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        Ok(())
    }
}

/// Decode a single frame at `at_sec` for preview.
pub fn decode_single_frame_rgba8(
    info: &MediaInfo,
    at_sec: f64,
) -> ReelcutResult<crate::core::FrameRgba> {
    info.validate()?;
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-noautorotate", "-ss", &format!("{at_sec:.9}")])
        .arg("-i")
        .arg(&info.source_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| ReelcutError::media(format!("failed to run ffmpeg for frame decode: {e}")))?;
    if !out.status.success() {
        return Err(ReelcutError::media(format!(
            "ffmpeg frame decode failed for '{}': {}",
            info.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected = crate::core::FrameRgba::byte_len(info.width, info.height);
    if out.stdout.len() < expected {
        return Err(ReelcutError::media(format!(
            "ffmpeg returned no frame at {:.3}s for '{}'",
            at_sec,
            info.source_path.display()
        )));
    }
    crate::core::FrameRgba::from_data(info.width, info.height, out.stdout[..expected].to_vec())
}

/// Decode a file's audio to 48 kHz interleaved stereo f32. A source without
/// an audio stream decodes to empty PCM, not an error.
pub fn decode_audio_f32_stereo(path: &Path) -> ReelcutResult<AudioPcm> {
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &MIX_CHANNELS.to_string(),
            "-ar",
            &MIX_SAMPLE_RATE.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| ReelcutError::media(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // ffmpeg reports a missing audio stream as an error; treat it as
        // empty PCM so video-only files pass through.
        if msg.contains("matches no streams")
            || msg.contains("Stream specifier")
            || msg.contains("does not contain any stream")
        {
            return Ok(AudioPcm {
                sample_rate: MIX_SAMPLE_RATE,
                channels: MIX_CHANNELS,
                interleaved_f32: Vec::new(),
            });
        }
        return Err(ReelcutError::media(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(ReelcutError::media(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate: MIX_SAMPLE_RATE,
        channels: MIX_CHANNELS,
        interleaved_f32: pcm,
    })
}
