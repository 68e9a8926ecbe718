//! Export pipeline: assemble the composed track, attach the frame
//! compositor as the per-frame visual processor, and stream an asynchronous
//! re-encode to the shared merge destination.

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crossbeam_channel::{Receiver, bounded};

use crate::{
    compositor::FrameCompositor,
    core::FrameRgba,
    error::{ReelcutError, ReelcutResult},
    filters::CpuFilterEngine,
    media::{MIX_CHANNELS, MIX_SAMPLE_RATE, VideoFrameReader, decode_audio_f32_stereo},
    resolution::{FrameRateTier, QualityTier, negotiate},
    timeline::Timeline,
    track::{ComposedTrack, build_composed_track},
};

/// Frames buffered between the compose producer and the encode writer. The
/// bounded channel is the readiness gate: a full channel suspends the
/// producer until the writer drains.
const ENCODE_QUEUE_FRAMES: usize = 8;

/// One export invocation's parameters.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ExportRequest {
    pub quality: QualityTier,
    pub frame_rate: FrameRateTier,
}

/// Export lifecycle, logged at each transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    BuildingComposition,
    Exporting,
    Completed,
    Failed,
}

/// Final output location, or the failure reason.
pub type ExportOutcome = ReelcutResult<PathBuf>;

/// Completion signal for an in-flight export. Exactly one outcome is
/// delivered; `recv` blocks the caller's control thread until it arrives.
pub struct ExportHandle {
    rx: Receiver<ExportOutcome>,
}

impl ExportHandle {
    pub fn recv(&self) -> ExportOutcome {
        self.rx.recv().unwrap_or_else(|_| {
            Err(ReelcutError::export(
                "export worker disconnected without reporting a result",
            ))
        })
    }

    pub fn try_recv(&self) -> Option<ExportOutcome> {
        self.rx.try_recv().ok()
    }
}

/// The fixed merge destination: a singleton path shared by every export.
/// Callers must serialize export calls against it; each run clears the
/// previous file before streaming.
pub fn merge_output_path() -> PathBuf {
    std::env::temp_dir().join("reelcut_merge.mp4")
}

/// Start an export on a dedicated background thread and return immediately.
pub fn export(timeline: &Timeline, request: ExportRequest) -> ExportHandle {
    let (tx, rx) = bounded::<ExportOutcome>(1);
    let timeline = timeline.clone();
    std::thread::spawn(move || {
        let outcome = run_export(&timeline, request);
        match &outcome {
            Ok(path) => {
                tracing::debug!(state = ?ExportState::Completed, path = %path.display(), "export finished")
            }
            Err(err) => tracing::debug!(state = ?ExportState::Failed, %err, "export finished"),
        }
        let _ = tx.send(outcome);
    });
    ExportHandle { rx }
}

#[tracing::instrument(skip(timeline))]
fn run_export(timeline: &Timeline, request: ExportRequest) -> ReelcutResult<PathBuf> {
    tracing::debug!(state = ?ExportState::BuildingComposition, "export state");
    let media: Vec<_> = timeline
        .segments()
        .iter()
        .filter_map(|s| s.media.as_ref())
        .collect();
    let canvas = negotiate(&media, request.quality);
    let track = build_composed_track(timeline, canvas)?;
    if track.is_empty() {
        return Err(ReelcutError::validation(
            "export requires at least one segment with media",
        ));
    }

    let compositor = FrameCompositor::new(
        canvas,
        track.transforms.clone(),
        timeline.rotation_schedule().to_vec(),
        timeline.filter_schedule().to_vec(),
        Box::new(CpuFilterEngine),
    );

    tracing::debug!(state = ?ExportState::Exporting, width = canvas.width, height = canvas.height, "export state");
    let out_path = merge_output_path();
    remove_stale_output(&out_path);

    let fps = request.frame_rate.fps();
    let mut audio_tmp = TempFileGuard(None);
    let audio = if track.has_audio {
        let path = std::env::temp_dir().join(format!(
            "reelcut_audio_bed_{}_{}.f32le",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        write_audio_bed(&track, &path)?;
        audio_tmp.0 = Some(path.clone());
        Some(AudioInputConfig {
            path,
            sample_rate: MIX_SAMPLE_RATE,
            channels: MIX_CHANNELS,
        })
    } else {
        None
    };

    let cfg = EncodeConfig {
        width: canvas.width,
        height: canvas.height,
        fps,
        out_path: out_path.clone(),
        audio,
    };
    cfg.validate()?;

    stream_encode(&track, &compositor, cfg)?;
    drop(audio_tmp);
    Ok(out_path)
}

/// Delete any stale file at the destination. Absence is not an error; any
/// other removal failure is logged and the export proceeds.
fn remove_stale_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove stale export output");
        }
    }
}

/// Decode, compose and stream every frame of the track into the encoder.
///
/// The writer runs on its own thread draining a bounded channel; the
/// producer blocks on `send` whenever the writer is not ready, yielding
/// instead of spinning. Frames are appended in strict timeline order.
fn stream_encode(
    track: &ComposedTrack,
    compositor: &FrameCompositor,
    cfg: EncodeConfig,
) -> ReelcutResult<()> {
    let fps = cfg.fps;
    let (tx, rx) = bounded::<FrameRgba>(ENCODE_QUEUE_FRAMES);

    let writer = std::thread::spawn(move || -> ReelcutResult<()> {
        let mut encoder = FfmpegEncoder::new(cfg)?;
        for frame in rx {
            encoder.encode_frame(&frame)?;
        }
        encoder.finish()
    });

    let produced = (|| -> ReelcutResult<()> {
        for entry in &track.entries {
            let expected_frames =
                ((entry.range.duration() * f64::from(fps)).round() as u64).max(1);
            let mut reader = VideoFrameReader::open(&entry.media, fps)?;
            let mut index = 0u64;
            while let Some(src) = reader.next_frame()? {
                if index < expected_frames {
                    let t = entry.range.start + f64::from(fps).recip() * index as f64;
                    let composed = compositor.compose(t, &src)?;
                    if tx.send(composed).is_err() {
                        // Writer hung up early; its error surfaces below.
                        return Ok(());
                    }
                }
                index += 1;
            }
            reader.finish()?;
        }
        Ok(())
    })();
    drop(tx);
    let written = writer
        .join()
        .map_err(|_| ReelcutError::export("encode writer thread panicked"))?;

    produced?;
    written
}

/// Lay every audio-bearing entry's PCM at its timeline offset over silence
/// and write the interleaved f32le bed to `dest`. Entries without audio
/// contribute nothing; partial coverage is expected.
fn write_audio_bed(track: &ComposedTrack, dest: &Path) -> ReelcutResult<()> {
    let rate = f64::from(MIX_SAMPLE_RATE);
    let channels = usize::from(MIX_CHANNELS);
    let total_frames = (track.total_duration() * rate).ceil() as usize;
    let mut mix = vec![0.0f32; total_frames * channels];

    for entry in &track.entries {
        if !entry.media.has_audio {
            continue;
        }
        let pcm = decode_audio_f32_stereo(&entry.media.source_path)?;
        let offset_frames = (entry.range.start * rate).round() as usize;
        let span_frames = (entry.range.duration() * rate).round() as usize;
        let src_frames = (pcm.interleaved_f32.len() / channels).min(span_frames);

        for frame in 0..src_frames {
            let dst = (offset_frames + frame) * channels;
            if dst + channels > mix.len() {
                break;
            }
            for c in 0..channels {
                mix[dst + c] = pcm.interleaved_f32[frame * channels + c];
            }
        }
    }

    let mut bytes = Vec::with_capacity(mix.len() * 4);
    for sample in &mix {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(dest, bytes).map_err(|e| {
        ReelcutError::export(format!(
            "failed to write audio bed '{}': {e}",
            dest.display()
        ))
    })
}

/// Raw PCM audio input muxed alongside the streamed video.
#[derive(Clone, Debug)]
pub struct AudioInputConfig {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub audio: Option<AudioInputConfig>,
}

impl EncodeConfig {
    pub fn validate(&self) -> ReelcutResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelcutError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(ReelcutError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(ReelcutError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

/// Streams raw RGBA frames into the system `ffmpeg` at highest quality,
/// network-optimized (`+faststart`), h264/yuv420p with optional AAC audio.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> ReelcutResult<Self> {
        cfg.validate()?;
        if !crate::media::is_ffmpeg_on_path() {
            return Err(ReelcutError::export(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
        ]);

        if let Some(audio) = cfg.audio.as_ref() {
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&audio.path)
            .args([
                "-c:v",
                "libx264",
                "-crf",
                "17",
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "aac",
                "-shortest",
                "-movflags",
                "+faststart",
            ]);
        } else {
            cmd.args([
                "-an",
                "-c:v",
                "libx264",
                "-crf",
                "17",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ]);
        }
        cmd.arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReelcutError::export(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelcutError::export("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelcutError::export("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            scratch: vec![0u8; FrameRgba::byte_len(cfg.width, cfg.height)],
            cfg,
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
        })
    }

    pub fn encode_frame(&mut self, frame: &FrameRgba) -> ReelcutResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(ReelcutError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(ReelcutError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_over_black_to_opaque_rgba8(&mut self.scratch, &frame.data)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelcutError::export("ffmpeg encoder is already finalized"));
        };
        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            ReelcutError::export(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    pub fn finish(mut self) -> ReelcutResult<()> {
        drop(self.stdin.take());
        let status = self.child.wait().map_err(|e| {
            ReelcutError::export(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelcutError::export("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelcutError::export(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ReelcutError::export(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Flatten straight-alpha RGBA over opaque black for the encoder.
fn flatten_over_black_to_opaque_rgba8(dst: &mut [u8], src: &[u8]) -> ReelcutResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelcutError::validation(
            "flatten expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        for c in 0..3 {
            d[c] = ((u16::from(s[c]) * a + 127) / 255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_catches_bad_values() {
        let base = EncodeConfig {
            width: 640,
            height: 360,
            fps: 30,
            out_path: PathBuf::from("out.mp4"),
            audio: None,
        };
        assert!(base.validate().is_ok());
        assert!(EncodeConfig { width: 0, ..base.clone() }.validate().is_err());
        assert!(EncodeConfig { width: 641, ..base.clone() }.validate().is_err());
        assert!(EncodeConfig { fps: 0, ..base }.validate().is_err());
    }

    #[test]
    fn flatten_opaque_is_identity() {
        let src = vec![1u8, 2, 3, 255];
        let mut dst = vec![0u8; 4];
        flatten_over_black_to_opaque_rgba8(&mut dst, &src).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn flatten_half_alpha_halves_rgb() {
        let src = vec![255u8, 0, 100, 128];
        let mut dst = vec![0u8; 4];
        flatten_over_black_to_opaque_rgba8(&mut dst, &src).unwrap();
        assert_eq!(dst, vec![128, 0, 50, 255]);
    }

    #[test]
    fn export_of_empty_timeline_fails_with_a_reason() {
        let tl = Timeline::new(3);
        let outcome = export(&tl, ExportRequest::default()).recv();
        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("at least one segment"));
    }

    #[test]
    fn merge_path_is_stable_across_calls() {
        assert_eq!(merge_output_path(), merge_output_path());
        assert!(merge_output_path().ends_with("reelcut_merge.mp4"));
    }

    #[test]
    fn stale_removal_tolerates_missing_file() {
        let path = std::env::temp_dir().join("reelcut_missing_output_test.mp4");
        let _ = std::fs::remove_file(&path);
        remove_stale_output(&path); // absence is not an error
    }
}
