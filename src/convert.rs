//! Frame-rate conversion: a standalone streaming re-encode of an existing
//! file at a constant target rate. Two strictly sequential phases over the
//! same destination: video first, then the audio track.

use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crossbeam_channel::bounded;

use crate::{
    core::FrameRgba,
    error::{ReelcutError, ReelcutResult},
    media::{MIX_CHANNELS, MIX_SAMPLE_RATE, probe_media},
    resolution::FrameRateTier,
};

/// Samples buffered between each phase's read and write cursors.
const QUEUE_DEPTH: usize = 8;
/// Audio-phase chunk size in bytes.
const AUDIO_CHUNK: usize = 64 * 1024;

/// Re-encode `input` to `output` at the tier's constant frame rate.
///
/// Phase 1 streams decoded video samples (orientation baked in by the
/// decoder's display-matrix handling) into a video-only write session at the
/// destination; phase 2 starts only after that writer finishes, restarts at
/// time zero and streams the input's single audio track into the final
/// container. Either phase failing surfaces its reason; no rollback is
/// attempted, so a half-written destination must be treated as invalid.
#[tracing::instrument]
pub fn convert_frame_rate(
    input: &Path,
    output: &Path,
    tier: FrameRateTier,
) -> ReelcutResult<()> {
    let info = probe_media(input)?;
    info.validate().map_err(|e| ReelcutError::convert(e.to_string()))?;
    if !info.has_audio {
        return Err(ReelcutError::convert(format!(
            "'{}' has no audio track",
            input.display()
        )));
    }

    let fps = tier.fps();
    let (eff_w, eff_h) = info.effective_size();
    let (width, height) = (eff_w as u32, eff_h as u32);
    if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
        return Err(ReelcutError::convert(
            "source display dimensions must be even for yuv420p re-encode",
        ));
    }

    run_video_phase(input, output, width, height, fps)?;
    tracing::debug!("video phase finished, starting audio phase");
    run_audio_phase(input, output)
}

/// Pull decoded frames from a read cursor and push each one to the write
/// cursor while it reports capacity. The bounded channel suspends the reader
/// when the writer is busy; reader end-of-stream marks this phase's writer
/// finished.
fn run_video_phase(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    fps: u32,
) -> ReelcutResult<()> {
    let frame_len = FrameRgba::byte_len(width, height);

    let mut reader = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(input)
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
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ReelcutError::convert(format!("failed to spawn video reader: {e}")))?;
    let mut reader_out = reader
        .stdout
        .take()
        .ok_or_else(|| ReelcutError::convert("failed to open video reader stdout"))?;

    let mut writer = Command::new("ffmpeg")
        .args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{width}x{height}"),
            "-r",
            &fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-crf",
            "17",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ReelcutError::convert(format!("failed to spawn video writer: {e}")))?;
    let mut writer_in = writer
        .stdin
        .take()
        .ok_or_else(|| ReelcutError::convert("failed to open video writer stdin"))?;

    let (tx, rx) = bounded::<Vec<u8>>(QUEUE_DEPTH);
    let push = std::thread::spawn(move || -> ReelcutResult<()> {
        for sample in rx {
            writer_in
                .write_all(&sample)
                .map_err(|e| ReelcutError::convert(format!("video write failed: {e}")))?;
        }
        // Dropping stdin marks the writer finished for this phase.
        Ok(())
    });

    let pulled = (|| -> ReelcutResult<()> {
        loop {
            let mut buf = vec![0u8; frame_len];
            let mut filled = 0usize;
            while filled < frame_len {
                let n = reader_out
                    .read(&mut buf[filled..])
                    .map_err(|e| ReelcutError::convert(format!("video read failed: {e}")))?;
                if n == 0 {
                    if filled == 0 {
                        return Ok(()); // end of stream
                    }
                    return Err(ReelcutError::convert("video stream ended mid-frame"));
                }
                filled += n;
            }
            if tx.send(buf).is_err() {
                return Ok(()); // writer hung up; its status surfaces below
            }
        }
    })();

    drop(tx);
    let pushed = push
        .join()
        .map_err(|_| ReelcutError::convert("video push thread panicked"))?;

    // Closing the read cursor lets the reader exit even when the writer
    // hung up mid-stream.
    drop(reader_out);
    let reader_status = reader
        .wait()
        .map_err(|e| ReelcutError::convert(format!("failed to wait for video reader: {e}")))?;
    let writer_output = writer
        .wait_with_output()
        .map_err(|e| ReelcutError::convert(format!("failed to wait for video writer: {e}")))?;

    pulled?;
    pushed?;
    if !reader_status.success() {
        return Err(ReelcutError::convert("video reader exited with an error"));
    }
    if !writer_output.status.success() {
        return Err(ReelcutError::convert(format!(
            "video writer exited with status {}: {}",
            writer_output.status,
            String::from_utf8_lossy(&writer_output.stderr).trim()
        )));
    }
    Ok(())
}

/// Stream the input's audio track from time zero into the destination
/// container, muxing it with the phase-1 video. Runs strictly after the
/// video phase; the phases never interleave.
fn run_audio_phase(input: &Path, output: &Path) -> ReelcutResult<()> {
    let staged: PathBuf = output.with_extension("mux.mp4");

    let mut reader = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(input)
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
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ReelcutError::convert(format!("failed to spawn audio reader: {e}")))?;
    let mut reader_out = reader
        .stdout
        .take()
        .ok_or_else(|| ReelcutError::convert("failed to open audio reader stdout"))?;

    let mut writer = Command::new("ffmpeg")
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(output)
        .args([
            "-f",
            "f32le",
            "-ar",
            &MIX_SAMPLE_RATE.to_string(),
            "-ac",
            &MIX_CHANNELS.to_string(),
            "-i",
            "pipe:0",
            "-map",
            "0:v",
            "-c:v",
            "copy",
            "-map",
            "1:a",
            "-c:a",
            "aac",
            "-movflags",
            "+faststart",
        ])
        .arg(&staged)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ReelcutError::convert(format!("failed to spawn audio writer: {e}")))?;
    let mut writer_in = writer
        .stdin
        .take()
        .ok_or_else(|| ReelcutError::convert("failed to open audio writer stdin"))?;

    let (tx, rx) = bounded::<Vec<u8>>(QUEUE_DEPTH);
    let push = std::thread::spawn(move || -> ReelcutResult<()> {
        for sample in rx {
            writer_in
                .write_all(&sample)
                .map_err(|e| ReelcutError::convert(format!("audio write failed: {e}")))?;
        }
        Ok(())
    });

    let pulled = (|| -> ReelcutResult<()> {
        loop {
            let mut buf = vec![0u8; AUDIO_CHUNK];
            let n = reader_out
                .read(&mut buf)
                .map_err(|e| ReelcutError::convert(format!("audio read failed: {e}")))?;
            if n == 0 {
                return Ok(());
            }
            buf.truncate(n);
            if tx.send(buf).is_err() {
                return Ok(());
            }
        }
    })();

    drop(tx);
    let pushed = push
        .join()
        .map_err(|_| ReelcutError::convert("audio push thread panicked"))?;

    drop(reader_out);
    let reader_status = reader
        .wait()
        .map_err(|e| ReelcutError::convert(format!("failed to wait for audio reader: {e}")))?;
    let writer_output = writer
        .wait_with_output()
        .map_err(|e| ReelcutError::convert(format!("failed to wait for audio writer: {e}")))?;

    pulled?;
    pushed?;
    if !reader_status.success() {
        let _ = std::fs::remove_file(&staged);
        return Err(ReelcutError::convert("audio reader exited with an error"));
    }
    if !writer_output.status.success() {
        let _ = std::fs::remove_file(&staged);
        return Err(ReelcutError::convert(format!(
            "audio writer exited with status {}: {}",
            writer_output.status,
            String::from_utf8_lossy(&writer_output.stderr).trim()
        )));
    }

    std::fs::rename(&staged, output).map_err(|e| {
        ReelcutError::convert(format!(
            "failed to move muxed output into place '{}': {e}",
            output.display()
        ))
    })
}
