use std::path::{Path, PathBuf};
use std::process::Command;

use reelcut::{
    ExportRequest, FrameRateTier, QualityTier, Timeline, convert_frame_rate, export,
    merge_output_path, preview_source, probe_media,
};

fn ffmpeg_tools_available() -> bool {
    let check = |name: &str| {
        Command::new(name)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    };
    check("ffmpeg") && check("ffprobe")
}

fn synth_clip(path: &Path, seconds: f64, with_audio: bool) -> anyhow::Result<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args([
        "-v",
        "error",
        "-y",
        "-f",
        "lavfi",
        "-i",
        "testsrc=size=64x64:rate=30",
    ]);
    if with_audio {
        cmd.args(["-f", "lavfi", "-i", "sine=frequency=440:sample_rate=48000"]);
    }
    cmd.args(["-t", &format!("{seconds}"), "-pix_fmt", "yuv420p", "-c:v", "libx264"]);
    if with_audio {
        cmd.args(["-c:a", "aac"]);
    }
    let status = cmd.arg(path).status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating {}", path.display());
    Ok(())
}

fn synth_root(name: &str) -> anyhow::Result<PathBuf> {
    let dir = PathBuf::from("target").join("pipeline_e2e").join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[test]
fn export_merges_segments_and_replaces_on_rerun() -> anyhow::Result<()> {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return Ok(());
    }

    let dir = synth_root("export")?;
    let a = dir.join("a.mp4");
    let b = dir.join("b.mp4");
    let c = dir.join("c.mp4");
    synth_clip(&a, 2.0, false)?;
    synth_clip(&b, 3.0, true)?;
    synth_clip(&c, 1.5, false)?;

    // Slot 2 stays empty: it must contribute no entry and no offset.
    let mut timeline = Timeline::new(4);
    timeline.assign_media(0, probe_media(&a)?)?;
    timeline.assign_media(1, probe_media(&b)?)?;
    timeline.assign_media(3, probe_media(&c)?)?;
    assert!((timeline.total_duration() - 6.5).abs() < 0.1);

    let request = ExportRequest {
        quality: QualityTier::Q360,
        frame_rate: FrameRateTier::Fps24,
    };
    let merged = export(&timeline, request).recv()?;
    assert_eq!(merged, merge_output_path());
    assert!(merged.exists());

    let info = probe_media(&merged)?;
    assert_eq!((info.width, info.height), (360, 360));
    assert!((info.duration_sec - 6.5).abs() < 0.3);
    assert!(info.has_audio);

    // Second run against the same fixed destination fully replaces the first.
    let merged_again = export(&timeline, request).recv()?;
    assert_eq!(merged_again, merged);
    assert!(merged_again.exists());
    let info_again = probe_media(&merged_again)?;
    assert!((info_again.duration_sec - info.duration_sec).abs() < 0.2);

    Ok(())
}

#[test]
fn preview_frame_matches_negotiated_canvas() -> anyhow::Result<()> {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return Ok(());
    }

    let dir = synth_root("preview")?;
    let clip = dir.join("clip.mp4");
    synth_clip(&clip, 2.0, false)?;

    let mut timeline = Timeline::new(2);
    timeline.assign_media(0, probe_media(&clip)?)?;

    let preview = preview_source(&timeline)?;
    let frame = preview.frame_at(0.5)?;
    assert_eq!(frame.width, preview.compositor.canvas().width);
    assert_eq!(frame.height, preview.compositor.canvas().height);
    // The composed frame carries real, fully covered pixels.
    assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));

    Ok(())
}

#[test]
fn retime_re_encodes_at_the_target_rate() -> anyhow::Result<()> {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return Ok(());
    }

    let dir = synth_root("retime")?;
    let input = dir.join("input.mp4");
    let output = dir.join("retimed.mp4");
    synth_clip(&input, 2.0, true)?;

    convert_frame_rate(&input, &output, FrameRateTier::Fps25)?;

    let info = probe_media(&output)?;
    assert!(info.has_audio);
    assert!((info.duration_sec - 2.0).abs() < 0.3);

    // The video stream really runs at the requested constant rate.
    let probe = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate",
            "-of",
            "csv=p=0",
        ])
        .arg(&output)
        .output()?;
    let rate = String::from_utf8_lossy(&probe.stdout);
    assert_eq!(rate.trim(), "25/1");

    Ok(())
}

#[test]
fn retime_without_audio_track_fails() -> anyhow::Result<()> {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return Ok(());
    }

    let dir = synth_root("retime_noaudio")?;
    let input = dir.join("silent.mp4");
    let output = dir.join("out.mp4");
    synth_clip(&input, 1.0, false)?;

    let err = convert_frame_rate(&input, &output, FrameRateTier::Fps30).unwrap_err();
    assert!(err.to_string().contains("no audio track"));
    Ok(())
}
