use std::path::PathBuf;
use std::process::Command;

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

fn cli_exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_reelcut")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "reelcut.exe"
            } else {
                "reelcut"
            });
            p
        })
}

#[test]
fn cli_frame_writes_png() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }

    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();

    let clip_path = dir.join("clip.mp4");
    let out_path = dir.join("out.png");
    let _ = std::fs::remove_file(&out_path);

    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=64x64:rate=30",
            "-t",
            "1",
            "-pix_fmt",
            "yuv420p",
            "-c:v",
            "libx264",
        ])
        .arg(&clip_path)
        .status()
        .unwrap();
    assert!(status.success());

    let clip_arg = clip_path.to_string_lossy().to_string();
    let out_arg = out_path.to_string_lossy().to_string();

    let status = Command::new(cli_exe())
        .args([
            "frame",
            "--in",
            clip_arg.as_str(),
            "--filter",
            "noir",
            "--at",
            "0.5",
            "--out",
        ])
        .arg(out_arg.as_str())
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out_path.exists());
}

#[test]
fn cli_probe_reports_media_info() {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }

    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let clip_path = dir.join("probe_clip.mp4");

    let status = Command::new("ffmpeg")
        .args([
            "-v",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=128x64:rate=30",
            "-t",
            "1",
            "-pix_fmt",
            "yuv420p",
            "-c:v",
            "libx264",
        ])
        .arg(&clip_path)
        .status()
        .unwrap();
    assert!(status.success());

    let out = Command::new(cli_exe())
        .args(["probe", "--in"])
        .arg(&clip_path)
        .output()
        .unwrap();
    assert!(out.status.success());

    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("\"width\": 128"));
    assert!(text.contains("\"height\": 64"));
    assert!(text.contains("\"has_audio\": false"));
}
