use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use reelcut::{
    ExportRequest, FilterKind, FrameRateTier, QualityTier, Timeline, convert_frame_rate, export,
    preview_source, probe_media,
};

#[derive(Parser, Debug)]
#[command(name = "reelcut", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a source file's media info as JSON.
    Probe(ProbeArgs),
    /// Compose a single preview frame as a PNG.
    Frame(FrameArgs),
    /// Merge the timeline and export an MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Re-encode an existing file at a constant frame rate.
    Retime(RetimeArgs),
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Source media file.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Source media files, one per timeline slot in order.
    #[arg(long = "in", required = true)]
    inputs: Vec<PathBuf>,

    /// Per-slot filters, matched to inputs by position.
    #[arg(long, value_enum)]
    filter: Vec<FilterChoice>,

    /// Timeline timestamp in seconds.
    #[arg(long)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Source media files, one per timeline slot in order.
    #[arg(long = "in", required = true)]
    inputs: Vec<PathBuf>,

    /// Per-slot filters, matched to inputs by position.
    #[arg(long, value_enum)]
    filter: Vec<FilterChoice>,

    /// Slots to brightness-boost (repeatable).
    #[arg(long)]
    brighten: Vec<usize>,

    /// Slots to temperature-shift (repeatable).
    #[arg(long)]
    warm: Vec<usize>,

    /// Slots to rotate by a quarter turn (repeat a slot to keep turning).
    #[arg(long)]
    rotate: Vec<usize>,

    /// Output quality tier.
    #[arg(long, value_enum, default_value_t = QualityChoice::Q1080)]
    quality: QualityChoice,

    /// Output frame rate.
    #[arg(long, value_enum, default_value_t = FpsChoice::F30)]
    fps: FpsChoice,

    /// Where to copy the merged export.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RetimeArgs {
    /// Input file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output file.
    #[arg(long)]
    out: PathBuf,

    /// Target constant frame rate.
    #[arg(long, value_enum, default_value_t = FpsChoice::F30)]
    fps: FpsChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FilterChoice {
    None,
    MotionBlur,
    Noir,
    AnalogFilm,
    Focus,
    Vignette,
}

impl From<FilterChoice> for FilterKind {
    fn from(c: FilterChoice) -> Self {
        match c {
            FilterChoice::None => FilterKind::None,
            FilterChoice::MotionBlur => FilterKind::MotionBlur,
            FilterChoice::Noir => FilterKind::Noir,
            FilterChoice::AnalogFilm => FilterKind::AnalogFilm,
            FilterChoice::Focus => FilterKind::Focus,
            FilterChoice::Vignette => FilterKind::Vignette,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityChoice {
    Q360,
    Q480,
    Q720,
    Q1080,
    Q2160,
}

impl From<QualityChoice> for QualityTier {
    fn from(c: QualityChoice) -> Self {
        match c {
            QualityChoice::Q360 => QualityTier::Q360,
            QualityChoice::Q480 => QualityTier::Q480,
            QualityChoice::Q720 => QualityTier::Q720,
            QualityChoice::Q1080 => QualityTier::Q1080,
            QualityChoice::Q2160 => QualityTier::Q2160,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FpsChoice {
    F24,
    F25,
    F30,
    F50,
    F60,
}

impl From<FpsChoice> for FrameRateTier {
    fn from(c: FpsChoice) -> Self {
        match c {
            FpsChoice::F24 => FrameRateTier::Fps24,
            FpsChoice::F25 => FrameRateTier::Fps25,
            FpsChoice::F30 => FrameRateTier::Fps30,
            FpsChoice::F50 => FrameRateTier::Fps50,
            FpsChoice::F60 => FrameRateTier::Fps60,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Probe(args) => cmd_probe(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Retime(args) => cmd_retime(args),
    }
}

fn build_timeline(
    inputs: &[PathBuf],
    filters: &[FilterChoice],
    brighten: &[usize],
    warm: &[usize],
    rotate: &[usize],
) -> anyhow::Result<Timeline> {
    let mut timeline = Timeline::new(inputs.len());
    for (slot, path) in inputs.iter().enumerate() {
        let info =
            probe_media(path).with_context(|| format!("probe input '{}'", path.display()))?;
        timeline.assign_media(slot, info)?;
    }
    for (slot, choice) in filters.iter().enumerate() {
        timeline.set_filter(slot, (*choice).into())?;
    }
    for &slot in brighten {
        timeline.set_brightness(slot, true)?;
    }
    for &slot in warm {
        timeline.set_temperature(slot, true)?;
    }
    for &slot in rotate {
        timeline.rotate_quarter_turn(slot)?;
    }
    Ok(timeline)
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = probe_media(&args.in_path)
        .with_context(|| format!("probe '{}'", args.in_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let timeline = build_timeline(&args.inputs, &args.filter, &[], &[], &[])?;
    let preview = preview_source(&timeline)?;
    let frame = preview.frame_at(args.at)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let timeline = build_timeline(
        &args.inputs,
        &args.filter,
        &args.brighten,
        &args.warm,
        &args.rotate,
    )?;

    let request = ExportRequest {
        quality: args.quality.into(),
        frame_rate: args.fps.into(),
    };
    let merged = export(&timeline, request).recv()?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::copy(&merged, &args.out)
        .with_context(|| format!("copy export to '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_retime(args: RetimeArgs) -> anyhow::Result<()> {
    convert_frame_rate(&args.in_path, &args.out, args.fps.into())?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
