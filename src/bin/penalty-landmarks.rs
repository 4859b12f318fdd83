use std::fs::File;
use std::io::{BufRead, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde_json::json;

use penalty_landmarks::replay::{DetectionLog, PoseLog};
use penalty_landmarks::selection::{parse_selection, Selection};
use penalty_landmarks::{
    discover, extract, DiscoveryReport, ExtractionReport, LandmarkWriter, PipelineConfig,
    VideoSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Penalty kick player tracking and landmark extraction")]
struct Opts {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// First pass: detect and track every player, report the ids found
    Discover {
        #[command(flatten)]
        input: InputArgs,

        /// Render the tracked frames to this video file
        #[cfg(feature = "opencv")]
        #[arg(long)]
        output_video: Option<PathBuf>,
    },

    /// Second pass: extract landmarks for the given track ids
    Extract {
        #[command(flatten)]
        input: InputArgs,

        /// Pose log for the video
        #[arg(short, long)]
        poses: PathBuf,

        /// Candidate track ids, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<u32>,

        /// CSV destination, defaults to ./csvs/<video stem>.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Both passes with an interactive selection in between
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Pose log for the video
        #[arg(short, long)]
        poses: PathBuf,

        /// CSV destination, defaults to ./csvs/<video stem>.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Command {
    fn input(&self) -> &InputArgs {
        match self {
            Command::Discover { input, .. } => input,
            Command::Extract { input, .. } => input,
            Command::Run { input, .. } => input,
        }
    }
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Detection log, one line per frame
    #[arg(short, long)]
    detections: PathBuf,

    /// JSON pipeline config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the detection confidence threshold
    #[arg(long)]
    confidence: Option<f32>,

    /// Decode frames from this video instead of replaying blank frames
    #[cfg(feature = "opencv")]
    #[arg(long)]
    video: Option<PathBuf>,

    /// Frame size of the replayed video
    #[arg(long, value_parser = parse_frame_size, default_value = "1920x1080")]
    frame_size: (u32, u32),

    /// Frame rate of the replayed video
    #[arg(long, default_value_t = 25.0)]
    fps: f64,
}

impl InputArgs {
    fn config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(confidence) = self.confidence {
            config.detection_confidence = confidence;
        }

        config.validate()?;

        Ok(config)
    }

    fn video_path(&self) -> &Path {
        #[cfg(feature = "opencv")]
        if let Some(video) = &self.video {
            return video;
        }

        &self.detections
    }
}

fn parse_frame_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{}`", s))?;

    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;

    if w == 0 || h == 0 {
        return Err("frame size must be non-zero".into());
    }

    Ok((w, h))
}

fn default_csv_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "landmarks".into());

    PathBuf::from("csvs").join(format!("{}.csv", stem))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_discovery(report: &DiscoveryReport) -> anyhow::Result<()> {
    if report.truncated {
        warn!("video ended early, results cover {} frames", report.stats.total_frames);
    }

    print_json(&json!({
        "detected_player_ids": report.detected_player_ids,
        "stats": report.stats,
    }))
}

fn write_landmarks<S: VideoSource>(
    source: &S,
    detections: &DetectionLog,
    poses: &PoseLog,
    config: &PipelineConfig,
    ids: &[u32],
    csv_path: &Path,
) -> anyhow::Result<ExtractionReport> {
    if let Some(dir) = csv_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let file = File::create(csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    let mut writer = LandmarkWriter::new(BufWriter::new(file))?;

    let report = extract(
        source,
        detections.detector(),
        poses.estimator(),
        config,
        ids,
        &mut writer,
    )?;

    writer.finish()?;
    info!("{} rows written to {}", report.total_frames, csv_path.display());

    Ok(report)
}

fn print_extraction(report: &ExtractionReport, csv_path: &Path) -> anyhow::Result<()> {
    print_json(&json!({
        "csv_path": csv_path,
        "player_usage_stats": report.player_usage_stats,
        "total_frames": report.total_frames,
    }))
}

/// Prompts until the reviewer gives a usable answer; end of input cancels
fn prompt_selection(ids: &[u32]) -> anyhow::Result<Selection> {
    println!("Detected players:");
    for (pos, id) in ids.iter().enumerate() {
        println!("  {}. Player {}", pos + 1, id);
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!("Select players (e.g. 1,3), `all`, or `q` to quit:");

        let line = match lines.next() {
            Some(line) => line?,
            None => return Ok(Selection::Cancel),
        };

        match parse_selection(&line, ids) {
            Ok(selection) => return Ok(selection),
            Err(err) => println!("{}", err),
        }
    }
}

fn execute<S: VideoSource>(
    cmd: &Command,
    source: &S,
    detections: &DetectionLog,
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    match cmd {
        Command::Discover { .. } => {
            let report = discover(source, detections.detector(), config)?;
            print_discovery(&report)
        }

        Command::Extract {
            input,
            poses,
            ids,
            output,
        } => {
            let poses = PoseLog::load(poses)
                .with_context(|| format!("loading pose log {}", poses.display()))?;
            let csv_path = output
                .clone()
                .unwrap_or_else(|| default_csv_path(input.video_path()));

            let report = write_landmarks(source, detections, &poses, config, ids, &csv_path)?;
            print_extraction(&report, &csv_path)
        }

        Command::Run {
            input,
            poses,
            output,
        } => {
            let poses = PoseLog::load(poses)
                .with_context(|| format!("loading pose log {}", poses.display()))?;

            let report = discover(source, detections.detector(), config)?;
            print_discovery(&report)?;

            let ids: Vec<u32> = report.detected_player_ids.iter().copied().collect();
            if ids.is_empty() {
                bail!("no players detected, nothing to extract");
            }

            let ids = match prompt_selection(&ids)? {
                Selection::Ids(ids) => ids,
                Selection::Cancel => {
                    info!("cancelled by user");
                    return Ok(());
                }
            };

            let csv_path = output
                .clone()
                .unwrap_or_else(|| default_csv_path(input.video_path()));

            let report = write_landmarks(source, detections, &poses, config, &ids, &csv_path)?;
            print_extraction(&report, &csv_path)
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    let input = opts.cmd.input();
    let config = input.config()?;

    let detections = DetectionLog::load(&input.detections)
        .with_context(|| format!("loading detection log {}", input.detections.display()))?;

    #[cfg(feature = "opencv")]
    if let Some(video) = &input.video {
        use penalty_landmarks::discovery::Discovery;
        use penalty_landmarks::render::AnnotatedWriter;
        use penalty_landmarks::video::OpenCvVideo;

        let source = OpenCvVideo::new(video);

        if let Command::Discover {
            output_video: Some(out),
            ..
        } = &opts.cmd
        {
            let report = Discovery::start(&source, detections.detector(), &config)?
                .with_sink(AnnotatedWriter::new(out))
                .run();

            return print_discovery(&report);
        }

        return execute(&opts.cmd, &source, &detections, &config);
    }

    let (width, height) = input.frame_size;
    info!(
        "replaying {} frames at {}x{}",
        detections.len(),
        width,
        height
    );

    let source = detections.source(input.frame_size, input.fps);
    execute(&opts.cmd, &source, &detections, &config)
}
