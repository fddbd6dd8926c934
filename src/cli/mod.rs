//! Command-line interface for the nowcast pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders;
use crate::core::types::{PrecipitationType, RawFrame};
use crate::core::writers;
use crate::processors::{Pipeline, RepairedSequence, TableMotionField};
use crate::visualization;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "radar-nowcast")]
#[command(about = "Precipitation nowcast from radar composite images", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Input selection shared by every command that reads frames.
#[derive(clap::Args, Clone, Default)]
struct FrameArgs {
    /// Frame filename pattern with a %d or %02d placeholder
    #[arg(long)]
    pattern: Option<String>,
    /// First frame index
    #[arg(long)]
    first: Option<u32>,
    /// Last frame index (inclusive)
    #[arg(long)]
    last: Option<u32>,
    /// Animated GIF holding the whole sequence
    #[arg(long)]
    gif: Option<PathBuf>,
}

impl FrameArgs {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(pattern) = self.pattern {
            config.frames.pattern = pattern;
        }
        if let Some(first) = self.first {
            config.frames.first = first;
        }
        if let Some(last) = self.last {
            config.frames.last = last;
        }
        if self.gif.is_some() {
            config.frames.gif = self.gif;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast precipitation windows for every configured point
    Analyze {
        #[command(flatten)]
        frames: FrameArgs,
        /// CSV of flow directions (name,dx,dy) overriding the config
        #[arg(long)]
        directions: Option<PathBuf>,
        /// Write report records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for per-point profile plots (PNG)
        #[arg(long)]
        plot_dir: Option<PathBuf>,
    },

    /// Render one classified frame with a fixed palette (PNG)
    Colorize {
        #[command(flatten)]
        frames: FrameArgs,
        /// Position in the loaded sequence (defaults to the last frame)
        #[arg(long)]
        frame: Option<usize>,
        /// Output PNG file path
        #[arg(short, long)]
        output: PathBuf,
        /// Skip overlay repair and show the raw classification
        #[arg(long)]
        raw: bool,
    },

    /// Render the static-overlay mask (PNG)
    Artifacts {
        #[command(flatten)]
        frames: FrameArgs,
        /// Output PNG file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║ {:<62} ║", title);
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        eprintln!("║ {:<20}: {:<39} ║", key, display_value);
    }
    eprintln!("╚══════════════════════════════════════════════════════════════╝");
    eprintln!();
}

/// Log the failure and exit with status 1.
fn fail(spinner: Option<&ProgressBar>, what: &str, e: impl Display) -> ! {
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    error!("{}: {:#}", what, e);
    std::process::exit(1);
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Analyze {
            frames,
            directions,
            output,
            plot_dir,
        } => {
            frames.apply(&mut config);
            cmd_analyze(config, directions, output, plot_dir);
        }
        Commands::Colorize {
            frames,
            frame,
            output,
            raw,
        } => {
            frames.apply(&mut config);
            cmd_colorize(config, frame, &output, raw);
        }
        Commands::Artifacts { frames, output } => {
            frames.apply(&mut config);
            cmd_artifacts(config, &output);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&config, &path);
        }
    }
}

/// Build the pipeline and load and repair the input sequence.
fn prepare(config: PipelineConfig) -> (Pipeline, Vec<RawFrame>, RepairedSequence) {
    let pipeline = Pipeline::new(config).unwrap_or_else(|e| fail(None, "Configuration", e));

    let spinner = create_spinner("Loading frames...");
    let raw = loaders::load_frames(&pipeline.config().frames)
        .unwrap_or_else(|e| fail(Some(&spinner), "Failed to load frames", e));

    spinner.set_message(format!("Repairing {} frames...", raw.len()));
    let sequence = pipeline
        .repair(&raw)
        .unwrap_or_else(|e| fail(Some(&spinner), "Repair failed", e));
    spinner.finish_and_clear();

    (pipeline, raw, sequence)
}

fn cmd_analyze(
    config: PipelineConfig,
    directions: Option<PathBuf>,
    output: Option<PathBuf>,
    plot_dir: Option<PathBuf>,
) {
    let start = Instant::now();

    let mut motion = TableMotionField::from_points(&config.points);
    if let Some(path) = &directions {
        let table = loaders::load_directions_csv(path)
            .unwrap_or_else(|e| fail(None, "Failed to load directions", e));
        info!("Loaded {} directions from {}", table.len(), path.display());
        motion = motion.with_overrides(table);
    }

    let points = config.points_of_interest();
    let (pipeline, raw, sequence) = prepare(config);

    let spinner = create_spinner(&format!("Analyzing {} points...", points.len()));
    let analyses = pipeline
        .analyze_all(&sequence, &points, &motion)
        .unwrap_or_else(|e| fail(Some(&spinner), "Analysis failed", e));
    spinner.finish_and_clear();

    let reports: Vec<_> = analyses.iter().map(|a| a.report().clone()).collect();
    let written = match &output {
        Some(path) => writers::write_reports(path, &reports),
        None => writers::write_reports_to(std::io::stdout().lock(), &reports, "stdout"),
    };
    if let Err(e) = written {
        fail(None, "Failed to write reports", e);
    }

    let mut plots = 0usize;
    if let Some(dir) = &plot_dir {
        for analysis in analyses.iter().filter(|a| a.failure.is_none()) {
            let path = dir.join(format!("{}_profile.png", analysis.point.name));
            match visualization::plot_profile(&path, analysis) {
                Ok(()) => plots += 1,
                Err(e) => warn!("Profile plot for '{}' failed: {}", analysis.point.name, e),
            }
        }
    }

    let determined = reports.iter().filter(|r| r.is_determined()).count();
    let failed = analyses.iter().filter(|a| a.failure.is_some()).count();
    print_summary(
        "Analysis Complete",
        &[
            ("Frames", raw.len().to_string()),
            ("Points", points.len().to_string()),
            ("Determined", determined.to_string()),
            ("Failed", failed.to_string()),
            (
                "Reports",
                output.map_or("stdout".to_string(), |p| p.display().to_string()),
            ),
            ("Plots", plots.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_colorize(config: PipelineConfig, frame: Option<usize>, output: &Path, raw_labels: bool) {
    let start = Instant::now();
    let (_, raw, sequence) = prepare(config);

    let index = frame.unwrap_or(raw.len().saturating_sub(1));
    let frames = if raw_labels {
        &sequence.classified
    } else {
        &sequence.repaired
    };
    let Some(selected) = frames.get(index) else {
        fail(
            None,
            "Frame out of range",
            format!("{} (sequence has {} frames)", index, frames.len()),
        );
    };

    if let Err(e) = writers::write_colorized_png(output, selected) {
        fail(None, "Failed to write image", e);
    }

    let storm_pixels = selected
        .as_slice()
        .iter()
        .filter(|&&v| v >= PrecipitationType::Storm && v.is_severity())
        .count();
    print_summary(
        "Colorize Complete",
        &[
            ("Frame", index.to_string()),
            ("Labels", if raw_labels { "raw" } else { "repaired" }.to_string()),
            ("Storm/hail pixels", storm_pixels.to_string()),
            ("Output PNG", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_artifacts(config: PipelineConfig, output: &Path) {
    let start = Instant::now();
    let (_, raw, sequence) = prepare(config);

    if let Err(e) = writers::write_mask_png(output, &sequence.mask) {
        fail(None, "Failed to write mask", e);
    }

    let flagged = sequence.mask.as_slice().iter().filter(|&&f| f).count();
    print_summary(
        "Artifact Mask Complete",
        &[
            ("Frames compared", raw.len().to_string()),
            ("Overlay pixels", flagged.to_string()),
            ("Output PNG", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_init_config(config: &PipelineConfig, path: &Path) {
    if let Err(e) = config.to_yaml(path) {
        fail(None, "Failed to write config", e);
    }
    println!("Wrote configuration to {}", path.display());
}
