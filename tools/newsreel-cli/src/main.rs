//! Newsreel CLI: compose narrated news videos from a folder of clips.
//!
//! Usage:
//!   newsreel compose <JOB_DIR>   Build the final video for a job folder
//!   newsreel pip                 Composite a talking head onto a video
//!   newsreel inspect <PATH>      Show media information
//!   newsreel check               Check for ffmpeg and ffprobe
//!   newsreel config              Print the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use newsreel_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "newsreel",
    about = "Compose narrated news videos with ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a news video from a job folder
    Compose {
        /// Job folder with videos/, news.mp3 and script.txt
        job_dir: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output width
        #[arg(long)]
        width: Option<u32>,

        /// Output height
        #[arg(long)]
        height: Option<u32>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Intro clip played before the content clips
        #[arg(long)]
        intro: Option<PathBuf>,

        /// Skip the scrolling text even if script.txt exists
        #[arg(long)]
        no_overlay: bool,

        /// Talking-head video composited onto the final output
        #[arg(long)]
        pip: Option<PathBuf>,

        /// Width of the PIP box in pixels
        #[arg(long, default_value = "256")]
        pip_width: u32,

        /// PIP corner: top-left|top-right|bottom-left|bottom-right
        #[arg(long, default_value = "bottom-right")]
        corner: String,
    },

    /// Composite a picture-in-picture onto an existing video
    Pip {
        /// Main video
        #[arg(long)]
        main: PathBuf,

        /// Talking-head video
        #[arg(long)]
        pip: PathBuf,

        /// Width of the PIP box in pixels
        #[arg(long, default_value = "256")]
        width: u32,

        /// PIP corner: top-left|top-right|bottom-left|bottom-right
        #[arg(long, default_value = "bottom-right")]
        corner: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show media information for a file
    Inspect {
        /// Path to the media file
        path: PathBuf,
    },

    /// Check system capabilities
    Check,

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut app, load_error) = match &cli.config {
        Some(path) => (AppConfig::load_from(path)?, None),
        None => match AppConfig::load_checked() {
            Ok(app) => (app, None),
            Err(e) => (AppConfig::default(), Some(e)),
        },
    };

    if cli.verbose {
        app.logging.level = "debug".to_string();
    }
    newsreel_common::logging::init_logging(&app.logging);
    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Falling back to default configuration");
    }

    match cli.command {
        Commands::Compose {
            job_dir,
            output,
            width,
            height,
            fps,
            intro,
            no_overlay,
            pip,
            pip_width,
            corner,
        } => {
            let overrides = commands::compose::Overrides {
                width,
                height,
                fps,
                intro,
                no_overlay,
                pip,
                pip_width,
                corner,
            };
            commands::compose::run(job_dir, output, overrides, app.pipeline).await
        }
        Commands::Pip {
            main,
            pip,
            width,
            corner,
            output,
        } => commands::pip::run(main, pip, width, corner, app.pipeline, output).await,
        Commands::Inspect { path } => commands::inspect::run(path, &app.pipeline),
        Commands::Check => commands::check::run(&app.pipeline),
        Commands::Config => commands::config::run(&app),
    }
}
