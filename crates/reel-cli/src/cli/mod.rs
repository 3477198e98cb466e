//! CLI for the reel render-job controller.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reel_core::config;

use commands::{run_download, run_preview, run_render, run_status};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "reel")]
#[command(about = "Submit scripts for rendering, track jobs and preview timelines", long_about = None)]
pub struct Cli {
    /// Renderer base URL (overrides `renderer_url` in config.toml).
    #[arg(long, global = true, value_name = "URL")]
    pub renderer: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Submit a script, follow the job to completion and save the video.
    Render {
        /// Path to the script JSON.
        script: PathBuf,
        /// Renderer template id.
        #[arg(long, value_name = "ID")]
        template: Option<String>,
        /// Do not save the video locally; only print its link.
        #[arg(long)]
        no_save: bool,
        /// On a recoverable failure, resume a stalled job or resubmit a
        /// failed one, up to N times.
        #[arg(long, default_value_t = 0, value_name = "N")]
        retries: u32,
    },

    /// Query the renderer once for a job's status.
    Status {
        /// Job identifier returned by `render`.
        job_id: String,
    },

    /// Save a completed job's video.
    Download {
        /// Job identifier.
        job_id: String,
        /// Open the video with the desktop's default handler as well.
        #[arg(long)]
        open: bool,
        /// Save into DIR instead of the configured download dir.
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Play a script's timeline in real time and print scene changes.
    Preview {
        /// Path to the script JSON.
        script: PathBuf,
        /// Start playback at this offset.
        #[arg(long, default_value = "0", value_name = "SECONDS")]
        from: f64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        if let Some(url) = cli.renderer {
            cfg.renderer_url = url;
        }
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Render {
                script,
                template,
                no_save,
                retries,
            } => run_render(&cfg, &script, template, no_save, retries).await?,
            CliCommand::Status { job_id } => run_status(&cfg, &job_id).await?,
            CliCommand::Download { job_id, open, dir } => {
                if let Some(dir) = dir {
                    cfg.download_dir = Some(dir);
                }
                run_download(&cfg, &job_id, open).await?
            }
            CliCommand::Preview { script, from } => run_preview(&cfg, &script, from).await?,
        }

        Ok(())
    }
}
