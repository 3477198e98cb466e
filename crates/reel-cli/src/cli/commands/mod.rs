//! CLI command handlers, one per file.

mod download;
mod preview;
mod render;
mod status;

pub use download::run_download;
pub use preview::run_preview;
pub use render::run_render;
pub use status::run_status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reel_core::config::ReelConfig;
use reel_core::download::{DownloadCoordinator, LocalArtifactHost};
use reel_core::job::JobId;
use reel_core::renderer::{HttpRenderer, Renderer, StatusReport};
use reel_core::script::Script;

/// Read and parse a script JSON file.
fn load_script(path: &Path) -> Result<Script> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    let script: Script = serde_json::from_str(&data)
        .with_context(|| format!("parsing script {}", path.display()))?;
    Ok(script)
}

fn renderer(cfg: &ReelConfig) -> Result<HttpRenderer> {
    HttpRenderer::new(&cfg.renderer_url)
        .with_context(|| format!("invalid renderer_url {:?}", cfg.renderer_url))
}

fn coordinator(cfg: &ReelConfig, renderer: &HttpRenderer) -> DownloadCoordinator<LocalArtifactHost> {
    let host = LocalArtifactHost::new(renderer.base_url().clone(), cfg.download_dir())
        .with_retry(cfg.retry.policy());
    DownloadCoordinator::new(host)
}

/// One status call, run off the async runtime.
async fn fetch_status(renderer: Arc<HttpRenderer>, job_id: &JobId) -> Result<StatusReport> {
    let id = job_id.clone();
    let report = tokio::task::spawn_blocking(move || renderer.job_status(&id))
        .await?
        .with_context(|| format!("status of job {job_id}"))?;
    Ok(report)
}
