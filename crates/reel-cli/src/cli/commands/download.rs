//! `reel download` – save (and optionally open) a completed job's video.

use std::sync::Arc;

use anyhow::Result;
use reel_core::config::ReelConfig;
use reel_core::job::{JobId, ProductionJob};

use super::{coordinator, fetch_status, renderer};

pub async fn run_download(cfg: &ReelConfig, job_id: &str, open: bool) -> Result<()> {
    let renderer = Arc::new(renderer(cfg)?);
    let coordinator = coordinator(cfg, &renderer);
    let job_id = JobId::new(job_id);
    let report = fetch_status(Arc::clone(&renderer), &job_id).await?;
    let job = ProductionJob::from_report(job_id, &report);

    let path = tokio::task::block_in_place(|| coordinator.save_job(&job))?;
    println!("saved: {}", path.display());
    println!("link:  {}", coordinator.copy_share_link(&job)?);
    if open {
        let url = coordinator.open_external(&job)?;
        tracing::info!(%url, "opened artifact");
    }
    Ok(())
}
