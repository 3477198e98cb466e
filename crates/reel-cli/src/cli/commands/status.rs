//! `reel status` – one-shot job status.

use std::sync::Arc;

use anyhow::Result;
use reel_core::config::ReelConfig;
use reel_core::job::{JobId, ProductionJob};

use super::{fetch_status, renderer};

pub async fn run_status(cfg: &ReelConfig, job_id: &str) -> Result<()> {
    let job_id = JobId::new(job_id);
    let report = fetch_status(Arc::new(renderer(cfg)?), &job_id).await?;
    let job = ProductionJob::from_report(job_id, &report);

    println!("{:<10} {:<10} {:>4}", "JOB", "STATUS", "PCT");
    println!("{:<10} {:<10} {:>3}%", job.id, job.status, job.progress);
    if let Some(url) = &job.artifact_ref {
        println!("download: {url}");
    }
    if let Some(url) = &job.cloud_artifact_ref {
        println!("cloud:    {url}");
    }
    if let Some(url) = &report.preview_url {
        println!("preview:  {url}");
    }
    if let Some(err) = &job.error {
        println!("error:    {err}");
    }
    Ok(())
}
