//! `reel render` – submit a script and follow the job to the end.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reel_core::config::ReelConfig;
use reel_core::job::{JobDriver, JobError, JobEvent};
use reel_core::script::ProductionRequest;
use reel_core::store::{Action, Store};
use reel_core::timeline::Timeline;

use super::{coordinator, load_script, renderer};

pub async fn run_render(
    cfg: &ReelConfig,
    script_path: &Path,
    template: Option<String>,
    no_save: bool,
    retries: u32,
) -> Result<()> {
    let script = load_script(script_path)?;
    Timeline::from_script(&script).context("script has an unplayable scene")?;
    let mut store = Store::new();
    store.dispatch(Action::ScriptLoaded(script.clone()));

    let mut request = ProductionRequest::new(script);
    if let Some(template) = template {
        request = request.with_template(template);
    }

    let renderer = renderer(cfg)?;
    let mut coordinator = coordinator(cfg, &renderer);
    let mut driver = JobDriver::new(Arc::new(renderer), cfg.poll_settings());

    let token = driver.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling...");
            token.cancel();
        }
    });

    let mut report = |event: &JobEvent| match event {
        JobEvent::Submitted { job_id } => println!("submitted job {job_id}"),
        JobEvent::Progress {
            status, progress, ..
        } => println!("  {status:<10} {progress:>3}%"),
        JobEvent::Retrying { attempt, delay } => println!(
            "  status check failed (attempt {attempt}), retrying in {:.1}s",
            delay.as_secs_f64()
        ),
        JobEvent::Completed(job) => println!("job {} completed", job.id),
        JobEvent::Failed { job_id, error } => println!("job {job_id} failed: {error}"),
    };

    let mut outcome = driver.run(request, &mut coordinator, &mut report).await;
    let mut retries_left = retries;
    while let Err(err) = &outcome {
        if retries_left == 0 {
            break;
        }
        let Some(next) = recovery(err, driver.controller().is_stalled()) else {
            break;
        };
        retries_left -= 1;
        outcome = match next {
            Recovery::Resume => {
                eprintln!("{err}; resuming status checks ({retries_left} retries left)");
                driver.resume(&mut coordinator, &mut report).await
            }
            Recovery::Retry => {
                eprintln!("{err}; retrying with a new job ({retries_left} retries left)");
                driver.retry(&mut coordinator, &mut report).await
            }
        };
    }

    if let Some(job) = driver.controller().job() {
        store.dispatch(Action::JobChanged(job.clone()));
    }

    let job = match outcome {
        Ok(job) => job,
        Err(err) => {
            store.dispatch(Action::ErrorRaised(err.to_string()));
            if let Some(job) = driver.controller().job().filter(|_| driver.controller().is_stalled()) {
                eprintln!(
                    "job {} is still running remotely; check it later with `reel status {}`",
                    job.id, job.id
                );
            } else if err.is_recoverable() {
                eprintln!("this may be temporary; pass --retries N to retry automatically");
            }
            return Err(err.into());
        }
    };

    let link = coordinator.copy_share_link(&job)?;
    println!("link: {link}");
    if !no_save {
        let path = tokio::task::block_in_place(|| coordinator.save_job(&job))?;
        println!("saved: {}", path.display());
    }
    tracing::debug!(state = ?store.state().job, "render finished");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Poll the same job again.
    Resume,
    /// Resubmit the request as a new job.
    Retry,
}

/// How to continue after `err`, if at all. A stalled job is still alive
/// remotely, so it is resumed rather than replaced.
fn recovery(err: &JobError, stalled: bool) -> Option<Recovery> {
    if !err.is_recoverable() {
        return None;
    }
    Some(if stalled {
        Recovery::Resume
    } else {
        Recovery::Retry
    })
}
