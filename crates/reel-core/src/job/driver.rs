//! Async driver: runs a [`JobController`] against a [`Renderer`] on tokio.
//!
//! Renderer calls block (curl), so each one runs on the blocking pool. The
//! driver never holds more than one call in flight and checks its
//! [`CancelToken`] between steps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::control::CancelToken;
use crate::download::{ArtifactHost, DownloadCoordinator};
use crate::renderer::Renderer;
use crate::retry::TransportError;
use crate::scheduler::PollSettings;
use crate::script::ProductionRequest;

use super::{JobController, JobError, JobEvent, JobId, JobStatus, ProductionJob, Submission};

/// Upper bound on one sleep so cancellation is noticed promptly.
const MAX_SLEEP: Duration = Duration::from_millis(250);

pub struct JobDriver {
    renderer: Arc<dyn Renderer>,
    controller: JobController,
    cancel: CancelToken,
}

impl JobDriver {
    pub fn new(renderer: Arc<dyn Renderer>, settings: PollSettings) -> Self {
        Self {
            renderer,
            controller: JobController::new(settings),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn controller(&self) -> &JobController {
        &self.controller
    }

    /// Create a job on the renderer. Polling is armed but not performed;
    /// call [`JobDriver::track`] next.
    pub async fn submit<F>(&mut self, request: ProductionRequest, observe: F) -> Result<JobId, JobError>
    where
        F: FnMut(&JobEvent),
    {
        let submission = self.controller.submit(request)?;
        self.create(submission, observe).await
    }

    /// Submit, then track to a terminal state.
    pub async fn run<H, F>(
        &mut self,
        request: ProductionRequest,
        coordinator: &mut DownloadCoordinator<H>,
        mut observe: F,
    ) -> Result<ProductionJob, JobError>
    where
        H: ArtifactHost,
        F: FnMut(&JobEvent),
    {
        self.submit(request, &mut observe).await?;
        self.track(coordinator, observe).await
    }

    /// Discard a failed or stalled job, resubmit its request and track the new one.
    pub async fn retry<H, F>(
        &mut self,
        coordinator: &mut DownloadCoordinator<H>,
        mut observe: F,
    ) -> Result<ProductionJob, JobError>
    where
        H: ArtifactHost,
        F: FnMut(&JobEvent),
    {
        let submission = self.controller.retry()?;
        self.create(submission, &mut observe).await?;
        self.track(coordinator, observe).await
    }

    /// Start polling a stalled job again, keeping its id.
    pub async fn resume<H, F>(
        &mut self,
        coordinator: &mut DownloadCoordinator<H>,
        observe: F,
    ) -> Result<ProductionJob, JobError>
    where
        H: ArtifactHost,
        F: FnMut(&JobEvent),
    {
        self.controller.resume_tracking(Instant::now())?;
        self.track(coordinator, observe).await
    }

    /// Poll the current job until it completes, fails, stalls or is cancelled.
    /// A completed job is handed to `coordinator` before it is returned.
    pub async fn track<H, F>(
        &mut self,
        coordinator: &mut DownloadCoordinator<H>,
        mut observe: F,
    ) -> Result<ProductionJob, JobError>
    where
        H: ArtifactHost,
        F: FnMut(&JobEvent),
    {
        loop {
            if self.cancel.is_cancelled() {
                return Err(self.abandon());
            }
            let now = Instant::now();
            if let Some(request) = self.controller.poll_due(now)? {
                let renderer = Arc::clone(&self.renderer);
                let job_id = request.job_id().clone();
                tracing::debug!(job = %job_id, epoch = %request.epoch(), "checking status");
                let result = tokio::task::spawn_blocking(move || renderer.job_status(&job_id))
                    .await
                    .unwrap_or_else(|e| Err(TransportError::Task(e.to_string())));
                if self.cancel.is_cancelled() {
                    return Err(self.abandon());
                }
                match self.controller.apply_status(request, result, Instant::now())? {
                    Some(JobEvent::Completed(job)) => {
                        observe(&JobEvent::Completed(job.clone()));
                        coordinator.artifact_ready(&job);
                        return Ok(job);
                    }
                    Some(JobEvent::Failed { job_id, error }) => {
                        observe(&JobEvent::Failed {
                            job_id,
                            error: error.clone(),
                        });
                        return Err(JobError::JobFailed(error));
                    }
                    Some(event) => observe(&event),
                    None => {}
                }
                continue;
            }

            if let Some(done) = self.settled(coordinator) {
                return done;
            }
            let wait = self
                .controller
                .next_wakeup(now)
                .map_or(MAX_SLEEP, |d| d.min(MAX_SLEEP));
            tokio::time::sleep(wait).await;
        }
    }

    async fn create<F>(&mut self, submission: Submission, mut observe: F) -> Result<JobId, JobError>
    where
        F: FnMut(&JobEvent),
    {
        let renderer = Arc::clone(&self.renderer);
        let request = submission.request().clone();
        let result = tokio::task::spawn_blocking(move || renderer.create_job(&request))
            .await
            .unwrap_or_else(|e| Err(TransportError::Task(e.to_string())));
        if self.cancel.is_cancelled() {
            // Drop the outstanding submission first so the created job is discarded.
            let err = self.abandon();
            self.controller
                .on_created(submission, result, Instant::now())?;
            return Err(err);
        }
        match self
            .controller
            .on_created(submission, result, Instant::now())?
        {
            Some(event) => {
                observe(&event);
                match event {
                    JobEvent::Submitted { job_id } => Ok(job_id),
                    _ => Err(JobError::InvalidState {
                        action: "submit",
                        state: "tracking",
                    }),
                }
            }
            None => Err(JobError::Cancelled),
        }
    }

    /// Outcome when there is nothing left to poll.
    fn settled<H: ArtifactHost>(
        &self,
        coordinator: &mut DownloadCoordinator<H>,
    ) -> Option<Result<ProductionJob, JobError>> {
        let Some(job) = self.controller.job() else {
            return Some(Err(JobError::InvalidState {
                action: "track",
                state: "idle",
            }));
        };
        match job.status {
            JobStatus::Completed => {
                coordinator.artifact_ready(job);
                Some(Ok(job.clone()))
            }
            JobStatus::Failed => Some(Err(JobError::JobFailed(
                job.error.clone().unwrap_or_default(),
            ))),
            _ if self.controller.is_stalled() => Some(Err(JobError::InvalidState {
                action: "track",
                state: "stalled",
            })),
            _ => None,
        }
    }

    fn abandon(&mut self) -> JobError {
        if let Ok(job_id) = self.controller.cancel() {
            tracing::info!(?job_id, "driver cancelled");
        }
        JobError::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::download::HostError;
    use crate::renderer::{CreatedJob, StatusReport};
    use crate::retry::RetryPolicy;
    use crate::script::{SceneData, Script, VideoStyle};

    #[derive(Default)]
    struct ScriptedRenderer {
        created: Mutex<VecDeque<Result<CreatedJob, TransportError>>>,
        statuses: Mutex<VecDeque<Result<StatusReport, TransportError>>>,
        status_calls: Mutex<Vec<JobId>>,
    }

    impl ScriptedRenderer {
        fn create_ok(self, id: &str) -> Self {
            self.created.lock().unwrap().push_back(Ok(CreatedJob {
                job_id: JobId::new(id),
                status: Some(JobStatus::Queued),
            }));
            self
        }

        fn status(self, r: Result<StatusReport, TransportError>) -> Self {
            self.statuses.lock().unwrap().push_back(r);
            self
        }
    }

    impl Renderer for ScriptedRenderer {
        fn create_job(&self, _request: &ProductionRequest) -> Result<CreatedJob, TransportError> {
            self.created
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::http(500)))
        }

        fn job_status(&self, job_id: &JobId) -> Result<StatusReport, TransportError> {
            self.status_calls.lock().unwrap().push(job_id.clone());
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(StatusReport::processing(50.0)))
        }
    }

    struct NoopHost;

    impl ArtifactHost for NoopHost {
        fn resolve_url(&self, reference: &str) -> Result<String, HostError> {
            Ok(reference.to_string())
        }
        fn save(&self, _url: &str, file_name: &str) -> Result<PathBuf, HostError> {
            Ok(PathBuf::from(file_name))
        }
        fn open(&self, _url: &str) -> Result<(), HostError> {
            Ok(())
        }
    }

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(5),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            max_duration: Some(Duration::from_secs(10)),
        }
    }

    fn request() -> ProductionRequest {
        ProductionRequest::new(Script {
            title: "demo".into(),
            scenes: vec![SceneData {
                text: "hello".into(),
                duration: 3.0,
                image_keywords: vec!["sea".into()],
                transition: "fade".into(),
            }],
            total_duration: 3.0,
            style: VideoStyle::Modern,
        })
    }

    #[tokio::test]
    async fn run_to_completion_hands_artifact_to_coordinator() {
        let renderer = ScriptedRenderer::default()
            .create_ok("v1")
            .status(Ok(StatusReport::processing(20.0)))
            .status(Err(TransportError::http(503)))
            .status(Ok(StatusReport::processing(90.0)))
            .status(Ok(StatusReport::completed().with_artifact("/api/video/download/v1")));
        let renderer = Arc::new(renderer);
        let mut driver = JobDriver::new(renderer.clone(), fast());
        let mut coordinator = DownloadCoordinator::new(NoopHost);
        let mut events = Vec::new();

        let job = driver
            .run(request(), &mut coordinator, |e| events.push(e.clone()))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.artifact_ref.as_deref(), Some("/api/video/download/v1"));
        assert_eq!(coordinator.ready(), Some(&job));
        assert!(matches!(events.first(), Some(JobEvent::Submitted { .. })));
        assert!(events.iter().any(|e| matches!(e, JobEvent::Retrying { attempt: 1, .. })));
        assert!(matches!(events.last(), Some(JobEvent::Completed(_))));
        assert_eq!(renderer.status_calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn renderer_failure_surfaces_as_job_failed() {
        let renderer = ScriptedRenderer::default()
            .create_ok("v1")
            .status(Ok(StatusReport::failed("tts unavailable")));
        let mut driver = JobDriver::new(Arc::new(renderer), fast());
        let mut coordinator = DownloadCoordinator::new(NoopHost);
        let err = driver
            .run(request(), &mut coordinator, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::JobFailed(ref m) if m == "tts unavailable"));
        assert!(coordinator.ready().is_none());
        assert_eq!(driver.controller().job().unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn retry_after_failure_tracks_a_new_job() {
        let renderer = ScriptedRenderer::default()
            .create_ok("v1")
            .status(Ok(StatusReport::failed("boom")))
            .create_ok("v2")
            .status(Ok(StatusReport::completed().with_artifact("x")));
        let renderer = Arc::new(renderer);
        let mut driver = JobDriver::new(renderer.clone(), fast());
        let mut coordinator = DownloadCoordinator::new(NoopHost);
        assert!(driver.run(request(), &mut coordinator, |_| {}).await.is_err());
        let job = driver.retry(&mut coordinator, |_| {}).await.unwrap();
        assert_eq!(job.id, JobId::new("v2"));
        assert_eq!(
            renderer.status_calls.lock().unwrap().as_slice(),
            [JobId::new("v1"), JobId::new("v2")]
        );
    }

    #[tokio::test]
    async fn stalled_job_can_be_resumed() {
        let renderer = ScriptedRenderer::default()
            .create_ok("v1")
            .status(Err(TransportError::http(502)))
            .status(Err(TransportError::http(502)))
            .status(Err(TransportError::http(502)))
            .status(Ok(StatusReport::completed().with_artifact("x")));
        let mut driver = JobDriver::new(Arc::new(renderer), fast());
        let mut coordinator = DownloadCoordinator::new(NoopHost);
        let err = driver
            .run(request(), &mut coordinator, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::PollExhausted { attempts: 3, .. }));
        assert!(driver.controller().is_stalled());

        let job = driver.resume(&mut coordinator, |_| {}).await.unwrap();
        assert_eq!(job.id, JobId::new("v1"));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_token_stops_tracking() {
        let renderer = ScriptedRenderer::default().create_ok("v1");
        let mut driver = JobDriver::new(Arc::new(renderer), fast());
        let token = driver.cancel_token();
        let mut coordinator = DownloadCoordinator::new(NoopHost);
        let mut polls = 0;
        let err = driver
            .run(request(), &mut coordinator, |e| {
                if matches!(e, JobEvent::Progress { .. }) {
                    polls += 1;
                    token.cancel();
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        assert_eq!(polls, 1);
        assert!(driver.controller().job().is_none());
        assert!(!driver.controller().is_busy());
    }

    #[tokio::test]
    async fn creation_error_is_reported() {
        let renderer = ScriptedRenderer::default();
        let mut driver = JobDriver::new(Arc::new(renderer), fast());
        let err = driver.submit(request(), |_| {}).await.unwrap_err();
        assert!(matches!(err, JobError::CreateFailed(_)));
        assert!(err.is_recoverable());
    }
}
