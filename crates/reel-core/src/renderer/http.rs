//! Renderer client over HTTP.
//!
//! Uses the curl crate (libcurl) for requests and serde_json for bodies.
//! Calls block the current thread; use `spawn_blocking` from async code.

use std::time::Duration;

use curl::easy::{Easy, List};
use url::Url;

use super::{CreatedJob, Renderer, StatusReport};
use crate::job::JobId;
use crate::retry::TransportError;
use crate::script::ProductionRequest;

#[derive(Debug, Clone)]
pub struct HttpRenderer {
    base: Url,
    connect_timeout: Duration,
    timeout: Duration,
}

impl HttpRenderer {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeouts(mut self, connect: Duration, total: Duration) -> Self {
        self.connect_timeout = connect;
        self.timeout = total;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Decode(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn easy(&self, url: &Url) -> Result<Easy, TransportError> {
        let mut easy = Easy::new();
        easy.url(url.as_str())?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        Ok(easy)
    }

    fn get_json(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let mut easy = self.easy(url)?;
        easy.get(true)?;
        let mut list = List::new();
        list.append("Accept: application/json")?;
        easy.http_headers(list)?;
        perform(&mut easy)
    }

    fn post_json(&self, url: &Url, body: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut easy = self.easy(url)?;
        easy.post(true)?;
        easy.post_fields_copy(body)?;
        let mut list = List::new();
        list.append("Content-Type: application/json")?;
        list.append("Accept: application/json")?;
        // no 100-continue round trip for larger scripts
        list.append("Expect:")?;
        easy.http_headers(list)?;
        perform(&mut easy)
    }
}

/// Run the transfer, collect the body, and map non-2xx to `TransportError::Http`.
fn perform(easy: &mut Easy) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(TransportError::Http {
            status: code,
            detail: error_detail(&body),
        });
    }
    Ok(body)
}

/// Pull a human-readable message out of an error body (`{"detail": "..."}`).
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl Renderer for HttpRenderer {
    fn create_job(&self, request: &ProductionRequest) -> Result<CreatedJob, TransportError> {
        let url = self.endpoint(&["api", "video", "create"])?;
        let body = serde_json::to_vec(request)?;
        tracing::debug!(%url, scenes = request.script.scenes.len(), "creating render job");
        let raw = self.post_json(&url, &body)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn job_status(&self, job_id: &JobId) -> Result<StatusReport, TransportError> {
        let url = self.endpoint(&["api", "video", "status", job_id.as_str()])?;
        let raw = self.get_json(&url)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
