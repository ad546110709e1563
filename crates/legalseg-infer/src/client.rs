//! Client for the remote Gradio-hosted segmentation model.
//!
//! Submission yields an `event_id`; the result is then collected by polling
//! a per-job status endpoint whose body is `event:`/`data:` line text. The
//! body is read whole and pattern-matched — no streaming parser.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::stream::{contains_error_event, recover_payload};
use legalseg_core::{Error, Result};

/// Transport seam for the submission and status endpoints.
///
/// Production uses [`HttpTransport`]; tests script the responses.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// POST the prediction request, returning the raw response body.
    async fn submit(&self, text: &str) -> Result<String>;

    /// GET the status body for a job.
    async fn poll(&self, event_id: &str) -> Result<String>;
}

/// Transport over HTTP to the hosted model.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl InferenceTransport for HttpTransport {
    async fn submit(&self, text: &str) -> Result<String> {
        let url = format!("{}/gradio_api/call/predict", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "data": [text, Value::Null] }))
            .send()
            .await
            .map_err(|e| Error::RemoteService(format!("submit request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteService(format!(
                "submit returned {}: {}",
                status, body
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::RemoteService(format!("submit body read failed: {}", e)))
    }

    async fn poll(&self, event_id: &str) -> Result<String> {
        let url = format!("{}/gradio_api/call/predict/{}", self.base_url, event_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::RemoteService(format!("status request failed: {}", e)))?;

        response
            .text()
            .await
            .map_err(|e| Error::RemoteService(format!("status body read failed: {}", e)))
    }
}

/// Bounds for the polling loop.
///
/// The defaults are the production timing contract — 60 attempts, a 2 s wait
/// before every attempt, and a single 3 s-backoff retry inside an attempt
/// that hit a transport error. A retried attempt still counts toward the
/// cap, so worst-case wall clock stays bounded. Tests shrink the durations,
/// never the semantics.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub attempts: u32,
    pub poll_interval: Duration,
    pub retry_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 60,
            poll_interval: Duration::from_millis(2000),
            retry_backoff: Duration::from_millis(3000),
        }
    }
}

/// Submits text for classification and collects the raw result payload.
pub struct InferenceClient {
    transport: Arc<dyn InferenceTransport>,
    policy: PollPolicy,
}

impl InferenceClient {
    pub fn new(transport: Arc<dyn InferenceTransport>) -> Self {
        Self::with_policy(transport, PollPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn InferenceTransport>, policy: PollPolicy) -> Self {
        Self { transport, policy }
    }

    /// Submit text for classification, returning the job's `event_id`.
    ///
    /// A response without an `event_id` is a hard failure: there is nothing
    /// to poll.
    pub async fn submit(&self, text: &str) -> Result<String> {
        let body = self.transport.submit(text).await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| Error::RemoteService(format!("submit response was not JSON: {}", e)))?;
        match value.get("event_id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(Error::RemoteService(
                "submission response carried no event_id".to_string(),
            )),
        }
    }

    /// Poll the status endpoint until the result arrives, the service
    /// reports an error, or the attempt budget is exhausted.
    pub async fn await_result(&self, event_id: &str) -> Result<Vec<Value>> {
        for attempt in 1..=self.policy.attempts {
            tokio::time::sleep(self.policy.poll_interval).await;

            let body = match self.transport.poll(event_id).await {
                Ok(body) => body,
                Err(first) => {
                    // One retry after a fixed backoff; a second failure
                    // spends the attempt without aborting the job.
                    tokio::time::sleep(self.policy.retry_backoff).await;
                    match self.transport.poll(event_id).await {
                        Ok(body) => body,
                        Err(second) => {
                            warn!(
                                attempt,
                                "status poll failed twice: {}; retry: {}", first, second
                            );
                            continue;
                        }
                    }
                }
            };

            if contains_error_event(&body) {
                return Err(Error::RemoteService(body));
            }

            match recover_payload(&body) {
                Some(payload) => {
                    debug!(attempt, "inference payload recovered");
                    return Ok(payload);
                }
                None => continue,
            }
        }
        Err(Error::Timeout(self.policy.attempts))
    }

    /// Submit and wait: the full acquisition pipeline for one document.
    pub async fn classify(&self, text: &str) -> Result<Vec<Value>> {
        let event_id = self.submit(text).await?;
        self.await_result(&event_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that replays a scripted sequence of poll responses.
    struct ScriptedTransport {
        submit_body: String,
        responses: Mutex<VecDeque<Result<String>>>,
        polls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                submit_body: r#"{"event_id": "ev-42"}"#.to_string(),
                responses: Mutex::new(responses.into_iter().collect()),
                polls: AtomicU32::new(0),
            }
        }

        fn poll_count(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceTransport for ScriptedTransport {
        async fn submit(&self, _text: &str) -> Result<String> {
            Ok(self.submit_body.clone())
        }

        async fn poll(&self, _event_id: &str) -> Result<String> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("event: heartbeat\n".to_string()))
        }
    }

    fn fast_policy(attempts: u32) -> PollPolicy {
        PollPolicy {
            attempts,
            poll_interval: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        }
    }

    fn client_with(
        transport: Arc<ScriptedTransport>,
        attempts: u32,
    ) -> InferenceClient {
        InferenceClient::with_policy(transport, fast_policy(attempts))
    }

    #[tokio::test]
    async fn submit_extracts_event_id() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let client = client_with(transport, 1);
        assert_eq!(client.submit("some text").await.unwrap(), "ev-42");
    }

    #[tokio::test]
    async fn submit_without_event_id_fails() {
        let mut transport = ScriptedTransport::new(vec![]);
        transport.submit_body = r#"{"detail": "queue full"}"#.to_string();
        let client = client_with(Arc::new(transport), 1);
        assert!(matches!(
            client.submit("some text").await,
            Err(Error::RemoteService(_))
        ));
    }

    #[tokio::test]
    async fn error_event_terminates_polling() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok("event: heartbeat\n".to_string()),
            Ok("event: heartbeat\n".to_string()),
            Ok("event: error\ndata: null\n".to_string()),
            Ok("data: [\"never reached\"]".to_string()),
        ]));
        let client = client_with(transport.clone(), 60);

        let err = client.await_result("ev-42").await.unwrap_err();
        assert!(matches!(err, Error::RemoteService(_)));
        // Attempt 3 saw the error marker; attempt 4 never ran.
        assert_eq!(transport.poll_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_time_out() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let client = client_with(transport.clone(), 60);

        let err = client.await_result("ev-42").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(60)));
        assert_eq!(transport.poll_count(), 60);
    }

    #[tokio::test]
    async fn transport_failure_retries_once_then_continues() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(Error::RemoteService("connection reset".to_string())),
            Err(Error::RemoteService("connection reset".to_string())),
            Ok("data: [{\"label\": \"Decision\", \"sentence\": \"Appeal dismissed.\"}]".to_string()),
        ]));
        let client = client_with(transport.clone(), 60);

        // Attempt 1 fails twice (primary + retry) and is spent; attempt 2
        // recovers the payload.
        let payload = client.await_result("ev-42").await.unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(transport.poll_count(), 3);
    }

    #[tokio::test]
    async fn retry_success_recovers_within_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(Error::RemoteService("connection reset".to_string())),
            Ok("data: [\"**Facts** | The petition was filed.\"]".to_string()),
        ]));
        let client = client_with(transport.clone(), 60);

        let payload = client.await_result("ev-42").await.unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(transport.poll_count(), 2);
    }

    #[tokio::test]
    async fn not_ready_bodies_keep_polling() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok("event: generating\n".to_string()),
            Ok("event: generating\n".to_string()),
            Ok("event: complete\ndata: [\"**Decision** | Appeal dismissed.\"]".to_string()),
        ]));
        let client = client_with(transport.clone(), 60);

        let payload = client.await_result("ev-42").await.unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(transport.poll_count(), 3);
    }
}
