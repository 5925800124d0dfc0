//! Delivery Pool (§4.6 "Delivery Pool" properties, §5 Concurrency &
//! Resource Model): concurrent, rate-limited, retrying HTTP POST fan-out
//! to remote inboxes. Grounded on the teacher's `federation/delivery.rs`
//! (`deliver_to_inbox`, `deliver_to_followers`) generalized from a
//! concrete SQLite-bound service into a queue-backed worker pool that
//! owns its own token buckets and error channel, per §5's "no internal
//! singletons other than the delivery pool associated with one federator
//! instance."

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::federation::token_bucket::{TokenBucket, TokenBucketConfig};
use crate::metrics::{DELIVERY_ATTEMPTS_TOTAL, DELIVERY_IN_FLIGHT, DELIVERY_QUEUE_DEPTH};
use crate::model::Iri;

/// Signs an outbound HTTP POST before delivery. Injected rather than
/// built in, so the engine never depends on a concrete crypto stack (§1
/// non-goal: no HTTP signing). `support::signature` ships a reference
/// RSA-SHA256 implementation for the demo binary and tests.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(
        &self,
        method: &str,
        target: &Iri,
        body: &[u8],
    ) -> Result<Vec<(String, String)>, anyhow::Error>;
}

/// Adds no headers. For tests and integrators who sign some other way
/// (mTLS, a trusted private network).
pub struct NoopSigner;

#[async_trait]
impl Signer for NoopSigner {
    async fn sign(
        &self,
        _method: &str,
        _target: &Iri,
        _body: &[u8],
    ) -> Result<Vec<(String, String)>, anyhow::Error> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub worker_count: usize,
    pub agent: String,
    pub http_timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub token_bucket: TokenBucketConfig,
    pub queue_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            worker_count: 4,
            agent: "apub-federator".to_string(),
            http_timeout: Duration::from_secs(10),
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            token_bucket: TokenBucketConfig::default(),
            queue_capacity: 1024,
        }
    }
}

pub struct DeliveryTask {
    pub inbox: Iri,
    pub body: serde_json::Value,
}

/// Concurrent, rate-limited, retrying HTTP POST fan-out to remote
/// inboxes. One pool belongs to exactly one `Federator`.
pub struct DeliveryPool {
    sender: mpsc::Sender<DeliveryTask>,
    errors: Mutex<mpsc::UnboundedReceiver<EngineError>>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DeliveryPool {
    pub fn new(config: DeliveryConfig, signer: Arc<dyn Signer>) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| EngineError::Internal(anyhow::Error::new(e)))?;

        let (task_tx, task_rx) = mpsc::channel::<DeliveryTask>(config.queue_capacity);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task_rx = Arc::new(Mutex::new(task_rx));
        let token_bucket = Arc::new(TokenBucket::new(config.token_bucket));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let task_rx = task_rx.clone();
            let error_tx = error_tx.clone();
            let cancel = cancel.clone();
            let http_client = http_client.clone();
            let signer = signer.clone();
            let token_bucket = token_bucket.clone();
            let config = config.clone();
            workers.push(tokio::spawn(async move {
                worker_loop(
                    worker_id,
                    task_rx,
                    error_tx,
                    cancel,
                    http_client,
                    signer,
                    token_bucket,
                    config,
                )
                .await;
            }));
        }

        Ok(DeliveryPool {
            sender: task_tx,
            errors: Mutex::new(error_rx),
            cancel,
            workers: Mutex::new(workers),
        })
    }

    /// Enqueues a task for delivery. Never awaits the network round trip
    /// itself — the originating outbox/inbox handler returns as soon as
    /// the task is queued (§4.2, §4.5).
    pub async fn enqueue(&self, task: DeliveryTask) -> Result<(), EngineError> {
        self.sender
            .send(task)
            .await
            .map_err(|_| EngineError::Internal(anyhow::anyhow!("delivery pool is stopped")))?;
        DELIVERY_QUEUE_DEPTH.inc();
        Ok(())
    }

    /// Drains terminal delivery failures pushed by workers (§4.6, §7:
    /// "asynchronous, delivered on the Errors() channel; never fail the
    /// originating POST"). Resolves to `None` once the pool has stopped
    /// and drained.
    pub async fn next_error(&self) -> Option<EngineError> {
        self.errors.lock().await.recv().await
    }

    /// Quiesces workers and cancels in-flight requests (§4.6, §5).
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            let _ = worker.await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    task_rx: Arc<Mutex<mpsc::Receiver<DeliveryTask>>>,
    error_tx: mpsc::UnboundedSender<EngineError>,
    cancel: CancellationToken,
    http_client: reqwest::Client,
    signer: Arc<dyn Signer>,
    token_bucket: Arc<TokenBucket>,
    config: DeliveryConfig,
) {
    loop {
        let task = {
            let mut rx = task_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => return,
                task = rx.recv() => task,
            }
        };
        let Some(task) = task else {
            return;
        };
        DELIVERY_QUEUE_DEPTH.dec();
        DELIVERY_IN_FLIGHT.inc();

        let host = task.inbox.domain().unwrap_or_default().to_string();
        token_bucket.acquire(&host).await;

        debug!(worker_id, inbox = %task.inbox, "delivering activity");
        match deliver_with_retry(&task, &http_client, signer.as_ref(), &config, &cancel).await {
            Ok(()) => {
                DELIVERY_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
                info!(worker_id, inbox = %task.inbox, "delivery succeeded");
            }
            Err(err) => {
                DELIVERY_ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
                warn!(worker_id, inbox = %task.inbox, error = %err, "delivery failed permanently");
                let _ = error_tx.send(err);
            }
        }
        DELIVERY_IN_FLIGHT.dec();
    }
}

enum Outcome {
    Retryable(EngineError),
    Terminal(EngineError),
}

async fn deliver_with_retry(
    task: &DeliveryTask,
    http_client: &reqwest::Client,
    signer: &dyn Signer,
    config: &DeliveryConfig,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let body =
        serde_json::to_vec(&task.body).map_err(|e| EngineError::Internal(anyhow::Error::new(e)))?;

    let mut attempt = 0u32;
    let mut delay = config.base_delay;
    loop {
        attempt += 1;
        match attempt_delivery(task, &body, http_client, signer, config).await {
            Ok(()) => return Ok(()),
            Err(Outcome::Terminal(err)) => return Err(err),
            Err(Outcome::Retryable(err)) => {
                if attempt >= config.max_attempts {
                    return Err(err);
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Err(err),
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = (delay * 2).min(config.max_delay);
            }
        }
    }
}

async fn attempt_delivery(
    task: &DeliveryTask,
    body: &[u8],
    http_client: &reqwest::Client,
    signer: &dyn Signer,
    config: &DeliveryConfig,
) -> Result<(), Outcome> {
    let headers = signer.sign("POST", &task.inbox, body).await.map_err(|e| {
        Outcome::Terminal(EngineError::Delivery {
            inbox: task.inbox.to_string(),
            source: e,
        })
    })?;

    let user_agent = format!("{} (apub-federator)", config.agent);
    let mut request = http_client
        .post(task.inbox.as_str())
        .header("Content-Type", "application/activity+json")
        .header("User-Agent", user_agent)
        .body(body.to_vec());
    for (key, value) in headers {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| {
        Outcome::Retryable(EngineError::Delivery {
            inbox: task.inbox.to_string(),
            source: anyhow::Error::new(e),
        })
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let retryable = status.is_server_error() || status.as_u16() == 429 || status.as_u16() == 408;
    let err = EngineError::Delivery {
        inbox: task.inbox.to_string(),
        source: anyhow::anyhow!("inbox rejected activity: HTTP {}", status),
    };
    if retryable {
        Err(Outcome::Retryable(err))
    } else {
        Err(Outcome::Terminal(err))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            worker_count: 1,
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn delivers_successfully_and_reports_no_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inbox"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let pool = DeliveryPool::new(config(), Arc::new(NoopSigner)).unwrap();
        pool.enqueue(DeliveryTask {
            inbox: Iri::parse(&format!("{}/inbox", server.uri())).unwrap(),
            body: json!({"type": "Create"}),
        })
        .await
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), pool.next_error()).await;
        assert!(result.is_err(), "expected no terminal error to surface");
        pool.stop().await;
    }

    #[tokio::test]
    async fn terminal_4xx_is_not_retried_and_surfaces_on_errors_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/inbox"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let pool = DeliveryPool::new(config(), Arc::new(NoopSigner)).unwrap();
        pool.enqueue(DeliveryTask {
            inbox: Iri::parse(&format!("{}/inbox", server.uri())).unwrap(),
            body: json!({"type": "Create"}),
        })
        .await
        .unwrap();

        let err = tokio::time::timeout(Duration::from_secs(2), pool.next_error())
            .await
            .expect("an error should surface")
            .expect("channel should not be closed yet");
        assert!(matches!(err, EngineError::Delivery { .. }));
        pool.stop().await;
    }
}
