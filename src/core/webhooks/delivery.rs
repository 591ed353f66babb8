//! Webhook delivery processing
//!
//! A bounded queue feeds a fixed pool of workers. Each worker signs and POSTs
//! one job at a time, classifies the response and hands retryable failures to
//! a timer task that re-submits the job after the backoff delay, so no worker
//! ever sleeps on a retry.
//!
//! Shutdown cancels a token shared by workers and retry timers. Workers check
//! it between jobs only and are never aborted, so a job that has been dequeued
//! is always classified.

use super::types::{DeliveryJob, DeliveryOutcome, WebhookConfig, WebhookEvent, WebhookStats};
use crate::config::{DeliveryConfig, Validate};
use crate::utils::crypto::sign_payload;
use crate::utils::error::{Result, WebhookError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{Mutex as TokioMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Header carrying the HMAC signature of the body
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Header carrying the event type
pub const EVENT_HEADER: &str = "X-Webhook-Event";
/// Header carrying the event id, stable across retries
pub const EVENT_ID_HEADER: &str = "X-Webhook-Id";

/// Longest slice of a response body kept in a failure reason
const MAX_REASON_BODY: usize = 256;

/// Destination for delivery jobs produced by the dispatcher
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job without blocking indefinitely; `false` means it was dropped
    async fn enqueue(&self, job: DeliveryJob) -> bool;
}

/// Cumulative delivery counters
#[derive(Debug, Default)]
struct DeliveryMetrics {
    delivered: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// State shared by the service, its workers and retry timers
#[derive(Debug)]
struct DeliveryShared {
    config: DeliveryConfig,
    client: Client,
    metrics: DeliveryMetrics,
}

/// Resources of one start/stop cycle
struct DeliveryRuntime {
    sender: mpsc::Sender<DeliveryJob>,
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

/// Queue-backed webhook delivery with a fixed worker pool
pub struct WebhookDeliveryService {
    shared: Arc<DeliveryShared>,
    runtime: Mutex<Option<DeliveryRuntime>>,
}

impl WebhookDeliveryService {
    /// Create a stopped delivery service
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| WebhookError::Config(format!("Delivery config error: {}", e)))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            shared: Arc::new(DeliveryShared {
                config,
                client,
                metrics: DeliveryMetrics::default(),
            }),
            runtime: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.shared.config
    }

    /// Spawn the worker pool; a no-op when already running
    pub async fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock();
        if runtime.as_ref().is_some_and(DeliveryRuntime::is_live) {
            warn!("Webhook delivery service already running");
            return Ok(());
        }

        let config = &self.shared.config;
        let (sender, receiver) = mpsc::channel(config.queue_size);
        let receiver = Arc::new(TokioMutex::new(receiver));
        let token = CancellationToken::new();

        let workers = (0..config.workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    self.shared.clone(),
                    receiver.clone(),
                    sender.clone(),
                    token.clone(),
                ))
            })
            .collect();

        *runtime = Some(DeliveryRuntime {
            sender,
            token,
            workers,
        });

        info!(
            workers = config.workers,
            queue_size = config.queue_size,
            max_retries = config.max_retries,
            "Started webhook delivery service"
        );
        Ok(())
    }

    /// Signal shutdown and wait for workers to finish their current job
    ///
    /// Jobs still waiting in the queue and pending retries are abandoned.
    /// Workers that outlive the shutdown timeout are left to finish their
    /// in-flight request in the background; it is never cut short.
    pub async fn stop(&self) -> Result<()> {
        let mut workers = {
            let mut runtime = self.runtime.lock();
            match runtime.as_mut() {
                Some(rt) if rt.is_live() => {
                    rt.token.cancel();
                    std::mem::take(&mut rt.workers)
                }
                _ => {
                    warn!("Webhook delivery service is not running");
                    return Ok(());
                }
            }
        };

        let abandoned = self.queue_size();
        info!(abandoned, "Stopping webhook delivery service");

        let drain = futures::future::join_all(workers.iter_mut());
        if tokio::time::timeout(self.shared.config.shutdown_timeout(), drain)
            .await
            .is_err()
        {
            // Dropping the handles detaches the workers; each still classifies
            // its current job and exits on the cancelled token.
            let busy = workers.iter().filter(|w| !w.is_finished()).count();
            warn!(
                busy,
                timeout_ms = self.shared.config.shutdown_timeout_ms,
                "Delivery workers still busy after shutdown timeout, detaching"
            );
        }

        info!("Stopped webhook delivery service");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.runtime
            .lock()
            .as_ref()
            .is_some_and(DeliveryRuntime::is_live)
    }

    /// Jobs currently waiting in the queue
    pub fn queue_size(&self) -> usize {
        self.runtime
            .lock()
            .as_ref()
            .map(|rt| rt.sender.max_capacity() - rt.sender.capacity())
            .unwrap_or(0)
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.config.queue_size
    }

    /// Deliver one event to one subscription right now, bypassing the queue
    ///
    /// Makes a single attempt and never retries. Errors are reserved for
    /// requests that cannot be built at all; endpoint failures come back as
    /// a failure outcome.
    pub async fn deliver_event(
        &self,
        event: &WebhookEvent,
        config: &WebhookConfig,
    ) -> Result<DeliveryOutcome> {
        self.shared.send(event, config).await
    }

    /// Read-only snapshot of the delivery subsystem
    pub fn stats(&self) -> WebhookStats {
        let config = &self.shared.config;
        let metrics = &self.shared.metrics;
        WebhookStats {
            running: self.is_running(),
            workers: config.workers,
            queue_size: self.queue_size(),
            queue_capacity: config.queue_size,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            delivered: metrics.delivered.load(Ordering::Relaxed),
            retried: metrics.retried.load(Ordering::Relaxed),
            failed: metrics.failed.load(Ordering::Relaxed),
            dropped: metrics.dropped.load(Ordering::Relaxed),
        }
    }

    fn live_sender(&self) -> Option<(mpsc::Sender<DeliveryJob>, CancellationToken)> {
        self.runtime
            .lock()
            .as_ref()
            .filter(|rt| rt.is_live())
            .map(|rt| (rt.sender.clone(), rt.token.clone()))
    }
}

#[async_trait]
impl JobQueue for WebhookDeliveryService {
    async fn enqueue(&self, job: DeliveryJob) -> bool {
        match self.live_sender() {
            Some((sender, token)) => self.shared.submit(&sender, &token, job).await,
            None => {
                debug!(
                    event_id = %job.event.id,
                    webhook_id = %job.config.id,
                    "Delivery service not running, dropping job"
                );
                self.shared.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl Drop for WebhookDeliveryService {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime.get_mut().as_ref() {
            rt.token.cancel();
        }
    }
}

impl DeliveryRuntime {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }
}

async fn worker_loop(
    id: usize,
    shared: Arc<DeliveryShared>,
    receiver: Arc<TokioMutex<mpsc::Receiver<DeliveryJob>>>,
    sender: mpsc::Sender<DeliveryJob>,
    token: CancellationToken,
) {
    debug!(worker = id, "Delivery worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            job = async { receiver.lock().await.recv().await } => match job {
                Some(job) => job,
                None => break,
            },
        };

        shared.process(job, &sender, &token).await;
    }

    debug!(worker = id, "Delivery worker stopped");
}

impl DeliveryShared {
    /// Submit honoring the queue-full policy
    async fn submit(
        &self,
        sender: &mpsc::Sender<DeliveryJob>,
        token: &CancellationToken,
        job: DeliveryJob,
    ) -> bool {
        if token.is_cancelled() {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let timeout = self.config.enqueue_timeout();
        let result = if timeout.is_zero() {
            sender.try_send(job).map_err(|e| match e {
                TrySendError::Full(job) | TrySendError::Closed(job) => job,
            })
        } else {
            sender
                .send_timeout(job, timeout)
                .await
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(job) | SendTimeoutError::Closed(job) => job,
                })
        };

        match result {
            Ok(()) => true,
            Err(job) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_id = %job.event.id,
                    event_type = %job.event.event_type,
                    webhook_id = %job.config.id,
                    attempt = job.attempts + 1,
                    queue_size = self.config.queue_size,
                    "Webhook queue full, dropping delivery"
                );
                false
            }
        }
    }

    /// Run one attempt for a dequeued job and decide what happens next
    async fn process(
        self: &Arc<Self>,
        mut job: DeliveryJob,
        sender: &mpsc::Sender<DeliveryJob>,
        token: &CancellationToken,
    ) {
        job.attempts += 1;
        let outcome = match self.send(&job.event, &job.config).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_retryable() => DeliveryOutcome::RetryableFailure {
                reason: e.to_string(),
                status_code: None,
            },
            Err(e) => DeliveryOutcome::PermanentFailure {
                reason: e.to_string(),
                status_code: None,
            },
        };

        match outcome {
            DeliveryOutcome::Delivered {
                status_code,
                latency,
            } => {
                self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    event_id = %job.event.id,
                    webhook_id = %job.config.id,
                    attempt = job.attempts,
                    status = status_code,
                    latency_ms = latency.as_millis() as u64,
                    "Webhook delivered"
                );
            }
            DeliveryOutcome::RetryableFailure { reason, status_code }
                if job.attempts <= self.config.max_retries =>
            {
                let delay = self.config.backoff_delay(job.attempts);
                job.last_error = Some(reason);
                job.next_attempt_at = chrono::Duration::from_std(delay)
                    .ok()
                    .map(|d| Utc::now() + d);
                self.metrics.retried.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_id = %job.event.id,
                    webhook_id = %job.config.id,
                    attempt = job.attempts,
                    status = ?status_code,
                    retry_in_ms = delay.as_millis() as u64,
                    error = job.last_error.as_deref().unwrap_or_default(),
                    "Webhook delivery failed, scheduling retry"
                );
                self.schedule_retry(job, delay, sender.clone(), token.clone());
            }
            DeliveryOutcome::RetryableFailure { reason, status_code }
            | DeliveryOutcome::PermanentFailure { reason, status_code } => {
                self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    event_id = %job.event.id,
                    event_type = %job.event.event_type,
                    session_id = %job.event.session_id,
                    webhook_id = %job.config.id,
                    url = %job.config.url,
                    attempts = job.attempts,
                    status = ?status_code,
                    error = %reason,
                    "Webhook delivery failed permanently"
                );
            }
        }
    }

    /// Re-submit `job` after `delay` unless shutdown happens first
    fn schedule_retry(
        self: &Arc<Self>,
        job: DeliveryJob,
        delay: Duration,
        sender: mpsc::Sender<DeliveryJob>,
        token: CancellationToken,
    ) {
        let shared = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(
                        event_id = %job.event.id,
                        webhook_id = %job.config.id,
                        "Pending retry abandoned on shutdown"
                    );
                }
                _ = tokio::time::sleep(delay) => {
                    shared.submit(&sender, &token, job).await;
                }
            }
        });
    }

    /// Sign and POST one event, classifying the response
    async fn send(&self, event: &WebhookEvent, config: &WebhookConfig) -> Result<DeliveryOutcome> {
        let url = match url::Url::parse(&config.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                return Ok(DeliveryOutcome::PermanentFailure {
                    reason: format!("Unsupported URL scheme: {}", url.scheme()),
                    status_code: None,
                });
            }
            Err(e) => {
                return Ok(DeliveryOutcome::PermanentFailure {
                    reason: format!("Invalid webhook URL '{}': {}", config.url, e),
                    status_code: None,
                });
            }
        };

        let body = event.to_body()?;

        let mut request = self
            .client
            .post(url)
            .timeout(self.config.request_timeout())
            .header(CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, event.event_type.as_str())
            .header(EVENT_ID_HEADER, event.id.to_string());

        for (key, value) in &config.headers {
            request = request.header(key, value);
        }

        if let Some(secret) = config.signing_secret() {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let start_time = Instant::now();
        let response = match request.body(body).send().await {
            Ok(response) => response,
            Err(e) => return Ok(classify_transport_error(e.into())),
        };

        let status_code = response.status().as_u16();
        let latency = start_time.elapsed();

        if (200..300).contains(&status_code) {
            return Ok(DeliveryOutcome::Delivered {
                status_code,
                latency,
            });
        }

        let response_body = response.text().await.unwrap_or_default();
        Ok(classify_status(status_code, &response_body))
    }
}

/// Outcome for a request that never produced a response
///
/// Timeouts and connection failures are transient; a request that could not
/// be built never will be.
fn classify_transport_error(e: WebhookError) -> DeliveryOutcome {
    if e.is_retryable() {
        DeliveryOutcome::RetryableFailure {
            reason: format!("Webhook request failed: {}", e),
            status_code: None,
        }
    } else {
        DeliveryOutcome::PermanentFailure {
            reason: format!("Invalid webhook request: {}", e),
            status_code: None,
        }
    }
}

/// Outcome for a non-2xx response
///
/// Server errors, request timeouts and throttling are transient; every other
/// status means the payload was rejected.
fn classify_status(status_code: u16, body: &str) -> DeliveryOutcome {
    let reason = if body.is_empty() {
        format!("Webhook returned status {}", status_code)
    } else {
        let snippet: String = body.chars().take(MAX_REASON_BODY).collect();
        format!("Webhook returned status {}: {}", status_code, snippet)
    };

    match status_code {
        200..=299 => DeliveryOutcome::Delivered {
            status_code,
            latency: Duration::ZERO,
        },
        408 | 429 | 500..=599 => DeliveryOutcome::RetryableFailure {
            reason,
            status_code: Some(status_code),
        },
        _ => DeliveryOutcome::PermanentFailure {
            reason,
            status_code: Some(status_code),
        },
    }
}
