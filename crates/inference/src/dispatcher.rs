use crate::{
    backend::{Detector, RawDetection},
    error::InferenceError,
    loader::ImageHandle,
};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, UpDownCounter},
};
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Number of worker slots used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

struct DispatchMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    failures: Counter<u64>,
    timeouts: Counter<u64>,
    queue_depth: UpDownCounter<i64>,
}

impl DispatchMetrics {
    fn init(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.5, 5.0, 10.0,
        ];
        Self {
            duration: meter
                .f64_histogram("inference_duration_seconds")
                .with_description("Time from dispatch to result, including queueing for a worker")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            requests: meter
                .u64_counter("inference_requests_total")
                .with_description("Total inference dispatches")
                .build(),
            failures: meter
                .u64_counter("inference_failures_total")
                .with_description("Dispatches where the model raised")
                .build(),
            timeouts: meter
                .u64_counter("inference_timeouts_total")
                .with_description("Dispatches abandoned after the timeout")
                .build(),
            queue_depth: meter
                .i64_up_down_counter("inference_queue_depth")
                .with_description("Dispatches waiting for a free worker slot")
                .build(),
        }
    }
}

/// Runs blocking `Detector::predict` calls on at most `workers` blocking
/// threads at a time.
///
/// Callers beyond that wait in FIFO order for a slot; nothing is rejected for
/// saturation. The slot permit moves into the blocking task, so it is given
/// back when the model call ends, whatever the outcome, and an abandoned
/// (timed out) call keeps its slot until the model actually returns.
pub struct InferenceDispatcher<D: Detector> {
    detector: Arc<D>,
    slots: Arc<Semaphore>,
    workers: usize,
    timeout: Option<Duration>,
    metrics: DispatchMetrics,
}

impl<D: Detector> InferenceDispatcher<D> {
    pub fn new(detector: Arc<D>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            detector,
            slots: Arc::new(Semaphore::new(workers)),
            workers,
            timeout: None,
            metrics: DispatchMetrics::init("inference"),
        }
    }

    /// Abandon the caller after `timeout`. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Slots currently free. Equal to `workers()` when idle.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Run the model on one image and flatten its detections.
    pub async fn infer(&self, handle: &ImageHandle) -> Result<Vec<RawDetection>, InferenceError> {
        let start = Instant::now();
        self.metrics.requests.add(1, &[]);

        tracing::debug!(
            path = handle.path(),
            available_slots = self.available_slots(),
            workers = self.workers,
            "Dispatching inference"
        );

        let work = self.run_on_worker(handle);
        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, work).await {
                Ok(result) => result,
                Err(_) => {
                    self.metrics.timeouts.add(1, &[]);
                    tracing::warn!(
                        path = handle.path(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Inference timed out, abandoning caller"
                    );
                    Err(InferenceError::Timeout(timeout))
                }
            },
            None => work.await,
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(InferenceError::Failure(_)) => "error",
            Err(InferenceError::Timeout(_)) => "timeout",
        };
        self.metrics.duration.record(
            start.elapsed().as_secs_f64(),
            &[KeyValue::new("outcome", outcome)],
        );

        result
    }

    async fn run_on_worker(&self, handle: &ImageHandle) -> Result<Vec<RawDetection>, InferenceError> {
        let queued = Queued::enter(&self.metrics.queue_depth);
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| InferenceError::Failure("Inference worker pool is closed".to_string()))?;
        drop(queued);

        let detector = Arc::clone(&self.detector);
        let image = handle.share();

        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _s = tracing::info_span!("predict").entered();
            detector.predict(std::slice::from_ref(image.as_ref()))
        })
        .await;

        match joined {
            Ok(Ok(groups)) => Ok(groups
                .into_iter()
                .flat_map(|group| group.into_detections())
                .collect()),
            Ok(Err(e)) => {
                self.metrics.failures.add(1, &[]);
                tracing::error!(error = %e, "Model raised during prediction");
                Err(InferenceError::Failure(e.to_string()))
            }
            Err(e) if e.is_panic() => {
                self.metrics.failures.add(1, &[]);
                let message = panic_message(e.into_panic());
                tracing::error!(error = %message, "Model panicked during prediction");
                Err(InferenceError::Failure(message))
            }
            Err(e) => {
                self.metrics.failures.add(1, &[]);
                Err(InferenceError::Failure(e.to_string()))
            }
        }
    }
}

/// Counts a caller as queued until dropped, including when the wait is
/// cancelled by the timeout.
struct Queued<'a>(&'a UpDownCounter<i64>);

impl<'a> Queued<'a> {
    fn enter(depth: &'a UpDownCounter<i64>) -> Self {
        depth.add(1, &[]);
        Self(depth)
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.0.add(-1, &[]);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Inference worker panicked".to_string()
    }
}
