//! Per-request timing capture and reduction
//!
//! A [`RequestRecord`] is the mutable accumulator owned by one in-flight
//! request. Once the last token has arrived it is finalized through
//! [`compute_request_metrics`] into an immutable [`RequestMetrics`].

use serde::{Deserialize, Serialize};

/// Raw observations for a single inference request
///
/// Timestamps come from a monotonic clock, in seconds, with an arbitrary
/// epoch shared by every timestamp in the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Request identifier
    pub request_id: String,
    /// Backend that served the request (e.g. "vllm")
    pub backend: String,
    /// Concurrency level the request ran under
    pub concurrency: usize,

    /// When the request was dispatched
    #[serde(default)]
    pub t_request_sent: f64,
    /// When the first token arrived
    #[serde(default)]
    pub t_first_token: f64,
    /// When the last token arrived
    #[serde(default)]
    pub t_last_token: f64,
    /// Arrival time of every streamed token, in order
    #[serde(default)]
    pub token_timestamps: Vec<f64>,

    /// Prompt token count
    #[serde(default)]
    pub prompt_tokens: usize,
    /// Completion token count
    #[serde(default)]
    pub completion_tokens: usize,

    /// Failure reported by the execution layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestRecord {
    /// Create an empty record for a request about to be dispatched
    pub fn new(
        request_id: impl Into<String>,
        backend: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            backend: backend.into(),
            concurrency,
            ..Default::default()
        }
    }

    /// Record the dispatch time
    pub fn mark_sent(&mut self, t: f64) {
        self.t_request_sent = t;
    }

    /// Record the arrival of one streamed token
    pub fn record_token(&mut self, t: f64) {
        if self.token_timestamps.is_empty() {
            self.t_first_token = t;
        }
        self.t_last_token = t;
        self.token_timestamps.push(t);
    }

    /// Set the token counts reported by the backend
    pub fn set_token_counts(&mut self, prompt_tokens: usize, completion_tokens: usize) {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
    }

    /// Mark the request as failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Check if the request failed
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Finalize the record into derived metrics
    pub fn finish(self) -> RequestMetrics {
        compute_request_metrics(self)
    }
}

/// A reduced request: raw observations plus derived latency measures
///
/// Derived fields are computed once, in [`compute_request_metrics`], and are
/// read-only afterwards. Deserializing reads only the raw observations and
/// reduces them again; derived values present in the input are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RequestRecord")]
pub struct RequestMetrics {
    #[serde(flatten)]
    record: RequestRecord,

    ttft_s: f64,
    tpot_s: f64,
    itl_values_ms: Vec<f64>,
    total_time_s: f64,
    tokens_per_second: f64,
}

impl RequestMetrics {
    /// Raw observations this value was derived from
    pub fn record(&self) -> &RequestRecord {
        &self.record
    }

    /// Give back the raw record
    pub fn into_record(self) -> RequestRecord {
        self.record
    }

    /// Backend name
    pub fn backend(&self) -> &str {
        &self.record.backend
    }

    /// Concurrency level
    pub fn concurrency(&self) -> usize {
        self.record.concurrency
    }

    /// Completion token count
    pub fn completion_tokens(&self) -> usize {
        self.record.completion_tokens
    }

    /// Failure message, if the request failed
    pub fn error(&self) -> Option<&str> {
        self.record.error.as_deref()
    }

    /// Check if the request succeeded
    pub fn is_success(&self) -> bool {
        self.record.error.is_none()
    }

    /// Time to first token (seconds)
    pub fn ttft_s(&self) -> f64 {
        self.ttft_s
    }

    /// Mean decode time per token after the first (seconds)
    pub fn tpot_s(&self) -> f64 {
        self.tpot_s
    }

    /// Gaps between consecutive token arrivals (milliseconds)
    pub fn itl_values_ms(&self) -> &[f64] {
        &self.itl_values_ms
    }

    /// End-to-end latency (seconds)
    pub fn total_time_s(&self) -> f64 {
        self.total_time_s
    }

    /// Completion tokens per second over the whole request
    pub fn tokens_per_second(&self) -> f64 {
        self.tokens_per_second
    }
}

impl From<RequestRecord> for RequestMetrics {
    fn from(record: RequestRecord) -> Self {
        compute_request_metrics(record)
    }
}

/// Derive per-request latency measures from raw timestamps
///
/// Failed requests and requests without any token timestamps keep every
/// derived field at zero.
pub fn compute_request_metrics(record: RequestRecord) -> RequestMetrics {
    let mut metrics = RequestMetrics {
        record,
        ttft_s: 0.0,
        tpot_s: 0.0,
        itl_values_ms: Vec::new(),
        total_time_s: 0.0,
        tokens_per_second: 0.0,
    };

    let r = &metrics.record;
    if r.error.is_some() || r.token_timestamps.is_empty() {
        return metrics;
    }

    let ttft_s = r.t_first_token - r.t_request_sent;
    let total_time_s = r.t_last_token - r.t_request_sent;

    let n = r.completion_tokens;
    let tpot_s = if n > 1 {
        (r.t_last_token - r.t_first_token) / (n - 1) as f64
    } else {
        0.0
    };

    let itl_values_ms = r
        .token_timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]) * 1000.0)
        .collect();

    let tokens_per_second = if total_time_s > 0.0 {
        n as f64 / total_time_s
    } else {
        0.0
    };

    metrics.ttft_s = ttft_s;
    metrics.total_time_s = total_time_s;
    metrics.tpot_s = tpot_s;
    metrics.itl_values_ms = itl_values_ms;
    metrics.tokens_per_second = tokens_per_second;
    metrics
}
