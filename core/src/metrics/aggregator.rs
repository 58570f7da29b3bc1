//! Reduction of a finished batch into one statistical summary

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::percentile::percentile_of_sorted;
use crate::error::{Error, Result};
use crate::gpu::{GpuMonitorResult, GpuUsage};
use crate::timing::RequestMetrics;

/// Mean and percentiles of one latency distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Arithmetic mean
    pub mean: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 99th percentile
    pub p99: f64,
}

impl LatencyStats {
    /// Calculate statistics from unordered samples. Empty input gives zeros.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        Self {
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            p50: percentile_of_sorted(&sorted, 50.0),
            p90: percentile_of_sorted(&sorted, 90.0),
            p99: percentile_of_sorted(&sorted, 99.0),
        }
    }
}

/// Statistical summary for one (backend, concurrency) batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// Backend name
    pub backend: String,
    /// Concurrency level
    pub concurrency: usize,
    /// All requests in the batch, failed ones included
    pub num_requests: usize,

    /// Time to first token (seconds)
    pub ttft: LatencyStats,
    /// Time per output token (seconds)
    pub tpot: LatencyStats,
    /// Inter-token latency, pooled over every token (milliseconds)
    pub itl: LatencyStats,

    /// Completion tokens over successful requests
    pub total_tokens: usize,
    /// Batch wall-clock duration (seconds)
    pub wall_clock_s: f64,
    /// Aggregate output throughput
    pub throughput_tok_per_s: f64,
    /// Mean of each successful request's own tokens/second
    pub avg_tokens_per_s_per_request: f64,

    /// GPU statistics, when a monitor result was supplied
    ///
    /// Serialized as flat `gpu_*` columns that read zero when not measured.
    #[serde(flatten, with = "gpu_columns")]
    pub gpu: Option<GpuUsage>,

    /// Failed requests
    pub error_count: usize,
    /// Failed fraction of all requests (0.0 - 1.0)
    pub error_rate: f64,
}

impl AggregatedMetrics {
    /// Number of requests that completed without error
    pub fn successful_requests(&self) -> usize {
        self.num_requests.saturating_sub(self.error_count)
    }

    /// Peak GPU memory (MB), zero when not measured
    pub fn gpu_peak_memory_mb(&self) -> f64 {
        self.gpu.map_or(0.0, |g| g.peak_memory_mb)
    }

    /// Mean GPU utilization (percent), zero when not measured
    pub fn gpu_avg_utilization_pct(&self) -> f64 {
        self.gpu.map_or(0.0, |g| g.avg_utilization_pct)
    }

    /// Mean GPU power draw (watts), zero when not measured
    pub fn gpu_avg_power_w(&self) -> f64 {
        self.gpu.map_or(0.0, |g| g.avg_power_w)
    }
}

/// Flat, zero-filled GPU columns of the summary output
mod gpu_columns {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::gpu::GpuUsage;

    #[derive(Serialize, Deserialize)]
    struct GpuColumns {
        #[serde(default)]
        gpu_peak_memory_mb: f64,
        #[serde(default)]
        gpu_avg_utilization_pct: f64,
        #[serde(default)]
        gpu_avg_power_w: f64,
    }

    pub fn serialize<S: Serializer>(
        gpu: &Option<GpuUsage>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let g = gpu.unwrap_or(GpuUsage {
            peak_memory_mb: 0.0,
            avg_utilization_pct: 0.0,
            avg_power_w: 0.0,
        });
        GpuColumns {
            gpu_peak_memory_mb: g.peak_memory_mb,
            gpu_avg_utilization_pct: g.avg_utilization_pct,
            gpu_avg_power_w: g.avg_power_w,
        }
        .serialize(serializer)
    }

    // All-zero columns are indistinguishable from "not measured" and read back as None
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<GpuUsage>, D::Error> {
        let c = GpuColumns::deserialize(deserializer)?;
        if c.gpu_peak_memory_mb == 0.0
            && c.gpu_avg_utilization_pct == 0.0
            && c.gpu_avg_power_w == 0.0
        {
            return Ok(None);
        }
        Ok(Some(GpuUsage {
            peak_memory_mb: c.gpu_peak_memory_mb,
            avg_utilization_pct: c.gpu_avg_utilization_pct,
            avg_power_w: c.gpu_avg_power_w,
        }))
    }
}

/// Aggregate a batch of finalized request metrics into a summary
///
/// Failed requests count toward `num_requests` and the error rate but never
/// toward latency or throughput. Zero TTFT/TPOT values are treated as not
/// measured and left out of their distributions.
///
/// Returns [`Error::InvalidBatch`] when `requests` is empty.
pub fn aggregate_metrics(
    requests: &[RequestMetrics],
    wall_clock: Option<Duration>,
    gpu: Option<&GpuMonitorResult>,
) -> Result<AggregatedMetrics> {
    let first = requests
        .first()
        .ok_or_else(|| Error::InvalidBatch("no requests to aggregate".into()))?;
    let backend = first.backend().to_string();
    let concurrency = first.concurrency();

    if requests
        .iter()
        .any(|r| r.backend() != backend || r.concurrency() != concurrency)
    {
        tracing::warn!(
            backend = %backend,
            concurrency,
            "batch mixes backends or concurrency levels, summarizing under the first record"
        );
    }

    let successful: Vec<&RequestMetrics> = requests.iter().filter(|r| r.is_success()).collect();
    let num_requests = requests.len();
    let error_count = num_requests - successful.len();

    let ttft_values: Vec<f64> = successful
        .iter()
        .map(|r| r.ttft_s())
        .filter(|v| *v > 0.0)
        .collect();
    let tpot_values: Vec<f64> = successful
        .iter()
        .map(|r| r.tpot_s())
        .filter(|v| *v > 0.0)
        .collect();
    let itl_values: Vec<f64> = successful
        .iter()
        .flat_map(|r| r.itl_values_ms().iter().copied())
        .collect();
    let tps_values: Vec<f64> = successful
        .iter()
        .map(|r| r.tokens_per_second())
        .filter(|v| *v > 0.0)
        .collect();
    let total_tokens: usize = successful.iter().map(|r| r.completion_tokens()).sum();

    let wall_clock_s = wall_clock.map_or(0.0, |d| d.as_secs_f64());
    let throughput_tok_per_s = if wall_clock_s > 0.0 {
        total_tokens as f64 / wall_clock_s
    } else {
        0.0
    };

    let avg_tokens_per_s_per_request = if tps_values.is_empty() {
        0.0
    } else {
        tps_values.iter().sum::<f64>() / tps_values.len() as f64
    };

    tracing::debug!(
        backend = %backend,
        concurrency,
        num_requests,
        error_count,
        itl_samples = itl_values.len(),
        "aggregated batch"
    );

    Ok(AggregatedMetrics {
        backend,
        concurrency,
        num_requests,
        ttft: LatencyStats::from_values(&ttft_values),
        tpot: LatencyStats::from_values(&tpot_values),
        itl: LatencyStats::from_values(&itl_values),
        total_tokens,
        wall_clock_s,
        throughput_tok_per_s,
        avg_tokens_per_s_per_request,
        gpu: gpu.map(GpuUsage::from),
        error_count,
        error_rate: error_count as f64 / num_requests as f64,
    })
}
