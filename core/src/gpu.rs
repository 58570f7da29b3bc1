//! GPU utilization samples and their per-batch summary
//!
//! Device polling happens elsewhere; this module only holds the sample
//! shape and reduces a sample series to the summary the aggregator joins.

use serde::{Deserialize, Serialize};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One reading taken from the GPU during a batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpuSample {
    /// Monotonic timestamp (seconds)
    pub timestamp: f64,
    /// Device memory in use
    pub memory_used_bytes: u64,
    /// Device memory capacity
    pub memory_total_bytes: u64,
    /// Compute utilization (0-100)
    pub gpu_utilization_pct: u32,
    /// Memory controller utilization (0-100)
    pub memory_utilization_pct: u32,
    /// Board power draw
    pub power_watts: f64,
    /// Core temperature
    pub temperature_c: u32,
}

/// Summary of the samples co-incident with one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuMonitorResult {
    /// Raw samples the summary was built from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<GpuSample>,
    /// Highest memory use seen
    pub peak_memory_bytes: u64,
    /// Mean compute utilization (percent)
    pub avg_gpu_utilization_pct: f64,
    /// Mean power draw (watts)
    pub avg_power_watts: f64,
}

impl GpuMonitorResult {
    /// Summarize a sample series. An empty series yields all zeros.
    pub fn from_samples(samples: Vec<GpuSample>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f64;
        let peak_memory_bytes = samples
            .iter()
            .map(|s| s.memory_used_bytes)
            .max()
            .unwrap_or(0);
        let avg_gpu_utilization_pct = samples
            .iter()
            .map(|s| s.gpu_utilization_pct as f64)
            .sum::<f64>()
            / n;
        let avg_power_watts = samples.iter().map(|s| s.power_watts).sum::<f64>() / n;

        Self {
            samples,
            peak_memory_bytes,
            avg_gpu_utilization_pct,
            avg_power_watts,
        }
    }

    /// Peak memory converted to megabytes (MiB)
    pub fn peak_memory_mb(&self) -> f64 {
        self.peak_memory_bytes as f64 / BYTES_PER_MB
    }
}

/// GPU statistics attached to an aggregated batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpuUsage {
    /// Peak memory in use (MB)
    pub peak_memory_mb: f64,
    /// Mean compute utilization (percent)
    pub avg_utilization_pct: f64,
    /// Mean power draw (watts)
    pub avg_power_w: f64,
}

impl From<&GpuMonitorResult> for GpuUsage {
    fn from(result: &GpuMonitorResult) -> Self {
        Self {
            peak_memory_mb: result.peak_memory_mb(),
            avg_utilization_pct: result.avg_gpu_utilization_pct,
            avg_power_w: result.avg_power_watts,
        }
    }
}
