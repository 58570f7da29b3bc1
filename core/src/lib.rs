//! llm-bench-core: metrics pipeline for benchmarking LLM inference backends
//!
//! This crate turns raw observations collected by the load generator into
//! comparable statistics:
//!
//! - Per-request timing reduction (TTFT, TPOT, inter-token latency)
//! - Linear interpolation percentiles
//! - Per-batch aggregation, optionally joined with a GPU summary
//! - Run configuration and error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gpu;
pub mod metrics;
pub mod timing;

pub use config::{load_config, BenchmarkConfig, ConfigError};
pub use error::*;
pub use gpu::*;
pub use metrics::*;
pub use timing::*;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    // =========================================================================
    // End-to-end: accumulate, reduce, aggregate
    // =========================================================================

    /// Simulates a streaming client recording token arrivals
    fn stream(id: usize, backend: &str, concurrency: usize, arrivals: &[f64]) -> RequestRecord {
        let mut record = RequestRecord::new(format!("{backend}-{id}"), backend, concurrency);
        record.mark_sent(100.0);
        for t in arrivals {
            record.record_token(100.0 + t);
        }
        record.set_token_counts(64, arrivals.len());
        record
    }

    #[test]
    fn test_pipeline_five_requests_one_failed() {
        let mut records: Vec<RequestRecord> = (0..5)
            .map(|i| stream(i, "sglang", 4, &[0.2, 0.25, 0.3, 0.35]))
            .collect();
        records[2].fail("timeout");

        let metrics: Vec<RequestMetrics> = records.into_iter().map(RequestRecord::finish).collect();
        let gpu = GpuMonitorResult::from_samples(vec![GpuSample {
            timestamp: 100.0,
            memory_used_bytes: 40 * 1024 * 1024 * 1024,
            memory_total_bytes: 80 * 1024 * 1024 * 1024,
            gpu_utilization_pct: 95,
            memory_utilization_pct: 60,
            power_watts: 650.0,
            temperature_c: 71,
        }]);

        let agg = aggregate_metrics(&metrics, Some(Duration::from_secs(2)), Some(&gpu)).unwrap();

        assert_eq!(agg.backend, "sglang");
        assert_eq!(agg.concurrency, 4);
        assert_eq!(agg.num_requests, 5);
        assert_eq!(agg.error_count, 1);
        assert!((agg.error_rate - 0.2).abs() < 1e-12);
        assert_eq!(agg.total_tokens, 16);
        assert!((agg.throughput_tok_per_s - 8.0).abs() < 1e-9);
        assert!((agg.ttft.mean - 0.2).abs() < 1e-9);
        assert!((agg.tpot.mean - 0.05).abs() < 1e-9);
        assert!((agg.itl.p90 - 50.0).abs() < 1e-6);
        assert_eq!(agg.gpu_peak_memory_mb(), 40.0 * 1024.0);
        assert_eq!(agg.gpu_avg_power_w(), 650.0);
    }

    #[test]
    fn test_summary_roundtrip() {
        let metrics = vec![stream(0, "vllm", 1, &[0.1, 0.2]).finish()];
        let agg = aggregate_metrics(&metrics, Some(Duration::from_secs(1)), None).unwrap();

        let json = serde_json::to_string(&agg).unwrap();
        let deserialized: AggregatedMetrics = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.backend, agg.backend);
        assert_eq!(deserialized.num_requests, agg.num_requests);
        assert_eq!(deserialized.total_tokens, agg.total_tokens);
        assert!(deserialized.gpu.is_none());
    }

    #[test]
    fn test_invalid_batch_message() {
        let err = aggregate_metrics(&[], None, None).unwrap_err();
        assert_eq!(err.to_string(), "invalid batch: no requests to aggregate");
    }
}
