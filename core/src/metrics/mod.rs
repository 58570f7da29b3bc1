//! Batch aggregation and percentile calculation
//!
//! Every (backend, concurrency) batch is reduced to one
//! [`AggregatedMetrics`] once all of its requests have been finalized.
//!
//! # Example
//!
//! ```
//! use llm_bench_core::{aggregate_metrics, RequestRecord};
//! use std::time::Duration;
//!
//! let mut record = RequestRecord::new("req-0", "vllm", 1);
//! record.mark_sent(0.0);
//! record.record_token(0.1);
//! record.record_token(0.15);
//! record.set_token_counts(32, 2);
//!
//! let summary = aggregate_metrics(&[record.finish()], Some(Duration::from_secs(1)), None)?;
//! assert_eq!(summary.total_tokens, 2);
//! # Ok::<(), llm_bench_core::Error>(())
//! ```

mod aggregator;
mod percentile;

pub use aggregator::{aggregate_metrics, AggregatedMetrics, LatencyStats};
pub use percentile::percentile;
