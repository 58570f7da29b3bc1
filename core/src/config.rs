//! Benchmark run configuration
//!
//! Loaded from YAML and validated before any request is issued.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Model under test
    pub model: ModelConfig,
    /// Serving backend
    pub backend: BackendConfig,
    /// Load generation parameters
    #[serde(default)]
    pub load: LoadConfig,
    /// GPU sampling parameters
    #[serde(default)]
    pub gpu_monitor: GpuMonitorConfig,
    /// Report output parameters
    #[serde(default)]
    pub report: ReportConfig,
    /// Requests issued before measurement starts
    #[serde(default = "default_warmup_requests")]
    pub warmup_requests: usize,
}

/// Weight precision the backend loads the model with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// Let the backend decide
    #[default]
    Auto,
    /// IEEE half precision
    Float16,
    /// Brain floating point
    Bfloat16,
    /// Single precision
    Float32,
}

/// Model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name or path
    pub name: String,
    /// Load precision
    #[serde(default)]
    pub dtype: Dtype,
    /// Context length override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_model_len: Option<usize>,
    /// Allow custom model code from the hub
    #[serde(default)]
    pub trust_remote_code: bool,
    /// Fraction of device memory the backend may claim
    #[serde(default = "default_gpu_memory_utilization")]
    pub gpu_memory_utilization: f64,
}

/// Supported serving backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Plain Hugging Face generate loop
    HfNaive,
    /// vLLM OpenAI-compatible server
    Vllm,
    /// SGLang server
    Sglang,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::HfNaive => write!(f, "hf_naive"),
            BackendKind::Vllm => write!(f, "vllm"),
            BackendKind::Sglang => write!(f, "sglang"),
        }
    }
}

/// Backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Which backend to launch
    pub name: BackendKind,
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Extra command-line arguments passed through to the backend
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Where prompts come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    /// Synthetic prompts of `input_len` tokens
    #[default]
    Random,
    /// ShareGPT conversation dump
    Sharegpt,
}

/// Load generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Concurrency levels to sweep, one batch each
    pub concurrency_levels: Vec<usize>,
    /// Requests per concurrency level
    pub num_requests: usize,
    /// Prompt source
    pub prompt_source: PromptSource,
    /// ShareGPT file, required when `prompt_source` is `sharegpt`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharegpt_path: Option<String>,
    /// Prompt length in tokens
    pub input_len: usize,
    /// Completion length in tokens
    pub output_len: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            concurrency_levels: vec![1, 2, 4, 8, 16],
            num_requests: 50,
            prompt_source: PromptSource::Random,
            sharegpt_path: None,
            input_len: 256,
            output_len: 128,
        }
    }
}

/// GPU sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuMonitorConfig {
    /// Sample the GPU during each batch
    pub enabled: bool,
    /// Sampling period
    pub sample_interval_ms: u64,
    /// Device to sample
    pub device_index: u32,
}

impl Default for GpuMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_ms: 100,
            device_index: 0,
        }
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Machine-readable summary
    Json,
    /// One row per batch
    Csv,
    /// Rendered report with charts
    Html,
}

/// Report settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory results are written to
    pub output_dir: String,
    /// Formats to render
    pub formats: Vec<ReportFormat>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "results".into(),
            formats: vec![ReportFormat::Json, ReportFormat::Html],
        }
    }
}

fn default_warmup_requests() -> usize {
    3
}

fn default_gpu_memory_utilization() -> f64 {
    0.90
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

impl BenchmarkConfig {
    /// Parse a configuration from YAML text and validate it
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.load.concurrency_levels.is_empty() {
            return Err(ConfigError::InvalidConcurrency(
                "at least one concurrency level is required".into(),
            ));
        }

        if self.load.concurrency_levels.contains(&0) {
            return Err(ConfigError::InvalidConcurrency(
                "concurrency levels must be at least 1".into(),
            ));
        }

        if self.load.num_requests == 0 {
            return Err(ConfigError::InvalidRequestCount(
                "num_requests must be at least 1".into(),
            ));
        }

        let util = self.model.gpu_memory_utilization;
        if !(util > 0.0 && util <= 1.0) {
            return Err(ConfigError::InvalidMemoryUtilization(format!(
                "gpu_memory_utilization must be in (0, 1], got {util}"
            )));
        }

        if self.load.prompt_source == PromptSource::Sharegpt
            && self.load.sharegpt_path.is_none()
        {
            return Err(ConfigError::MissingPromptFile(
                "sharegpt_path is required when prompt_source is sharegpt".into(),
            ));
        }

        if self.gpu_monitor.enabled && self.gpu_monitor.sample_interval_ms == 0 {
            return Err(ConfigError::InvalidSampleInterval(
                "sample_interval_ms must be positive when monitoring is enabled".into(),
            ));
        }

        Ok(())
    }
}

/// Load and validate a configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<BenchmarkConfig> {
    let text = std::fs::read_to_string(path.as_ref())?;
    BenchmarkConfig::from_yaml(&text)
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid concurrency levels
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid request count
    #[error("Invalid request count: {0}")]
    InvalidRequestCount(String),

    /// Memory fraction out of range
    #[error("Invalid GPU memory utilization: {0}")]
    InvalidMemoryUtilization(String),

    /// Prompt file missing for the selected source
    #[error("Missing prompt file: {0}")]
    MissingPromptFile(String),

    /// GPU sampling period out of range
    #[error("Invalid sample interval: {0}")]
    InvalidSampleInterval(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    const MINIMAL: &str = "
model:
  name: meta-llama/Llama-3.1-8B-Instruct
backend:
  name: vllm
";

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let config = BenchmarkConfig::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.model.dtype, Dtype::Auto);
        assert_eq!(config.model.gpu_memory_utilization, 0.90);
        assert!(!config.model.trust_remote_code);
        assert_eq!(config.backend.name, BackendKind::Vllm);
        assert_eq!(config.backend.host, "127.0.0.1");
        assert_eq!(config.backend.port, 8000);
        assert_eq!(config.load.concurrency_levels, vec![1, 2, 4, 8, 16]);
        assert_eq!(config.load.num_requests, 50);
        assert_eq!(config.load.prompt_source, PromptSource::Random);
        assert!(config.gpu_monitor.enabled);
        assert_eq!(config.gpu_monitor.sample_interval_ms, 100);
        assert_eq!(config.report.output_dir, "results");
        assert_eq!(
            config.report.formats,
            vec![ReportFormat::Json, ReportFormat::Html]
        );
        assert_eq!(config.warmup_requests, 3);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = "
model:
  name: Qwen/Qwen2.5-7B
  dtype: bfloat16
  max_model_len: 8192
backend:
  name: sglang
  port: 30000
  extra_args: [\"--tp\", \"2\"]
load:
  concurrency_levels: [4, 32]
  num_requests: 200
  prompt_source: sharegpt
  sharegpt_path: data/sharegpt.json
gpu_monitor:
  enabled: false
  sample_interval_ms: 0
report:
  formats: [csv]
warmup_requests: 0
";
        let config = BenchmarkConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.model.dtype, Dtype::Bfloat16);
        assert_eq!(config.model.max_model_len, Some(8192));
        assert_eq!(config.backend.name, BackendKind::Sglang);
        assert_eq!(config.backend.extra_args, vec!["--tp", "2"]);
        assert_eq!(config.load.concurrency_levels, vec![4, 32]);
        assert_eq!(config.load.input_len, 256);
        assert_eq!(config.report.formats, vec![ReportFormat::Csv]);
        assert_eq!(config.warmup_requests, 0);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let yaml = MINIMAL.replace("vllm", "tgi");
        assert!(matches!(BenchmarkConfig::from_yaml(&yaml), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let mut config = BenchmarkConfig::from_yaml(MINIMAL).unwrap();
        config.load.concurrency_levels = vec![1, 0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency(_))
        ));

        config.load.concurrency_levels.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_requests() {
        let mut config = BenchmarkConfig::from_yaml(MINIMAL).unwrap();
        config.load.num_requests = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRequestCount(_))
        ));
    }

    #[test]
    fn test_validation_memory_utilization() {
        let mut config = BenchmarkConfig::from_yaml(MINIMAL).unwrap();
        for bad in [0.0, -0.5, 1.5] {
            config.model.gpu_memory_utilization = bad;
            assert!(config.validate().is_err());
        }
        config.model.gpu_memory_utilization = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_sharegpt_requires_path() {
        let mut config = BenchmarkConfig::from_yaml(MINIMAL).unwrap();
        config.load.prompt_source = PromptSource::Sharegpt;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPromptFile(_))
        ));
    }

    #[test]
    fn test_validation_sample_interval() {
        let mut config = BenchmarkConfig::from_yaml(MINIMAL).unwrap();
        config.gpu_monitor.sample_interval_ms = 0;
        assert!(config.validate().is_err());

        config.gpu_monitor.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.model.name, "meta-llama/Llama-3.1-8B-Instruct");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/bench.yaml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(BackendKind::HfNaive.to_string(), "hf_naive");
        assert_eq!(BackendKind::Sglang.to_string(), "sglang");
    }
}
