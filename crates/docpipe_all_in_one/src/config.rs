use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Container configuration
    /// Container receiving uploaded documents
    #[serde(default = "default_master_container")]
    pub master_container: String,

    /// Container the worker copies documents into
    #[serde(default = "default_cached_container")]
    pub cached_container: String,

    // Queue configuration
    /// Delivery queue between the master container and the worker
    #[serde(default = "default_transfer_queue")]
    pub transfer_queue: String,

    /// Visibility timeout for in-flight deliveries in seconds
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Retention period for unconsumed messages in days
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    // Consumer configuration
    /// Maximum messages per handler invocation
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Max wait time for assembling a batch in seconds
    #[serde(default = "default_max_batching_window_secs")]
    pub max_batching_window_secs: u64,

    /// Settle each record individually from the handler's failure report
    #[serde(default = "default_report_item_failures")]
    pub report_item_failures: bool,

    // Demo uploader
    /// Periodically upload a sample document to exercise the pipeline
    #[serde(default)]
    pub demo_uploader_enabled: bool,

    /// Interval between demo uploads in seconds
    #[serde(default = "default_demo_upload_interval_secs")]
    pub demo_upload_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_master_container() -> String {
    "master-documents".to_string()
}

fn default_cached_container() -> String {
    "cached-documents".to_string()
}

fn default_transfer_queue() -> String {
    "file-transfer".to_string()
}

fn default_visibility_timeout_secs() -> u64 {
    60
}

fn default_retention_days() -> u64 {
    3
}

fn default_max_batch_size() -> usize {
    10
}

fn default_max_batching_window_secs() -> u64 {
    60
}

fn default_report_item_failures() -> bool {
    true
}

fn default_demo_upload_interval_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("DOCPIPE"))
            .build()?
            .try_deserialize()
    }
}
