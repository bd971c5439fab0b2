//! Common configuration types for virt-env-tests components.

use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Path of the persistent session log file
    pub log_file: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: "virt-tests.log".to_string(),
            log_level: "info".to_string(),
        }
    }
}
