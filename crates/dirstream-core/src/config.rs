//! Scan configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for a streaming scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Number of worker tasks (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub workers: usize,

    /// Capacity of the channel feeding paths to workers.
    #[builder(default = "100")]
    #[serde(default = "default_work_channel_capacity")]
    pub work_channel_capacity: usize,

    /// Capacity of the update channel read by the consumer.
    #[builder(default = "50")]
    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,

    /// How often the completion monitor samples the pipeline.
    #[builder(default = "100")]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long the pipeline must stay idle before completion is declared.
    #[builder(default = "100")]
    #[serde(default = "default_confirm_window_ms")]
    pub confirm_window_ms: u64,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Names to skip (exact, `prefix*` or `*suffix`).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Send a `FileEntry` / `DirEntry` event for every discovered entry.
    #[builder(default = "false")]
    #[serde(default)]
    pub emit_entries: bool,

    /// Send periodic `Progress` events.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub emit_progress: bool,
}

fn default_true() -> bool {
    true
}

fn default_work_channel_capacity() -> usize {
    100
}

fn default_update_channel_capacity() -> usize {
    50
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_confirm_window_ms() -> u64 {
    100
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.work_channel_capacity == Some(0) {
            return Err("Work channel capacity must be at least 1".to_string());
        }
        if self.update_channel_capacity == Some(0) {
            return Err("Update channel capacity must be at least 1".to_string());
        }
        if self.poll_interval_ms == Some(0) {
            return Err("Poll interval must be at least 1ms".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config with default settings.
    pub fn new() -> Self {
        Self {
            workers: 0,
            work_channel_capacity: default_work_channel_capacity(),
            update_channel_capacity: default_update_channel_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            confirm_window_ms: default_confirm_window_ms(),
            include_hidden: true,
            ignore_patterns: Vec::new(),
            emit_entries: false,
            emit_progress: true,
        }
    }

    /// Check that a hand-built config can drive a pipeline.
    pub fn check(&self) -> Result<(), String> {
        if self.work_channel_capacity == 0 || self.update_channel_capacity == 0 {
            return Err("Channel capacities must be at least 1".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be at least 1ms".to_string());
        }
        Ok(())
    }

    /// Number of worker tasks to spawn.
    ///
    /// Directory listing is I/O bound, so auto-detection oversubscribes
    /// the available cores.
    pub fn effective_workers(&self) -> usize {
        match self.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                * 4,
            n => n,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_window(&self) -> Duration {
        Duration::from_millis(self.confirm_window_ms)
    }

    /// Check if a name should be ignored based on patterns.
    pub fn should_ignore(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| {
            if name == pattern {
                return true;
            }
            if let Some(prefix) = pattern.strip_suffix('*') {
                if name.starts_with(prefix) {
                    return true;
                }
            }
            if let Some(suffix) = pattern.strip_prefix('*') {
                if name.ends_with(suffix) {
                    return true;
                }
            }
            false
        })
    }

    /// Check if hidden entries should be skipped.
    pub fn should_skip_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }

    /// Combined entry filter used by the scanner.
    pub fn should_skip(&self, name: &str) -> bool {
        self.should_skip_hidden(name) || self.should_ignore(name)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .workers(4usize)
            .confirm_window_ms(250u64)
            .include_hidden(false)
            .build()
            .unwrap();

        assert_eq!(config.workers, 4);
        assert_eq!(config.effective_workers(), 4);
        assert_eq!(config.confirm_window(), Duration::from_millis(250));
        assert!(!config.include_hidden);
        assert_eq!(config.update_channel_capacity, 50);
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = ScanConfig::builder().update_channel_capacity(0usize).build();
        assert!(result.is_err());

        let result = ScanConfig::builder().poll_interval_ms(0u64).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_auto_workers() {
        let config = ScanConfig::new();
        assert!(config.effective_workers() >= 4);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_should_ignore() {
        let config = ScanConfig::builder()
            .ignore_patterns(vec![
                "node_modules".to_string(),
                "*.log".to_string(),
                "tmp*".to_string(),
            ])
            .build()
            .unwrap();

        assert!(config.should_ignore("node_modules"));
        assert!(config.should_ignore("test.log"));
        assert!(config.should_ignore("tmp_build"));
        assert!(!config.should_ignore("src"));
    }

    #[test]
    fn test_should_skip_hidden() {
        let mut config = ScanConfig::new();

        assert!(!config.should_skip_hidden(".git"));

        config.include_hidden = false;
        assert!(config.should_skip_hidden(".git"));
        assert!(!config.should_skip_hidden("src"));
        assert!(config.should_skip(".git"));
    }

    #[test]
    fn test_serde_defaults() {
        let config: ScanConfig = serde_json::from_str(r#"{"workers": 2}"#).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.work_channel_capacity, 100);
        assert!(config.include_hidden);
        assert!(config.emit_progress);
    }
}
