//! Integration tests for logging functionality
//!
//! Only one test may install the global subscriber per test binary.

use p21_export::config::LoggingConfig;
use p21_export::domain::ExportError;
use p21_export::logging::{init_logging, LOG_FILE_NAME};
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_invalid_settings_are_rejected_before_install() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");
    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "weekly".to_string(),
    };

    let err = init_logging("info", &config).err().unwrap();
    assert!(matches!(err, ExportError::Configuration(_)));
    assert!(!log_path.exists());

    let err = init_logging("loud", &LoggingConfig::default()).err().unwrap();
    assert!(err.to_string().contains("Invalid log level"));
}

#[test]
fn test_file_logging_writes_json_lines() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("nested").join("logs");
    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    let guard = init_logging("debug", &config).unwrap();
    tracing::info!(target: "p21_export::tests", report = "daily_sales", "Report written");
    drop(guard);

    let contents = std::fs::read_to_string(log_path.join(LOG_FILE_NAME)).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert!(lines
        .iter()
        .any(|l| l["fields"]["message"] == "Logging initialized"));
    assert!(lines
        .iter()
        .any(|l| l["fields"]["report"] == "daily_sales"));
}
