//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry formatting and DefaultLogger.

use crate::log::{format_entry, DefaultLogger, LogEntry, LogSeverity, Logger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "nebula::gl".to_string(),
        message: "Probed 12 extensions".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

#[test]
fn test_format_entry_without_location() {
    let text = format_entry(&entry(LogSeverity::Info, None, None));
    assert!(text.contains("[INFO ]"));
    assert!(text.contains("[nebula::gl]"));
    assert!(text.ends_with("Probed 12 extensions"));
}

#[test]
fn test_format_entry_with_location() {
    let text = format_entry(&entry(LogSeverity::Error, Some("gl_probe.rs"), Some(42)));
    assert!(text.contains("[ERROR]"));
    assert!(text.ends_with("(gl_probe.rs:42)"));
}

#[test]
fn test_format_entry_ignores_partial_location() {
    let text = format_entry(&entry(LogSeverity::Warn, Some("gl_probe.rs"), None));
    assert!(!text.contains("gl_probe.rs"));
}

// ============================================================================
// DEFAULT LOGGER
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    logger.log(&entry(LogSeverity::Trace, None, None));
    logger.log(&entry(LogSeverity::Debug, None, None));
    logger.log(&entry(LogSeverity::Info, None, None));
    logger.log(&entry(LogSeverity::Warn, None, None));
    logger.log(&entry(LogSeverity::Error, Some("file.rs"), Some(1)));
}
