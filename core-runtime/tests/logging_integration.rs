//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, summarize_data_uri, LogFormat, LoggingConfig,
};

#[test]
fn test_logging_initializes_once() {
    // Only one global subscriber per process: the second call must fail
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    let second = init_logging(config);
    assert!(second.is_err());
    assert!(second
        .unwrap_err()
        .to_string()
        .contains("Failed to initialize logging"));

    tracing::info!(target: "core_sync", media_count = 3, "collection replaced");
}

#[test]
fn test_invalid_filter_is_config_error() {
    let config = LoggingConfig::default().with_filter("core_sync=notalevel");
    let result = init_logging(config);
    assert!(result.is_err());
}

#[test]
fn test_remote_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("apikey", "anon"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("anon_key", "anon"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("authorization", "Bearer anon"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("uploader_id", "user-1"), "user-1");
}

#[test]
fn test_payload_summaries() {
    let summary = summarize_data_uri("data:video/mp4;base64,AAAAIGZ0eXBpc29t");
    assert_eq!(summary, "data:video/mp4;base64,<16 chars>");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/Pictures/cat.png"), "cat.png");
    assert_eq!(strip_path("D:\\media\\clip.webm"), "clip.webm");
    assert_eq!(strip_path(""), "");
}
