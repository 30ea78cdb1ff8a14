//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_credential_fields_are_redacted() {
    assert_eq!(redact_if_sensitive("bearer_token", "eyJhbGciOi"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("credential", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "k-1"), "[REDACTED]");
}

#[test]
fn test_owner_email_is_masked() {
    let redacted = redact_if_sensitive("owner", "listener@example.com");
    assert!(redacted.starts_with('l'));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_playlist_fields_pass_through() {
    assert_eq!(redact_if_sensitive("playlist_id", "favorites"), "favorites");
    assert_eq!(redact_if_sensitive("track_id", "t-12345"), "t-12345");
    assert_eq!(redact_if_sensitive("revision", "6"), "6");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

// The global subscriber can only be installed once per process, so both the
// first and the second call live in the same test.
#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug);

    init_logging(config.clone()).unwrap();
    tracing::info!(playlist_id = "p1", "logging initialised");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_invalid_filter_rejected_before_install() {
    let config = LoggingConfig::default().with_filter("core_sync=loud");
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}
