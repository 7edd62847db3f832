//! Integration tests for layered configuration loading

use message_runtime::config::MessagingConfig;
use message_runtime::ConfigurationError;
use std::io::Write;

/// Environment overrides are process-wide, so every scenario touching them
/// runs inside this single test.
#[test]
fn test_environment_overrides_file_values() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        "[broker]\nmax_batch_size = 8\nreject_delay_ms = 10\n\n[offload]\nthreshold_bytes = 2048"
    )
    .unwrap();

    std::env::set_var("MESSAGING__BROKER__MAX_BATCH_SIZE", "16");
    std::env::set_var("MESSAGING__LISTEN_RETRY__BACKOFF_MS", "750");

    let config = MessagingConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.broker.max_batch_size, 16);
    assert_eq!(config.broker.reject_delay_ms, 10);
    assert_eq!(config.listen_retry.backoff_ms, 750);
    assert_eq!(config.offload.threshold_bytes, 2048);

    std::env::set_var("MESSAGING__PARTITION__PARALLELIZATION", "0");
    let invalid = MessagingConfig::load(Some(file.path()));
    assert!(matches!(invalid, Err(ConfigurationError::Invalid { .. })));

    std::env::remove_var("MESSAGING__BROKER__MAX_BATCH_SIZE");
    std::env::remove_var("MESSAGING__LISTEN_RETRY__BACKOFF_MS");
    std::env::remove_var("MESSAGING__PARTITION__PARALLELIZATION");

    let restored = MessagingConfig::load(Some(file.path())).unwrap();
    assert_eq!(restored.broker.max_batch_size, 8);
}
