//! Tests for error types.

use super::*;
use bytes::Bytes;

#[test]
fn test_error_transience() {
    assert!(MessagingError::ConnectionFailed {
        message: "network error".to_string(),
    }
    .is_transient());

    assert!(!MessagingError::Cancelled.is_transient());

    assert!(!MessagingError::not_supported("message_count").is_transient());

    assert!(MessagingError::PublishFailed {
        failed: vec![Message::new(Bytes::from("a"))],
        message: "throttled".to_string(),
    }
    .is_transient());
}

#[test]
fn test_cancellation_and_not_supported_are_distinct() {
    let cancelled = MessagingError::Cancelled;
    assert!(cancelled.is_cancellation());
    assert!(!cancelled.is_not_supported());

    let unsupported = MessagingError::not_supported("message_count");
    assert!(unsupported.is_not_supported());
    assert!(!unsupported.is_cancellation());
    assert_eq!(
        unsupported.to_string(),
        "Operation not supported by this transport: message_count"
    );
}

#[test]
fn test_publish_failure_carries_failed_subset() {
    let failed = vec![
        Message::new(Bytes::from("first")).with_id("1"),
        Message::new(Bytes::from("second")).with_id("2"),
    ];
    let error = MessagingError::PublishFailed {
        failed,
        message: "partial batch rejected".to_string(),
    };

    let ids: Vec<_> = error.failed_messages().iter().map(|m| m.id()).collect();
    assert_eq!(ids, vec![Some("1"), Some("2")]);
    assert!(error.to_string().contains("2 message(s)"));

    assert!(MessagingError::Cancelled.failed_messages().is_empty());
}

#[test]
fn test_application_errors_convert_from_anyhow() {
    fn fails() -> Result<(), MessagingError> {
        Err::<(), _>(anyhow::anyhow!("order rejected"))?;
        Ok(())
    }

    let error = fails().unwrap_err();
    assert!(matches!(error, MessagingError::Application(_)));
    assert!(error.to_string().contains("order rejected"));
}
