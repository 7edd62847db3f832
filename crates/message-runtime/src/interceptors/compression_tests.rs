//! Tests for the gzip interceptors

use super::*;
use crate::interceptors::test_support::{
    listen_into_channel, next_batch, wait_for_listeners, PartiallyFailingPublisher,
    RecordingPublisher,
};
use crate::providers::InMemoryBroker;

// ============================================================================
// Compression Level
// ============================================================================

#[test]
fn test_compression_level_accepts_zero_to_nine() {
    assert_eq!(CompressionLevel::new(0).unwrap().value(), 0);
    assert_eq!(CompressionLevel::new(9).unwrap(), CompressionLevel::BEST);
    assert_eq!(CompressionLevel::default().value(), 6);
}

#[test]
fn test_compression_level_rejects_out_of_range() {
    let result = CompressionLevel::new(10);
    assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
}

#[test]
fn test_compression_level_from_config() {
    let config = CompressionConfig { level: 3 };
    assert_eq!(CompressionLevel::try_from(&config).unwrap().value(), 3);

    let invalid = CompressionConfig { level: 12 };
    assert!(CompressionLevel::try_from(&invalid).is_err());
}

// ============================================================================
// Wire Format
// ============================================================================

/// Verify the frame starts with the little-endian original length.
#[test]
fn test_frame_starts_with_little_endian_length() {
    let content = vec![b'a'; 300];

    let framed = compress(&content, CompressionLevel::default()).unwrap();

    assert_eq!(&framed[..4], &300u32.to_le_bytes());
    // gzip magic follows the prefix
    assert_eq!(&framed[4..6], &[0x1f, 0x8b]);
}

#[test]
fn test_round_trip_across_levels() {
    let repetitive: Vec<u8> = b"message-runtime ".repeat(1000);
    let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    for level in [0, 1, 6, 9] {
        let level = CompressionLevel::new(level).unwrap();
        for content in [&b""[..], &b"x"[..], &repetitive[..], &binary[..]] {
            let framed = compress(content, level).unwrap();
            assert_eq!(decompress(&framed).unwrap(), Bytes::copy_from_slice(content));
        }
    }
}

#[test]
fn test_repetitive_content_shrinks() {
    let content = b"abcd".repeat(10_000);

    let framed = compress(&content, CompressionLevel::BEST).unwrap();

    assert!(framed.len() < content.len() / 10);
}

#[test]
fn test_decompress_rejects_short_input() {
    assert!(decompress(b"").is_none());
    assert!(decompress(b"abc").is_none());
}

#[test]
fn test_decompress_rejects_non_gzip_body() {
    assert!(decompress(b"\x05\x00\x00\x00hello").is_none());
}

#[test]
fn test_decompress_rejects_length_mismatch() {
    let mut framed = compress(b"hello", CompressionLevel::default())
        .unwrap()
        .to_vec();
    framed[..4].copy_from_slice(&4u32.to_le_bytes());
    assert!(decompress(&framed).is_none());

    framed[..4].copy_from_slice(&6u32.to_le_bytes());
    assert!(decompress(&framed).is_none());
}

#[test]
fn test_decompress_rejects_truncated_stream() {
    let framed = compress(&b"hello world ".repeat(100), CompressionLevel::default()).unwrap();
    assert!(decompress(&framed[..framed.len() / 2]).is_none());
}

// ============================================================================
// Publisher
// ============================================================================

/// Verify the publisher forwards compressed content with untouched metadata.
#[tokio::test]
async fn test_publisher_compresses_content_only() {
    let recorder = Arc::new(RecordingPublisher::default());
    let publisher = GzipPublisher::new(recorder.clone(), CompressionLevel::default());

    let original = Message::new("payload")
        .with_id("m-1")
        .with_partition_id("p")
        .with_property("content-type", "text/plain")
        .with_system_property("lock", "token");
    publisher.send(vec![original.clone()]).await.unwrap();

    let batches = recorder.batches();
    assert_eq!(batches.len(), 1);
    let sent = &batches[0][0];
    assert_ne!(sent.content(), original.content());
    assert_eq!(decompress(sent.content()).unwrap(), Bytes::from("payload"));
    assert_eq!(sent.id(), Some("m-1"));
    assert_eq!(sent.partition_id(), Some("p"));
    assert_eq!(sent.properties(), original.properties());
    assert_eq!(sent.system_properties(), original.system_properties());
}

/// Verify a failed subset is reported as the messages the caller sent, so
/// sending it again through the same publisher compresses it only once.
#[tokio::test]
async fn test_publisher_reports_uncompressed_failed_subset() {
    let transport = Arc::new(PartiallyFailingPublisher::failing(vec![1]));
    let publisher = GzipPublisher::new(transport.clone(), CompressionLevel::default());

    let messages = vec![
        Message::new("first").with_id("1"),
        Message::new("hello").with_id("2"),
    ];
    let error = publisher.send(messages.clone()).await.unwrap_err();

    assert!(matches!(error, MessagingError::PublishFailed { .. }));
    assert_eq!(error.failed_messages(), &messages[1..]);

    let retry = Arc::new(RecordingPublisher::default());
    GzipPublisher::new(retry.clone(), CompressionLevel::default())
        .send(error.failed_messages().to_vec())
        .await
        .unwrap();
    let resent = &retry.batches()[0][0];
    assert_eq!(decompress(resent.content()).unwrap(), Bytes::from("hello"));
}

#[tokio::test]
async fn test_publisher_preserves_batch_order() {
    let recorder = Arc::new(RecordingPublisher::default());
    let publisher = GzipPublisher::new(recorder.clone(), CompressionLevel::FASTEST);

    let messages: Vec<Message> = (0..10).map(|i| Message::new(format!("m{}", i))).collect();
    publisher.send(messages).await.unwrap();

    let decoded: Vec<Bytes> = recorder.batches()[0]
        .iter()
        .map(|m| decompress(m.content()).unwrap())
        .collect();
    let expected: Vec<Bytes> = (0..10).map(|i| Bytes::from(format!("m{}", i))).collect();
    assert_eq!(decoded, expected);
}

// ============================================================================
// Receiver
// ============================================================================

/// Verify compressed content is decoded and anything else passes through.
#[tokio::test]
async fn test_receiver_decodes_and_passes_through() {
    let broker = Arc::new(InMemoryBroker::default());
    let receiver = Arc::new(GzipReceiver::new(broker.clone()));
    let cancel = CancellationToken::new();
    let mut rx = listen_into_channel(receiver, &cancel);
    wait_for_listeners(&broker, 1).await;

    let compressed = compress(b"compressed body", CompressionLevel::default()).unwrap();
    let mut corrupted = compressed.to_vec();
    // Break the gzip magic
    corrupted[4] ^= 0xff;
    broker
        .send(vec![
            Message::new(compressed).with_id("a"),
            Message::new("plain text").with_id("b"),
            Message::new(corrupted.clone()).with_id("c"),
        ])
        .await
        .unwrap();

    let batch = next_batch(&mut rx).await;
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0].content(), &Bytes::from("compressed body"));
    assert_eq!(batch[0].id(), Some("a"));
    assert_eq!(batch[1].content(), &Bytes::from("plain text"));
    assert_eq!(batch[2].content(), &Bytes::from(corrupted));
    cancel.cancel();
}

#[tokio::test]
async fn test_receiver_forwards_message_count() {
    let broker = Arc::new(InMemoryBroker::default());
    broker.send(vec![Message::new("x")]).await.unwrap();

    let receiver = GzipReceiver::new(broker);
    assert_eq!(receiver.message_count().await.unwrap(), 1);
}
