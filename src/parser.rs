//! Protobuf decoding of GTFS-realtime alert and trip update feeds.

use prost::Message;

use crate::error::SchemaError;
use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-realtime [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns [`SchemaError::Protobuf`] if the bytes are not a valid `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, SchemaError> {
    Ok(FeedMessage::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{Alert, FeedEntity, FeedHeader, TranslatedString, translated_string};

    #[test]
    fn test_parse_empty_bytes_returns_default_feed() {
        // Empty input is a valid encoding of a message with every field unset
        let feed = parse_feed(&[]).unwrap();
        assert_eq!(feed.header.gtfs_realtime_version, "");
        assert!(feed.entity.is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        let invalid_bytes = vec![0xFF, 0xFE, 0x00, 0x01];
        assert!(matches!(
            parse_feed(&invalid_bytes),
            Err(SchemaError::Protobuf(_))
        ));
    }

    #[test]
    fn test_parse_alert_feed() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(1234567890),
                incrementality: None,
                feed_version: None,
            },
            entity: vec![FeedEntity {
                id: "a1".to_string(),
                alert: Some(Alert {
                    header_text: Some(TranslatedString {
                        translation: vec![translated_string::Translation {
                            text: "Line 1: No service".to_string(),
                            language: Some("en".to_string()),
                        }],
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }],
        };
        let parsed = parse_feed(&feed.encode_to_vec()).unwrap();

        assert_eq!(parsed.header.timestamp, Some(1234567890));
        assert_eq!(parsed, feed);
    }
}
