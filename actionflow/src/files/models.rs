//! Data shapes threaded between upload stages.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status code reported for every successful upload.
pub const UPLOAD_SUCCESS_STATUS: u16 = 200;

/// The bytes of the file being uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSource(Bytes);

impl ByteSource {
    /// Returns the number of bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the source holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the bytes as a cheaply cloneable buffer.
    #[must_use]
    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }
}

impl From<Bytes> for ByteSource {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for ByteSource {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl From<String> for ByteSource {
    fn from(text: String) -> Self {
        Self(Bytes::from(text))
    }
}

/// Identifier and name of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Server-assigned file identifier.
    pub id: String,
    /// File name as stored.
    pub name: String,
}

impl FileDescriptor {
    /// Creates a new file descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A form field that must accompany the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Field name.
    pub key: String,
    /// Field value.
    pub value: String,
}

/// Where and how to transfer the file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDestination {
    /// The file the destination was issued for.
    pub file: FileDescriptor,
    /// Target URL for the transfer.
    pub url: String,
    /// HTTP method the transfer must use.
    #[serde(default = "default_method")]
    pub method: String,
    /// Form fields (credentials, policy) to send with the bytes.
    #[serde(default)]
    pub form_fields: Vec<FormField>,
    /// When the credentials stop being valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_method() -> String {
    "POST".to_string()
}

impl UploadDestination {
    /// Creates a destination with the default method and no form fields.
    #[must_use]
    pub fn new(file: FileDescriptor, url: impl Into<String>) -> Self {
        Self {
            file,
            url: url.into(),
            method: default_method(),
            form_fields: Vec::new(),
            expires_at: None,
        }
    }

    /// Adds a form field.
    #[must_use]
    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_fields.push(FormField {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true if the credentials have expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Everything the transfer executor needs.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Name of the file being transferred.
    pub file_name: String,
    /// The bytes to transfer.
    pub source: ByteSource,
    /// Key the executor encrypts with, if set.
    pub cipher_key: Option<String>,
    /// Destination obtained by the first stage.
    pub destination: UploadDestination,
}

/// The message announcing an uploaded file on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishFileMessage {
    /// Channel to publish on.
    pub channel: String,
    /// The uploaded file.
    pub file: FileDescriptor,
    /// Caller payload sent with the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    /// Caller metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    /// Time-to-live in hours for stored messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Whether the message goes into history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_store: Option<bool>,
}

/// Acknowledgment returned by the publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    /// Ordering token assigned to the published message.
    pub timetoken: i64,
}

/// The result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Timetoken of the announcing message.
    pub timetoken: i64,
    /// Status code; always [`UPLOAD_SUCCESS_STATUS`].
    pub status: u16,
    /// The uploaded file.
    pub file: FileDescriptor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_destination_deserialize_defaults() {
        let json = r#"{"file": {"id": "f1", "name": "cat.png"}, "url": "https://upload.example/bucket"}"#;
        let destination: UploadDestination = serde_json::from_str(json).unwrap();

        assert_eq!(destination.file, FileDescriptor::new("f1", "cat.png"));
        assert_eq!(destination.method, "POST");
        assert!(destination.form_fields.is_empty());
        assert!(destination.expires_at.is_none());
    }

    #[test]
    fn test_destination_expiry() {
        let now = Utc::now();
        let destination = UploadDestination::new(FileDescriptor::new("f1", "a.txt"), "https://x")
            .with_form_field("policy", "abc")
            .with_expiry(now + Duration::minutes(5));

        assert!(!destination.is_expired_at(now));
        assert!(destination.is_expired_at(now + Duration::minutes(5)));
        assert_eq!(destination.form_fields.len(), 1);
    }

    #[test]
    fn test_publish_message_skips_unset_fields() {
        let message = PublishFileMessage {
            channel: "room1".to_string(),
            file: FileDescriptor::new("f1", "cat.png"),
            message: None,
            meta: None,
            ttl: Some(3),
            should_store: None,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"channel": "room1", "file": {"id": "f1", "name": "cat.png"}, "ttl": 3})
        );
    }

    #[test]
    fn test_byte_source_conversions() {
        let source = ByteSource::from(vec![1_u8, 2, 3]);
        assert_eq!(source.len(), 3);
        assert!(ByteSource::from(String::new()).is_empty());
        assert!(ByteSource::from(&b""[..]).is_empty());
    }
}
