//! # Sync Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  InvalidMessage         │ │
//! │  │  MissingDeviceId│  │  Disconnected   │  │  UnsupportedVersion     │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  SerializationFailed    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │     Remote      │                              │
//! │  │                 │  │                 │                              │
//! │  │  Database       │  │  Rejected       │                              │
//! │  │  (DbError)      │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these reach the user as a blocking error. The reconciler logs
//! them, records the message in its status snapshot, and retries on the
//! next trigger.

use std::time::Duration;

use stockbook_db::DbError;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    #[error("Device ID not configured")]
    MissingDeviceId,

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Disconnected from remote")]
    Disconnected,

    /// The push round trip exceeded the configured bound.
    #[error("Push timed out after {0:?}")]
    Timeout(Duration),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u32),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessageType { expected: String, actual: String },

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The remote authority answered but refused the batch.
    #[error("Remote rejected batch {batch_id}: {reason}")]
    Rejected { batch_id: String, reason: String },

    // =========================================================================
    // Database Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed => SyncError::Disconnected,
            WsError::AlreadyClosed => SyncError::Disconnected,
            WsError::Protocol(p) => SyncError::WebSocketError(p.to_string()),
            WsError::Io(io) => SyncError::ConnectionFailed(io.to_string()),
            WsError::Tls(tls) => SyncError::TlsError(tls.to_string()),
            other => SyncError::WebSocketError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// True if the next trigger may succeed without any change on our side.
    ///
    /// ## Retryable Errors
    /// - Connection failures, disconnections and timeouts
    /// - Batch rejections (the remote may recover)
    /// - Transient storage contention
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_)
            | SyncError::Disconnected
            | SyncError::Timeout(_)
            | SyncError::WebSocketError(_)
            | SyncError::Rejected { .. } => true,
            SyncError::Database(db) => matches!(db, DbError::PoolExhausted | DbError::ConnectionFailed(_)),
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidMessage(_)
                | SyncError::UnsupportedVersion(_)
                | SyncError::SerializationFailed(_)
                | SyncError::UnexpectedMessageType { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Disconnected.is_retryable());
        assert!(SyncError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(SyncError::Database(DbError::PoolExhausted).is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingDeviceId.is_retryable());
        assert!(!SyncError::UnsupportedVersion(99).is_retryable());
        assert!(!SyncError::Database(DbError::not_found("Product", "p1")).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Rejected {
            batch_id: "b-1".into(),
            reason: "quota".into(),
        };
        assert!(err.to_string().contains("b-1"));
        assert!(err.to_string().contains("quota"));
        assert!(SyncError::Timeout(Duration::from_millis(50)).to_string().contains("50ms"));
    }

    /// Exhaustive: a variant with no category fails to compile here.
    fn category(err: &SyncError) -> &'static str {
        match err {
            SyncError::InvalidConfig(_)
            | SyncError::MissingDeviceId
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => "config",
            SyncError::ConnectionFailed(_)
            | SyncError::Disconnected
            | SyncError::Timeout(_)
            | SyncError::TlsError(_)
            | SyncError::WebSocketError(_) => "transport",
            SyncError::InvalidMessage(_)
            | SyncError::UnsupportedVersion(_)
            | SyncError::SerializationFailed(_)
            | SyncError::UnexpectedMessageType { .. } => "protocol",
            SyncError::Rejected { .. } => "remote",
            SyncError::Database(_) => "database",
        }
    }

    #[test]
    fn test_every_variant_is_categorized() {
        let errors = [
            SyncError::InvalidConfig("x".into()),
            SyncError::MissingDeviceId,
            SyncError::InvalidUrl("x".into()),
            SyncError::ConfigLoadFailed("x".into()),
            SyncError::ConfigSaveFailed("x".into()),
            SyncError::ConnectionFailed("x".into()),
            SyncError::Disconnected,
            SyncError::Timeout(Duration::from_secs(1)),
            SyncError::TlsError("x".into()),
            SyncError::WebSocketError("x".into()),
            SyncError::InvalidMessage("x".into()),
            SyncError::UnsupportedVersion(2),
            SyncError::SerializationFailed("x".into()),
            SyncError::UnexpectedMessageType {
                expected: "push_ack".into(),
                actual: "pong".into(),
            },
            SyncError::Rejected {
                batch_id: "b".into(),
                reason: "x".into(),
            },
            SyncError::Database(DbError::PoolExhausted),
        ];

        for err in &errors {
            let category = category(err);
            assert_eq!(err.is_config_error(), category == "config", "{err}");
            assert_eq!(err.is_protocol_error(), category == "protocol", "{err}");
            if category == "transport" && !matches!(err, SyncError::TlsError(_)) {
                assert!(err.is_retryable(), "{err}");
            }
        }
    }
}
