//! # Sync Protocol Messages
//!
//! Wire messages exchanged with a WebSocket remote authority.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Protocol Messages                             │
//! │                                                                         │
//! │  PUSH (device → remote)                                                │
//! │  ──────────────────────                                                │
//! │  device ───► push     { batchId, deviceId, products, transactions,     │
//! │                         multiTransactions }                            │
//! │  device ◄─── push_ack { batchId, accepted, reason? }                   │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  Both   ◄──► ping { timestamp } / pong { pingTimestamp, ... }          │
//! │                                                                         │
//! │  ERROR                                                                 │
//! │  ─────                                                                 │
//! │  Both   ◄──► error { code, message }                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Adjacently tagged JSON:
//! ```json
//! { "type": "push", "payload": { "batchId": "...", "products": [ ... ] } }
//! ```
//! Entity bodies use the same camelCase field names as local storage.

use serde::{Deserialize, Serialize};
use stockbook_core::{MultiTransaction, Product, SyncCollection, Transaction};
use stockbook_db::{PendingItems, VersionSnapshot};
use uuid::Uuid;

pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Sync Batch
// =============================================================================

/// Snapshot of everything pending at the start of a sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatch {
    /// Fresh per attempt; echoed by `push_ack`.
    pub batch_id: String,
    pub device_id: String,
    pub protocol_version: u32,
    /// RFC 3339 creation time.
    pub created_at: String,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub multi_transactions: Vec<MultiTransaction>,
}

impl SyncBatch {
    pub fn from_pending(device_id: &str, pending: PendingItems) -> Self {
        SyncBatch {
            batch_id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            protocol_version: PROTOCOL_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            products: pending.products,
            transactions: pending.transactions,
            multi_transactions: pending.multi_transactions,
        }
    }

    pub fn len(&self) -> usize {
        self.products.len() + self.transactions.len() + self.multi_transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(id, sync_version)` of every row in one collection, as captured.
    pub fn versions(&self, collection: SyncCollection) -> Vec<(String, i64)> {
        match collection {
            SyncCollection::Products => self
                .products
                .iter()
                .map(|p| (p.id.clone(), p.sync_version))
                .collect(),
            SyncCollection::Transactions => self
                .transactions
                .iter()
                .map(|t| (t.id.clone(), t.sync_version))
                .collect(),
            SyncCollection::MultiTransactions => self
                .multi_transactions
                .iter()
                .map(|t| (t.id.clone(), t.sync_version))
                .collect(),
        }
    }

    /// Versions of every row in the batch, for marking it in one step.
    pub fn version_snapshot(&self) -> VersionSnapshot {
        VersionSnapshot {
            products: self.versions(SyncCollection::Products),
            transactions: self.versions(SyncCollection::Transactions),
            multi_transactions: self.versions(SyncCollection::MultiTransactions),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SyncMessage {
    Push(SyncBatch),

    PushAck(PushAck),

    Ping {
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    Pong {
        ping_timestamp: String,
        pong_timestamp: String,
    },

    Error {
        code: String,
        message: String,
    },
}

/// Remote verdict for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAck {
    pub batch_id: String,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SyncMessage {
    /// Message type name (for logging).
    pub fn type_name(&self) -> &'static str {
        match self {
            SyncMessage::Push(_) => "push",
            SyncMessage::PushAck(_) => "push_ack",
            SyncMessage::Ping { .. } => "ping",
            SyncMessage::Pong { .. } => "pong",
            SyncMessage::Error { .. } => "error",
        }
    }

    pub fn ack(batch_id: &str) -> Self {
        SyncMessage::PushAck(PushAck {
            batch_id: batch_id.to_string(),
            accepted: true,
            reason: None,
        })
    }

    pub fn reject(batch_id: &str, reason: &str) -> Self {
        SyncMessage::PushAck(PushAck {
            batch_id: batch_id.to_string(),
            accepted: false,
            reason: Some(reason.to_string()),
        })
    }

    pub fn ping() -> Self {
        SyncMessage::Ping {
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn pong(ping_timestamp: &str) -> Self {
        SyncMessage::Pong {
            ping_timestamp: ping_timestamp.to_string(),
            pong_timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        SyncMessage::Error {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockbook_core::{NewProduct, SyncStatus};

    fn pending() -> PendingItems {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut product = NewProduct {
            name: "Arroz 1kg".to_string(),
            ..Default::default()
        }
        .into_product("p1".to_string(), today);
        product.sync_version = 4;

        PendingItems {
            products: vec![product],
            ..Default::default()
        }
    }

    #[test]
    fn test_push_wire_shape() {
        let batch = SyncBatch::from_pending("caja-1", pending());
        let json = SyncMessage::Push(batch.clone()).to_json().unwrap();

        assert!(json.contains("\"type\":\"push\""));
        assert!(json.contains("\"batchId\""));
        assert!(json.contains("\"multiTransactions\":[]"));
        assert!(json.contains("\"currentStock\""));

        match SyncMessage::from_json(&json).unwrap() {
            SyncMessage::Push(parsed) => {
                assert_eq!(parsed, batch);
                assert_eq!(parsed.products[0].sync_status, SyncStatus::PendingSync);
            }
            other => panic!("Expected push, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_versions_snapshot() {
        let batch = SyncBatch::from_pending("caja-1", pending());
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.versions(SyncCollection::Products),
            vec![("p1".to_string(), 4)]
        );
        assert!(batch.versions(SyncCollection::Transactions).is_empty());

        let snapshot = batch.version_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.products, vec![("p1".to_string(), 4)]);
    }

    #[test]
    fn test_ack_parsing() {
        let json = r#"{"type":"push_ack","payload":{"batchId":"b-1","accepted":false,"reason":"quota"}}"#;
        match SyncMessage::from_json(json).unwrap() {
            SyncMessage::PushAck(ack) => {
                assert_eq!(ack, PushAck {
                    batch_id: "b-1".to_string(),
                    accepted: false,
                    reason: Some("quota".to_string()),
                });
            }
            other => panic!("Expected push_ack, got {}", other.type_name()),
        }

        let ack = SyncMessage::ack("b-2").to_json().unwrap();
        assert!(!ack.contains("reason"));
    }

    #[test]
    fn test_error_message() {
        let error = SyncMessage::error("VERSION_MISMATCH", "Unsupported protocol version");
        let json = error.to_json().unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("VERSION_MISMATCH"));
    }
}
