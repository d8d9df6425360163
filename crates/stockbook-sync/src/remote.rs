//! # Remote Authority
//!
//! The reconciler's only view of the backend: `push(batch)` succeeds or
//! fails as a whole.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NetworkReconciler ──► Arc<dyn RemoteAuthority>                         │
//! │                              │                                          │
//! │              ┌───────────────┴───────────────┐                          │
//! │              ▼                               ▼                          │
//! │      SimulatedRemote                  WebSocketRemote                   │
//! │      sleep(round_trip)                connect ─► push ─► push_ack       │
//! │      Ok(())                           one connection per attempt        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{SyncBatch, SyncMessage, PROTOCOL_VERSION};

/// Destination for pending changes.
///
/// `push` must be all-or-nothing from the caller's point of view: `Ok`
/// means every entity in the batch was accepted.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn push(&self, batch: &SyncBatch) -> SyncResult<()>;
}

/// Builds the remote selected by `config`: WebSocket when a remote URL is
/// set, simulated otherwise.
pub fn remote_from_config(config: &SyncConfig) -> SyncResult<Arc<dyn RemoteAuthority>> {
    match config.remote_url() {
        Some(url) => Ok(Arc::new(WebSocketRemote::new(url, config.push_timeout())?)),
        None => Ok(Arc::new(SimulatedRemote::new(config.simulated_round_trip()))),
    }
}

// =============================================================================
// Simulated Remote
// =============================================================================

/// Accepts every batch after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedRemote {
    round_trip: Duration,
}

impl SimulatedRemote {
    pub fn new(round_trip: Duration) -> Self {
        SimulatedRemote { round_trip }
    }
}

#[async_trait]
impl RemoteAuthority for SimulatedRemote {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn push(&self, batch: &SyncBatch) -> SyncResult<()> {
        debug!(batch_id = %batch.batch_id, entities = batch.len(), "Simulating push");
        tokio::time::sleep(self.round_trip).await;
        Ok(())
    }
}

// =============================================================================
// WebSocket Remote
// =============================================================================

/// Pushes each batch over a short-lived WebSocket connection.
#[derive(Debug, Clone)]
pub struct WebSocketRemote {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketRemote {
    pub fn new(url: &str, connect_timeout: Duration) -> SyncResult<Self> {
        let parsed = url::Url::parse(url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(SyncError::InvalidUrl(format!(
                "Remote URL must start with ws:// or wss://, got: {}",
                url
            )));
        }
        Ok(WebSocketRemote {
            url: url.to_string(),
            connect_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteAuthority for WebSocketRemote {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn push(&self, batch: &SyncBatch) -> SyncResult<()> {
        let (ws_stream, response) = match timeout(self.connect_timeout, connect_async(&self.url)).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return Err(SyncError::from(e)),
            Err(_) => return Err(SyncError::Timeout(self.connect_timeout)),
        };
        debug!(status = ?response.status(), url = %self.url, "WebSocket handshake complete");

        let (mut write, mut read) = ws_stream.split();
        let json = SyncMessage::Push(batch.clone()).to_json()?;
        write.send(WsMessage::Text(json.into())).await?;
        debug!(batch_id = %batch.batch_id, entities = batch.len(), "Push sent");

        let outcome = loop {
            let Some(frame) = read.next().await else {
                break Err(SyncError::Disconnected);
            };

            match frame? {
                WsMessage::Text(text) => match SyncMessage::from_json(&text) {
                    Ok(SyncMessage::PushAck(ack)) if ack.batch_id == batch.batch_id => {
                        if ack.accepted {
                            info!(batch_id = %ack.batch_id, "Push acknowledged");
                            break Ok(());
                        }
                        break Err(SyncError::Rejected {
                            batch_id: ack.batch_id,
                            reason: ack.reason.unwrap_or_else(|| "no reason given".to_string()),
                        });
                    }
                    Ok(SyncMessage::PushAck(ack)) => {
                        warn!(expected = %batch.batch_id, got = %ack.batch_id, "Ack for another batch");
                    }
                    Ok(SyncMessage::Ping { timestamp }) => {
                        let pong = SyncMessage::pong(&timestamp).to_json()?;
                        write.send(WsMessage::Text(pong.into())).await?;
                    }
                    Ok(SyncMessage::Error { code, message }) => {
                        if code == "VERSION_MISMATCH" {
                            break Err(SyncError::UnsupportedVersion(PROTOCOL_VERSION));
                        }
                        break Err(SyncError::InvalidMessage(format!("{}: {}", code, message)));
                    }
                    Ok(other) => {
                        break Err(SyncError::UnexpectedMessageType {
                            expected: "push_ack".to_string(),
                            actual: other.type_name().to_string(),
                        });
                    }
                    Err(e) => {
                        warn!(?e, "Failed to parse message");
                    }
                },
                WsMessage::Ping(data) => {
                    write.send(WsMessage::Pong(data)).await?;
                }
                WsMessage::Close(frame) => {
                    info!(?frame, "Remote closed connection before ack");
                    break Err(SyncError::Disconnected);
                }
                _ => {}
            }
        };

        let _ = write.send(WsMessage::Close(None)).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_db::PendingItems;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::accept_async;

    /// Accepts one connection, answers a ping first, then replies to the
    /// push with `verdict`. Resolves to whether the client answered the
    /// ping with a pong.
    async fn loopback_remote(
        verdict: fn(&SyncBatch) -> SyncMessage,
    ) -> (String, JoinHandle<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let batch = match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => match SyncMessage::from_json(&text).unwrap() {
                    SyncMessage::Push(batch) => batch,
                    other => panic!("Expected push, got {}", other.type_name()),
                },
                other => panic!("Expected a text frame, got {other:?}"),
            };

            let ping = SyncMessage::ping().to_json().unwrap();
            ws.send(WsMessage::Text(ping.into())).await.unwrap();
            let ponged = matches!(
                ws.next().await,
                Some(Ok(WsMessage::Text(text)))
                    if matches!(SyncMessage::from_json(&text), Ok(SyncMessage::Pong { .. }))
            );

            let reply = verdict(&batch).to_json().unwrap();
            ws.send(WsMessage::Text(reply.into())).await.unwrap();

            // Drain until the client closes
            while let Some(Ok(frame)) = ws.next().await {
                if frame.is_close() {
                    break;
                }
            }
            ponged
        });

        (url, server)
    }

    #[tokio::test]
    async fn test_simulated_remote_accepts() {
        let remote = SimulatedRemote::new(Duration::from_millis(5));
        let batch = SyncBatch::from_pending("caja-1", PendingItems::default());
        assert!(remote.push(&batch).await.is_ok());
        assert_eq!(remote.name(), "simulated");
    }

    #[test]
    fn test_websocket_remote_rejects_http_url() {
        assert!(WebSocketRemote::new("http://example.com", Duration::from_secs(1)).is_err());
        assert!(WebSocketRemote::new("not a url", Duration::from_secs(1)).is_err());
        let remote = WebSocketRemote::new("wss://sync.example.com/push", Duration::from_secs(1)).unwrap();
        assert_eq!(remote.url(), "wss://sync.example.com/push");
    }

    #[test]
    fn test_remote_from_config() {
        let mut config = SyncConfig::default();
        assert_eq!(remote_from_config(&config).unwrap().name(), "simulated");

        config.sync.remote_url = Some("ws://localhost:9000".to_string());
        assert_eq!(remote_from_config(&config).unwrap().name(), "websocket");
    }

    #[tokio::test]
    async fn test_websocket_push_unreachable_fails() {
        // Port 9 (discard) on localhost is closed in test environments
        let remote = WebSocketRemote::new("ws://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let batch = SyncBatch::from_pending("caja-1", PendingItems::default());
        let err = remote.push(&batch).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_websocket_push_accepted() {
        let (url, server) = loopback_remote(|batch| SyncMessage::ack(&batch.batch_id)).await;
        let remote = WebSocketRemote::new(&url, Duration::from_secs(2)).unwrap();
        let batch = SyncBatch::from_pending("caja-1", PendingItems::default());

        assert!(remote.push(&batch).await.is_ok());
        assert!(server.await.unwrap(), "client never answered the ping");
    }

    #[tokio::test]
    async fn test_websocket_push_rejected() {
        let (url, server) =
            loopback_remote(|batch| SyncMessage::reject(&batch.batch_id, "read-only window")).await;
        let remote = WebSocketRemote::new(&url, Duration::from_secs(2)).unwrap();
        let batch = SyncBatch::from_pending("caja-1", PendingItems::default());

        match remote.push(&batch).await {
            Err(SyncError::Rejected { batch_id, reason }) => {
                assert_eq!(batch_id, batch.batch_id);
                assert_eq!(reason, "read-only window");
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }
        server.await.unwrap();
    }
}
