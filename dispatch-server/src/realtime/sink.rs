//! Session push seam
//!
//! [`SessionSink`] abstracts "push one event to one live session" so the
//! fan-out logic is independent of the transport. Two implementations:
//!
//! - [`SocketIoSink`]: the production Socket.IO push
//! - [`MemorySink`]: in-process channels for tests and embedding

use async_trait::async_trait;
use dashmap::DashMap;
use socketioxide::SocketIo;
use thiserror::Error;
use tokio::sync::mpsc;

/// Push failure — always logged and swallowed by the fan-out layer
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Session {0} not reachable")]
    Unreachable(String),

    #[error("Emit failed: {0}")]
    Emit(String),
}

/// One live transport session the server can push to
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn send(
        &self,
        session_id: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError>;
}

// =============================================================================
// Socket.IO
// =============================================================================

/// Production sink pushing over Socket.IO
///
/// Every socket joins a room named after its own session id on connect,
/// so a single-session push is a room emit.
#[derive(Clone)]
pub struct SocketIoSink {
    io: SocketIo,
}

impl SocketIoSink {
    pub fn new(io: SocketIo) -> Self {
        Self { io }
    }
}

#[async_trait]
impl SessionSink for SocketIoSink {
    async fn send(
        &self,
        session_id: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError> {
        self.io
            .to(session_id.to_string())
            .emit(event.to_string(), payload)
            .await
            .map_err(|e| SinkError::Emit(e.to_string()))
    }
}

// =============================================================================
// Memory
// =============================================================================

/// Message captured by [`MemorySink`]
#[derive(Debug, Clone)]
pub struct SinkMessage {
    pub event: String,
    pub payload: serde_json::Value,
}

/// 进程内 sink：每个会话一条无界通道
///
/// 用于测试中对 fan-out 的断言，也可用于同进程嵌入场景。
#[derive(Debug, Default)]
pub struct MemorySink {
    channels: DashMap<String, mpsc::UnboundedSender<SinkMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接入一个会话，返回其接收端
    pub fn attach(&self, session_id: &str) -> mpsc::UnboundedReceiver<SinkMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(session_id.to_string(), tx);
        rx
    }

    pub fn detach(&self, session_id: &str) {
        self.channels.remove(session_id);
    }
}

#[async_trait]
impl SessionSink for MemorySink {
    async fn send(
        &self,
        session_id: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError> {
        let Some(tx) = self.channels.get(session_id) else {
            return Err(SinkError::Unreachable(session_id.to_string()));
        };
        tx.send(SinkMessage {
            event: event.to_string(),
            payload: payload.clone(),
        })
        .map_err(|_| SinkError::Unreachable(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_delivery() {
        let sink = MemorySink::new();
        let mut rx = sink.attach("s1");

        sink.send("s1", "order:new", &serde_json::json!({"order_id": "order:o1"}))
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.event, "order:new");
        assert_eq!(msg.payload["order_id"], "order:o1");
    }

    #[tokio::test]
    async fn test_memory_sink_unknown_session() {
        let sink = MemorySink::new();
        let err = sink
            .send("ghost", "order:new", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Unreachable(_)));
    }
}
