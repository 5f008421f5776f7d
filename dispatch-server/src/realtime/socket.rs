//! Socket.IO namespace wiring
//!
//! 客户端建立连接后必须发送 `register {user_id, role}` 宣告身份；
//! 断开连接时只移除该会话自身的映射。

use std::sync::Arc;

use socketioxide::SocketIo;
use socketioxide::extract::{Data, SocketRef, State};
use socketioxide::layer::SocketIoLayer;

use shared::event::RegisterPayload;

use super::registry::SessionRegistry;

/// Build the Socket.IO tower layer and wire the root namespace
pub fn socket_layer(registry: Arc<SessionRegistry>) -> (SocketIoLayer, SocketIo) {
    let (layer, io) = SocketIo::builder().with_state(registry).build_layer();
    io.ns("/", on_connect);
    (layer, io)
}

async fn on_connect(socket: SocketRef) {
    tracing::debug!(session_id = %socket.id, "Realtime session connected");

    // 每个会话加入以自己 sid 命名的房间，单会话推送即房间推送
    let _ = socket.join(socket.id.to_string());

    socket.on("register", handle_register);
    socket.on_disconnect(handle_disconnect);
}

async fn handle_register(
    socket: SocketRef,
    Data(payload): Data<RegisterPayload>,
    State(registry): State<Arc<SessionRegistry>>,
) {
    tracing::info!(
        session_id = %socket.id,
        user_id = %payload.user_id,
        role = %payload.role,
        "Realtime session registered"
    );
    registry.register(&socket.id.to_string(), &payload.user_id, payload.role);

    let ack = serde_json::json!({ "session_id": socket.id.to_string() });
    if let Err(e) = socket.emit("registered", &ack) {
        tracing::debug!(session_id = %socket.id, error = %e, "Register ack dropped");
    }
}

async fn handle_disconnect(socket: SocketRef, State(registry): State<Arc<SessionRegistry>>) {
    registry.unregister(&socket.id.to_string());
    tracing::debug!(session_id = %socket.id, "Realtime session disconnected");
}
