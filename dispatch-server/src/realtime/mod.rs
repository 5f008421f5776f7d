//! 实时通道
//!
//! # 架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    EventFanout                        │
//! │   audience ──► SessionRegistry ──► session ids        │
//! │                                      │                │
//! │                              SessionSink Trait  ◄── 可插拔实现
//! │                                      │                │
//! │                    ┌─────────────────┴──────────┐     │
//! │                    ▼                            ▼     │
//! │              SocketIoSink                 MemorySink  │
//! │              (Socket.IO 推送)             (进程内/测试) │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! 投递是 fire-and-forget、至多一次：失败只记日志，REST 调用的
//! 成败与通知投递无关。注册表不持久化，进程重启即清空。

pub mod fanout;
pub mod registry;
pub mod sink;
pub mod socket;

pub use fanout::EventFanout;
pub use registry::{ConnectedSession, SessionRegistry};
pub use sink::{MemorySink, SessionSink, SinkError, SinkMessage, SocketIoSink};
