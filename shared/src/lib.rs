//! Pelican Shared - 配送平台公共类型库
//!
//! 在 dispatch-server 和各客户端之间共享的类型：
//!
//! - **领域模型** (`models`): 订单、用户、商品
//! - **事件目录** (`event`): 实时通道的封闭事件枚举
//! - **工具函数** (`util`): 时间戳辅助

pub mod event;
pub mod models;
pub mod util;

pub use event::{Audience, DomainEvent};
pub use models::order::{Order, OrderStatus, PaymentMethod, PaymentStatus};
pub use models::user::Role;
