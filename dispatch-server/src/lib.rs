//! Pelican Dispatch Server - 外卖配送平台后端
//!
//! # 架构概述
//!
//! 本模块是 Dispatch Server 的主入口，提供以下核心功能：
//!
//! - **订单状态机** (`orders`): 生命周期流转的唯一裁决点
//! - **实时通道** (`realtime`): Socket.IO 会话注册表 + 事件扇出
//! - **骑手分配** (`orders::assignment`): 确认订单 → 在线骑手
//! - **销售汇总** (`analytics`): 幂等的送达订单汇总与回填
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储
//! - **认证** (`auth`): JWT + Argon2 认证体系
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! dispatch-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # JWT 认证
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 数据库层
//! ├── orders/        # 订单域（状态机、金额、分配）
//! ├── realtime/      # 会话注册表与事件扇出
//! ├── analytics/     # 销售汇总
//! └── utils/         # 工具函数
//! ```

pub mod analytics;
pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod orders;
pub mod realtime;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::{AssignmentCoordinator, OrderError, OrderService};
pub use realtime::{EventFanout, MemorySink, SessionRegistry, SessionSink};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置进程环境 (dotenv + 日志)
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logger();
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____       ___
   / __ \___  / (_)________ _____
  / /_/ / _ \/ / / ___/ __ `/ __ \
 / ____/  __/ / / /__/ /_/ / / / /
/_/    \___/_/_/\___/\__,_/_/ /_/
    ____  _                  __       __
   / __ \(_)________  ____ _/ /______/ /_
  / / / / / ___/ __ \/ __ `/ __/ ___/ __ \
 / /_/ / (__  ) /_/ / /_/ / /_/ /__/ / / /
/_____/_/____/ .___/\__,_/\__/\___/_/ /_/
            /_/
    "#
    );
}
