use std::sync::Arc;

use socketioxide::layer::SocketIoLayer;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::analytics::BackfillHandle;
use crate::auth::JwtService;
use crate::core::Config;
use crate::db::DbService;
use crate::realtime::{EventFanout, SessionRegistry, SessionSink, SocketIoSink, socket};

/// 服务器状态 - 持有所有服务的共享引用
///
/// ServerState 是核心数据结构，使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | Surreal<Db> | 嵌入式数据库 |
/// | jwt_service | Arc<JwtService> | JWT 认证服务 |
/// | registry | Arc<SessionRegistry> | 实时会话注册表 |
/// | fanout | Arc<EventFanout> | 事件扇出器 |
/// | backfill | Arc<BackfillHandle> | 汇总回填作业句柄 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 嵌入式数据库 (SurrealDB)
    pub db: Surreal<Db>,
    /// JWT 认证服务
    pub jwt_service: Arc<JwtService>,
    /// 实时会话注册表（显式注入，非单例）
    pub registry: Arc<SessionRegistry>,
    /// 事件扇出器
    pub fanout: Arc<EventFanout>,
    /// 汇总回填作业句柄
    pub backfill: Arc<BackfillHandle>,
}

impl ServerState {
    /// 初始化服务器状态（生产路径）
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/pelican.db)
    /// 3. 实时层 (Registry + Socket.IO layer + Fanout)
    /// 4. JWT、回填句柄
    ///
    /// 返回状态与 Socket.IO tower layer（由服务器挂到路由上）。
    ///
    /// # Panics
    ///
    /// 数据库初始化失败时 panic
    pub async fn initialize(config: &Config) -> (Self, SocketIoLayer) {
        config
            .ensure_work_dir_structure()
            .expect("Failed to create work directory structure");

        let db_path = config.database_dir().join("pelican.db");
        let db_service = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");
        let db = db_service.db;

        let registry = Arc::new(SessionRegistry::new());
        let (socket_layer, io) = socket::socket_layer(registry.clone());
        let sink: Arc<dyn SessionSink> = Arc::new(SocketIoSink::new(io));

        let state = Self::with_parts(config.clone(), db, registry, sink);
        (state, socket_layer)
    }

    /// 从既有部件组装状态（测试与嵌入场景）
    pub fn with_parts(
        config: Config,
        db: Surreal<Db>,
        registry: Arc<SessionRegistry>,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        let fanout = Arc::new(EventFanout::new(registry.clone(), sink));
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        Self {
            config,
            db,
            jwt_service,
            registry,
            fanout,
            backfill: Arc::new(BackfillHandle::new()),
        }
    }
}
