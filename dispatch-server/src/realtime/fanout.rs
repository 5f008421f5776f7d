//! Event Fan-out
//!
//! 领域事件 → 受众解析 → 逐会话推送。
//!
//! 投递语义：fire-and-forget、至多一次。失败（会话已断开、通道
//! 已满、序列化异常）只记日志并吞掉——REST 调用的成功与通知投递
//! 无关，掉线的客户端靠下一次 REST 拉取兜底。

use std::collections::HashSet;
use std::sync::Arc;

use shared::event::{Audience, DomainEvent};
use shared::models::user::Role;

use super::registry::SessionRegistry;
use super::sink::SessionSink;

/// 事件扇出器
///
/// 持有注册表与推送 seam 的共享引用；自身无状态，可随处克隆。
#[derive(Clone)]
pub struct EventFanout {
    registry: Arc<SessionRegistry>,
    sink: Arc<dyn SessionSink>,
}

impl EventFanout {
    pub fn new(registry: Arc<SessionRegistry>, sink: Arc<dyn SessionSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 受众 → 目标会话集合
    ///
    /// `OrderParties` 是派生集合：所有在线管理员 + 已分配骑手 + 顾客。
    fn resolve(&self, audience: &Audience) -> Vec<String> {
        match audience {
            Audience::User(user_id) => self.registry.sessions_for(user_id),
            Audience::Role(role) => self.registry.sessions_for_role(*role),
            Audience::OrderParties {
                customer_id,
                agent_id,
            } => {
                let mut sessions: HashSet<String> =
                    self.registry.sessions_for(customer_id).into_iter().collect();
                if let Some(agent) = agent_id {
                    sessions.extend(self.registry.sessions_for(agent));
                }
                sessions.extend(self.registry.sessions_for_role(Role::Admin));
                sessions.into_iter().collect()
            }
        }
    }

    /// 推送一个领域事件给受众的所有在线会话
    ///
    /// 永不返回错误；投递失败不影响调用方。
    pub async fn publish(&self, event: &DomainEvent, audience: Audience) {
        let sessions = self.resolve(&audience);
        if sessions.is_empty() {
            tracing::debug!(event = event.name(), "Fan-out: no live sessions for audience");
            return;
        }

        let payload = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "Fan-out: payload serialization failed");
                return;
            }
        };

        // 并发推送；单个失败不影响其他目标
        let pushes = sessions
            .iter()
            .map(|session_id| self.sink.send(session_id, event.name(), &payload));
        let mut delivered = 0usize;
        for (session_id, result) in sessions.iter().zip(futures::future::join_all(pushes).await) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        event = event.name(),
                        session_id = %session_id,
                        error = %e,
                        "Fan-out: push dropped"
                    );
                }
            }
        }

        tracing::debug!(
            event = event.name(),
            targets = sessions.len(),
            delivered,
            "Fan-out complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::sink::MemorySink;
    use shared::event::{AgentStatusPayload, OrderStatusPayload};
    use shared::models::order::OrderStatus;

    fn status_event() -> DomainEvent {
        DomainEvent::OrderStatusChanged(OrderStatusPayload {
            order_id: "order:o1".into(),
            timestamp: 1,
            order_number: "ORD-1".into(),
            status: OrderStatus::Confirmed,
            previous_status: Some(OrderStatus::Pending),
        })
    }

    #[tokio::test]
    async fn test_order_parties_fanout() {
        let registry = Arc::new(SessionRegistry::new());
        let sink = Arc::new(MemorySink::new());

        let mut customer_rx = sink.attach("s-customer");
        let mut agent_rx = sink.attach("s-agent");
        let mut admin_rx = sink.attach("s-admin");
        let mut other_rx = sink.attach("s-other");

        registry.register("s-customer", "user:c1", Role::Customer);
        registry.register("s-agent", "user:a1", Role::DeliveryAgent);
        registry.register("s-admin", "user:adm", Role::Admin);
        registry.register("s-other", "user:c2", Role::Customer);

        let fanout = EventFanout::new(registry, sink.clone());
        fanout
            .publish(
                &status_event(),
                Audience::OrderParties {
                    customer_id: "user:c1".into(),
                    agent_id: Some("user:a1".into()),
                },
            )
            .await;

        assert_eq!(customer_rx.recv().await.unwrap().event, "order:status:update");
        assert_eq!(agent_rx.recv().await.unwrap().event, "order:status:update");
        assert_eq!(admin_rx.recv().await.unwrap().event, "order:status:update");
        // Unrelated customer sees nothing
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multi_device_user_receives_on_all_sessions() {
        let registry = Arc::new(SessionRegistry::new());
        let sink = Arc::new(MemorySink::new());
        let mut phone_rx = sink.attach("s-phone");
        let mut tablet_rx = sink.attach("s-tablet");

        registry.register("s-phone", "user:c1", Role::Customer);
        registry.register("s-tablet", "user:c1", Role::Customer);

        let fanout = EventFanout::new(registry, sink.clone());
        fanout
            .publish(&status_event(), Audience::User("user:c1".into()))
            .await;

        assert!(phone_rx.recv().await.is_some());
        assert!(tablet_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_disconnected_target_is_silently_skipped() {
        let registry = Arc::new(SessionRegistry::new());
        let sink = Arc::new(MemorySink::new());

        // Registered but never attached to the sink: push fails, publish survives
        registry.register("s-gone", "user:adm", Role::Admin);

        let fanout = EventFanout::new(registry, sink.clone());
        fanout
            .publish(
                &DomainEvent::AgentStatusChanged(AgentStatusPayload {
                    agent_id: "user:a1".into(),
                    timestamp: 1,
                    is_online: false,
                }),
                Audience::Role(Role::Admin),
            )
            .await;
    }
}
