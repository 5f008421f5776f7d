//! Assignment Coordinator
//!
//! 把一个已确认订单分配给骑手。前置条件集中在这里校验：订单必须
//! 处于 CONFIRMED，骑手必须在线且已审批。流转本身仍然走状态机的
//! 单次条件更新——流转失败时不做计数递增、不发任何通知，对调用方
//! 表现为原子操作。

use crate::auth::CurrentUser;
use shared::event::{Audience, DomainEvent, OrderAssignedPayload};
use shared::models::order::{Order, OrderStatus};
use shared::models::user::Role;
use shared::util::now_millis;

use super::error::{OrderError, OrderResult};
use super::lifecycle::plan_transition;
use super::service::OrderService;

pub struct AssignmentCoordinator {
    service: OrderService,
}

impl AssignmentCoordinator {
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }

    /// 分配骑手
    ///
    /// 错误：
    /// - [`OrderError::AgentUnavailable`] 骑手离线或未审批 (422)
    /// - [`OrderError::OrderNotAssignable`] 订单不在 CONFIRMED (409)
    /// - [`OrderError::NotFound`] 订单/骑手不存在 (404)
    pub async fn assign(
        &self,
        order_id: &str,
        agent_id: &str,
        actor: &CurrentUser,
    ) -> OrderResult<Order> {
        let agent = self
            .service
            .users()
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Agent {} not found", agent_id)))?;

        if agent.role != Role::DeliveryAgent {
            return Err(OrderError::Validation(format!(
                "User {} is not a delivery agent",
                agent_id
            )));
        }
        if !agent.is_assignable() {
            let reason = if !agent.is_online {
                "agent is offline"
            } else {
                "agent is not approved"
            };
            return Err(OrderError::AgentUnavailable(reason.to_string()));
        }

        let rec = self.service.load_record(order_id).await?;
        if rec.status != OrderStatus::Confirmed {
            return Err(OrderError::OrderNotAssignable(rec.status));
        }

        let plan = plan_transition(
            rec.status,
            &rec.payment,
            OrderStatus::Assigned,
            Some(agent_id),
        )?;
        let updated = self.service.apply_plan(&rec, &plan).await?;

        // 计数递增只在流转成功之后
        if let Err(e) = self.service.users().adjust_active_orders(agent_id, 1).await {
            tracing::error!(
                agent_id = %agent_id,
                error = %e,
                "Failed to increment agent active-order count"
            );
        }

        let order_ref = updated
            .id
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default();
        tracing::info!(
            order_id = %order_ref,
            agent_id = %agent_id,
            assigned_by = %actor.id,
            "Order assigned"
        );

        let event = DomainEvent::OrderAssigned(OrderAssignedPayload {
            order_id: order_ref,
            timestamp: now_millis(),
            order_number: updated.order_number.clone(),
            agent_id: agent_id.to_string(),
            customer_id: updated.customer_id.clone(),
        });
        self.service
            .fanout()
            .publish(
                &event,
                Audience::OrderParties {
                    customer_id: updated.customer_id.clone(),
                    agent_id: Some(agent_id.to_string()),
                },
            )
            .await;

        Ok(updated.into())
    }
}
