//! 订单状态机
//!
//! 平台上唯一允许决定状态流转的地方。路由处理函数和服务层都不得
//! 自行判断状态——它们把当前快照交给 [`plan_transition`]，拿到一个
//! [`TransitionPlan`] 后按计划原子落库。
//!
//! 允许的边：
//!
//! ```text
//! PENDING → CONFIRMED → ASSIGNED → OUT_FOR_DELIVERY ─┬─→ DELIVERED
//!                                                    └─→ AWAITING_PAYMENT → DELIVERED
//! 任意非终态 → CANCELLED
//! ```
//!
//! 规则：
//! - 终态（DELIVERED / CANCELLED）拒绝一切流转
//! - ASSIGNED 必须携带骑手
//! - COD 未收款时请求 DELIVERED 会被改道到 AWAITING_PAYMENT
//! - 每次接受的流转盖对应时间戳；取消清空骑手引用

use shared::models::order::{OrderStatus, PaymentInfo, PaymentMethod};

use super::error::{OrderError, OrderResult};

/// 一次已通过校验的流转计划
///
/// 由仓储层作为单次条件更新原子应用；失败不产生任何部分效果。
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    /// 实际落库的新状态（可能与请求的目标不同，见 COD 改道）
    pub status: OrderStatus,
    /// 本次流转要盖章的时间戳字段
    pub timestamp_field: Option<&'static str>,
    /// 要写入的骑手引用（仅分配时）
    pub set_agent: Option<String>,
    /// 清空骑手引用（仅取消时）
    pub clear_agent: bool,
}

impl TransitionPlan {
    fn simple(status: OrderStatus, timestamp_field: Option<&'static str>) -> Self {
        Self {
            status,
            timestamp_field,
            set_agent: None,
            clear_agent: false,
        }
    }
}

/// 校验并规划一次状态流转
///
/// 纯函数：只读取订单快照（当前状态 + 支付信息），不做任何 I/O。
pub fn plan_transition(
    current: OrderStatus,
    payment: &PaymentInfo,
    target: OrderStatus,
    agent_id: Option<&str>,
) -> OrderResult<TransitionPlan> {
    if current.is_terminal() {
        return Err(OrderError::TerminalState(current));
    }

    // 取消：任意非终态可达
    if target == OrderStatus::Cancelled {
        return Ok(TransitionPlan {
            status: OrderStatus::Cancelled,
            timestamp_field: Some("cancelled_at"),
            set_agent: None,
            clear_agent: true,
        });
    }

    match (current, target) {
        (OrderStatus::Pending, OrderStatus::Confirmed) => {
            Ok(TransitionPlan::simple(OrderStatus::Confirmed, Some("confirmed_at")))
        }

        (OrderStatus::Confirmed, OrderStatus::Assigned) => {
            let agent = agent_id.ok_or_else(|| {
                OrderError::Validation("agent_id is required for assignment".to_string())
            })?;
            Ok(TransitionPlan {
                status: OrderStatus::Assigned,
                timestamp_field: Some("assigned_at"),
                set_agent: Some(agent.to_string()),
                clear_agent: false,
            })
        }

        (OrderStatus::Assigned, OrderStatus::OutForDelivery) => Ok(TransitionPlan::simple(
            OrderStatus::OutForDelivery,
            Some("picked_up_at"),
        )),

        (OrderStatus::OutForDelivery, OrderStatus::Delivered) => {
            if payment.is_settled() {
                Ok(TransitionPlan::simple(
                    OrderStatus::Delivered,
                    Some("delivered_at"),
                ))
            } else if payment.method == PaymentMethod::Cod {
                // COD 未收款：改道等待收款，而不是报错
                Ok(TransitionPlan::simple(OrderStatus::AwaitingPayment, None))
            } else {
                Err(OrderError::InvalidTransition {
                    from: current,
                    to: target,
                })
            }
        }

        (OrderStatus::OutForDelivery, OrderStatus::AwaitingPayment) => {
            if payment.method == PaymentMethod::Cod && !payment.is_settled() {
                Ok(TransitionPlan::simple(OrderStatus::AwaitingPayment, None))
            } else {
                Err(OrderError::InvalidTransition {
                    from: current,
                    to: target,
                })
            }
        }

        (OrderStatus::AwaitingPayment, OrderStatus::Delivered) => {
            if payment.is_settled() {
                Ok(TransitionPlan::simple(
                    OrderStatus::Delivered,
                    Some("delivered_at"),
                ))
            } else {
                Err(OrderError::InvalidTransition {
                    from: current,
                    to: target,
                })
            }
        }

        (from, to) => Err(OrderError::InvalidTransition { from, to }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::order::PaymentStatus;

    fn cod_pending() -> PaymentInfo {
        PaymentInfo {
            method: PaymentMethod::Cod,
            status: PaymentStatus::Pending,
            paid_at: None,
        }
    }

    fn paid(method: PaymentMethod) -> PaymentInfo {
        PaymentInfo {
            method,
            status: PaymentStatus::Paid,
            paid_at: Some(1),
        }
    }

    #[test]
    fn test_happy_path_edges() {
        let pay = paid(PaymentMethod::Online);
        let steps = [
            (OrderStatus::Pending, OrderStatus::Confirmed, "confirmed_at"),
            (OrderStatus::Assigned, OrderStatus::OutForDelivery, "picked_up_at"),
            (OrderStatus::OutForDelivery, OrderStatus::Delivered, "delivered_at"),
        ];
        for (from, to, field) in steps {
            let plan = plan_transition(from, &pay, to, None).unwrap();
            assert_eq!(plan.status, to);
            assert_eq!(plan.timestamp_field, Some(field));
        }
    }

    #[test]
    fn test_assignment_requires_agent() {
        let err = plan_transition(
            OrderStatus::Confirmed,
            &cod_pending(),
            OrderStatus::Assigned,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        let plan = plan_transition(
            OrderStatus::Confirmed,
            &cod_pending(),
            OrderStatus::Assigned,
            Some("user:agent1"),
        )
        .unwrap();
        assert_eq!(plan.set_agent.as_deref(), Some("user:agent1"));
        assert_eq!(plan.timestamp_field, Some("assigned_at"));
    }

    #[test]
    fn test_skipping_states_rejected() {
        // pending -> delivered is not an edge
        let err = plan_transition(
            OrderStatus::Pending,
            &paid(PaymentMethod::Online),
            OrderStatus::Delivered,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for target in [
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Assigned,
                OrderStatus::OutForDelivery,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ] {
                let err = plan_transition(terminal, &cod_pending(), target, None).unwrap_err();
                assert!(matches!(err, OrderError::TerminalState(_)));
            }
        }
    }

    #[test]
    fn test_cod_rerouted_to_awaiting_payment() {
        let plan = plan_transition(
            OrderStatus::OutForDelivery,
            &cod_pending(),
            OrderStatus::Delivered,
            None,
        )
        .unwrap();
        assert_eq!(plan.status, OrderStatus::AwaitingPayment);
        assert_eq!(plan.timestamp_field, None);
    }

    #[test]
    fn test_cod_collected_then_delivered() {
        let plan = plan_transition(
            OrderStatus::AwaitingPayment,
            &paid(PaymentMethod::Cod),
            OrderStatus::Delivered,
            None,
        )
        .unwrap();
        assert_eq!(plan.status, OrderStatus::Delivered);
    }

    #[test]
    fn test_awaiting_payment_requires_settlement() {
        let err = plan_transition(
            OrderStatus::AwaitingPayment,
            &cod_pending(),
            OrderStatus::Delivered,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn test_online_unpaid_cannot_deliver() {
        let unpaid_online = PaymentInfo {
            method: PaymentMethod::Online,
            status: PaymentStatus::Pending,
            paid_at: None,
        };
        let err = plan_transition(
            OrderStatus::OutForDelivery,
            &unpaid_online,
            OrderStatus::Delivered,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cancel_from_any_nonterminal_clears_agent() {
        for from in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Assigned,
            OrderStatus::OutForDelivery,
            OrderStatus::AwaitingPayment,
        ] {
            let plan =
                plan_transition(from, &cod_pending(), OrderStatus::Cancelled, None).unwrap();
            assert_eq!(plan.status, OrderStatus::Cancelled);
            assert!(plan.clear_agent);
            assert_eq!(plan.timestamp_field, Some("cancelled_at"));
        }
    }
}
