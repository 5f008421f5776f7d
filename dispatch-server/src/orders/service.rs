//! Order Service
//!
//! 订单创建、状态流转与支付的编排：读取快照 → 状态机校验 →
//! 单次条件更新落库 → 事件扇出 →（送达时）触发汇总。事件与汇总
//! 都发生在流转成功之后；条件更新失败时不产生任何副作用。

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::analytics::AnalyticsReconciler;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::OrderRecord;
use crate::db::repository::{OrderRepository, ProductRepository, UserRepository};
use crate::realtime::EventFanout;
use shared::event::{
    Audience, DomainEvent, OrderCreatedPayload, OrderStatusPayload, PaymentPayload,
};
use shared::models::order::{
    CreateOrderRequest, Order, OrderItem, OrderStatus, PaymentInfo, PaymentStatus,
};
use shared::models::user::Role;
use shared::util::now_millis;

use super::error::{OrderError, OrderResult};
use super::lifecycle::{TransitionPlan, plan_transition};
use super::money;

#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    users: UserRepository,
    products: ProductRepository,
    fanout: Arc<EventFanout>,
    reconciler: AnalyticsReconciler,
    tax_rate_percent: f64,
    delivery_fee: f64,
}

impl OrderService {
    pub fn new(
        db: Surreal<Db>,
        fanout: Arc<EventFanout>,
        tax_rate_percent: f64,
        delivery_fee: f64,
    ) -> Self {
        Self {
            orders: OrderRepository::new(db.clone()),
            users: UserRepository::new(db.clone()),
            products: ProductRepository::new(db.clone()),
            fanout,
            reconciler: AnalyticsReconciler::new(db),
            tax_rate_percent,
            delivery_fee,
        }
    }

    pub fn from_state(state: &ServerState) -> Self {
        Self::new(
            state.db.clone(),
            state.fanout.clone(),
            state.config.tax_rate_percent,
            state.config.delivery_fee,
        )
    }

    pub(crate) fn users(&self) -> &UserRepository {
        &self.users
    }

    pub(crate) fn fanout(&self) -> &Arc<EventFanout> {
        &self.fanout
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// 创建订单
    ///
    /// 行金额与总额用 Decimal 计算一次后写死；商品名称与单价在此刻
    /// 快照，之后目录变更不影响已有订单。
    pub async fn create_order(
        &self,
        customer: &CurrentUser,
        req: CreateOrderRequest,
    ) -> OrderResult<Order> {
        use validator::Validate;
        req.validate()
            .map_err(|e| OrderError::Validation(e.to_string()))?;

        let mut items: Vec<OrderItem> = Vec::with_capacity(req.items.len());
        for input in &req.items {
            let product = self
                .products
                .find_by_id(&input.product_id)
                .await?
                .ok_or_else(|| {
                    OrderError::NotFound(format!("Product {} not found", input.product_id))
                })?;
            if !product.is_active {
                return Err(OrderError::Validation(format!(
                    "Product {} is not available",
                    product.name
                )));
            }
            let line_total = money::line_total(product.price, input.quantity)?;
            items.push(OrderItem {
                product_id: product
                    .id
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| input.product_id.clone()),
                name: product.name,
                unit_price: product.price,
                quantity: input.quantity,
                line_total,
            });
        }

        let subtotal: f64 = items.iter().map(|i| i.line_total).sum();
        let tax = match req.tax {
            Some(tax) => tax,
            None => money::tax_from_rate(subtotal, self.tax_rate_percent)?,
        };
        let delivery_fee = req.delivery_fee.unwrap_or(self.delivery_fee);
        let discount = req.discount.unwrap_or(0.0);
        let totals = money::compute_totals(&items, tax, delivery_fee, discount)?;

        let order_number = self.orders.next_order_number().await?;
        let now = now_millis();

        let record = OrderRecord {
            id: None,
            order_number,
            customer_id: customer.id.clone(),
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            delivery_fee: totals.delivery_fee,
            discount: totals.discount,
            total: totals.total,
            delivery_address: req.delivery_address,
            payment: PaymentInfo {
                method: req.payment_method,
                status: PaymentStatus::Pending,
                paid_at: None,
            },
            status: OrderStatus::Pending,
            delivery_agent: None,
            created_at: now,
            confirmed_at: None,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            cancelled_at: None,
            analytics_applied: false,
            version: 1,
        };

        let created = self.orders.create(record).await?;
        let order: Order = created.into();

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = order.total,
            "Order created"
        );

        let event = DomainEvent::OrderCreated(OrderCreatedPayload {
            order_id: order.id.clone(),
            timestamp: order.created_at,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id.clone(),
            total: order.total,
            order: order.clone(),
        });
        self.fanout.publish(&event, Audience::Role(Role::Admin)).await;

        Ok(order)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        Ok(self.load_record(order_id).await?.into())
    }

    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> OrderResult<Vec<Order>> {
        let records = self.orders.list(status, limit, offset).await?;
        Ok(records.into_iter().map(Order::from).collect())
    }

    pub async fn list_for_customer(&self, customer_id: &str) -> OrderResult<Vec<Order>> {
        let records = self.orders.list_for_customer(customer_id).await?;
        Ok(records.into_iter().map(Order::from).collect())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// 应用一次状态流转（分配除外，见 [`AssignmentCoordinator`]）
    ///
    /// [`AssignmentCoordinator`]: super::assignment::AssignmentCoordinator
    pub async fn transition(&self, order_id: &str, target: OrderStatus) -> OrderResult<Order> {
        if target == OrderStatus::Assigned {
            return Err(OrderError::Validation(
                "assignment requires agent_id".to_string(),
            ));
        }

        let rec = self.load_record(order_id).await?;
        let prev_status = rec.status;
        let prev_agent = rec.delivery_agent.clone();

        let plan = plan_transition(rec.status, &rec.payment, target, None)?;
        let updated = self.apply_plan(&rec, &plan).await?;

        self.release_agent_if_terminal(&updated, prev_agent.as_deref())
            .await;
        self.publish_status_change(&updated, prev_status, prev_agent)
            .await;
        self.reconcile_if_delivered(&updated).await;

        Ok(updated.into())
    }

    /// 记录支付完成（在线支付确认 / COD 当面收款）
    ///
    /// COD 收款发生在 AWAITING_PAYMENT 时，随即完成送达流转。
    pub async fn record_payment(&self, order_id: &str) -> OrderResult<Order> {
        let rec = self.load_record(order_id).await?;
        if rec.status.is_terminal() {
            return Err(OrderError::TerminalState(rec.status));
        }
        if rec.payment.is_settled() {
            return Err(OrderError::Validation(
                "Payment already recorded for this order".to_string(),
            ));
        }

        let record_id = rec
            .id
            .clone()
            .ok_or_else(|| OrderError::NotFound(format!("Order {} has no id", order_id)))?;
        let now = now_millis();

        let updated = match self.orders.mark_paid(&record_id, rec.version, now).await? {
            Some(updated) => updated,
            None => return Err(self.classify_missed_update(order_id).await),
        };

        let payload = PaymentPayload {
            order_id: record_id.to_string(),
            timestamp: now,
            order_number: updated.order_number.clone(),
            amount: updated.total,
            method: updated.payment.method,
            status: updated.payment.status,
        };
        self.fanout
            .publish(
                &DomainEvent::PaymentReceived(payload.clone()),
                Audience::Role(Role::Admin),
            )
            .await;
        self.fanout
            .publish(
                &DomainEvent::PaymentStatusChanged(payload),
                Audience::OrderParties {
                    customer_id: updated.customer_id.clone(),
                    agent_id: updated.delivery_agent.clone(),
                },
            )
            .await;

        // COD 当面收款：随即完成送达
        if updated.status == OrderStatus::AwaitingPayment {
            let prev_status = updated.status;
            let prev_agent = updated.delivery_agent.clone();
            let plan = plan_transition(
                updated.status,
                &updated.payment,
                OrderStatus::Delivered,
                None,
            )?;
            let finished = self.apply_plan(&updated, &plan).await?;

            self.release_agent_if_terminal(&finished, prev_agent.as_deref())
                .await;
            self.publish_status_change(&finished, prev_status, prev_agent)
                .await;
            self.reconcile_if_delivered(&finished).await;

            return Ok(finished.into());
        }

        Ok(updated.into())
    }

    // =========================================================================
    // Internals (shared with the assignment coordinator)
    // =========================================================================

    pub(crate) async fn load_record(&self, order_id: &str) -> OrderResult<OrderRecord> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {} not found", order_id)))
    }

    /// 按计划原子落库；未命中时区分并发冲突与记录消失
    pub(crate) async fn apply_plan(
        &self,
        rec: &OrderRecord,
        plan: &TransitionPlan,
    ) -> OrderResult<OrderRecord> {
        let record_id = rec
            .id
            .clone()
            .ok_or_else(|| OrderError::NotFound("Order has no id".to_string()))?;
        let now = now_millis();

        match self
            .orders
            .apply_transition(&record_id, rec.version, plan, now)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    order_id = %record_id,
                    from = %rec.status,
                    to = %updated.status,
                    version = updated.version,
                    "Order transition applied"
                );
                debug_assert!(Order::from(updated.clone()).agent_invariant_holds());
                Ok(updated)
            }
            None => Err(self.classify_missed_update(&record_id.to_string()).await),
        }
    }

    /// 条件更新未命中：记录还在 → 版本过期；记录不在 → NotFound
    async fn classify_missed_update(&self, order_id: &str) -> OrderError {
        match self.orders.find_by_id(order_id).await {
            Ok(Some(_)) => OrderError::ConcurrentModification,
            Ok(None) => OrderError::NotFound(format!("Order {} not found", order_id)),
            Err(e) => OrderError::Repo(e),
        }
    }

    /// 终态释放骑手的在途订单计数
    pub(crate) async fn release_agent_if_terminal(
        &self,
        updated: &OrderRecord,
        prev_agent: Option<&str>,
    ) {
        if !updated.status.is_terminal() {
            return;
        }
        if let Some(agent_id) = prev_agent
            && let Err(e) = self.users.adjust_active_orders(agent_id, -1).await
        {
            tracing::error!(
                agent_id = %agent_id,
                error = %e,
                "Failed to release agent active-order count"
            );
        }
    }

    async fn publish_status_change(
        &self,
        updated: &OrderRecord,
        prev_status: OrderStatus,
        prev_agent: Option<String>,
    ) {
        let order_id = updated
            .id
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default();
        let payload = OrderStatusPayload {
            order_id,
            timestamp: now_millis(),
            order_number: updated.order_number.clone(),
            status: updated.status,
            previous_status: Some(prev_status),
        };
        let event = if updated.status == OrderStatus::Cancelled {
            DomainEvent::OrderCancelled(payload)
        } else {
            DomainEvent::OrderStatusChanged(payload)
        };

        // 取消会清空骑手引用；通知仍要送达原骑手
        let agent_id = prev_agent.or_else(|| updated.delivery_agent.clone());
        self.fanout
            .publish(
                &event,
                Audience::OrderParties {
                    customer_id: updated.customer_id.clone(),
                    agent_id,
                },
            )
            .await;
    }

    /// 送达后同步触发汇总；失败只记日志，不影响调用方
    pub(crate) async fn reconcile_if_delivered(&self, updated: &OrderRecord) {
        if updated.status != OrderStatus::Delivered {
            return;
        }
        let Some(record_id) = updated.id.as_ref() else {
            return;
        };
        if let Err(e) = self.reconciler.reconcile(&record_id.to_string()).await {
            tracing::error!(
                order_id = %record_id,
                error = %e,
                "Analytics reconcile failed after delivery"
            );
        }
    }
}
