//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::orders::{AssignmentCoordinator, OrderService};
use crate::utils::{AppError, AppResult};
use shared::models::order::{CreateOrderRequest, Order, OrderStatus};
use shared::models::user::Role;

/// Query params for listing orders
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Status transition request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub agent_id: Option<String>,
}

/// Create a new order (customer checkout)
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    if user.role == Role::DeliveryAgent {
        return Err(AppError::forbidden("Delivery agents cannot place orders"));
    }

    let service = OrderService::from_state(&state);
    let order = service.create_order(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List orders
///
/// 管理员看全量（可按状态过滤，回填工具用 `?status=DELIVERED`）；
/// 顾客只看自己的订单。
pub async fn list(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let service = OrderService::from_state(&state);

    let orders = match user.role {
        Role::Admin => {
            service
                .list_orders(query.status, query.limit, query.offset)
                .await?
        }
        Role::Customer => service.list_for_customer(&user.id).await?,
        Role::DeliveryAgent => {
            return Err(AppError::forbidden("Agents receive orders via assignment"));
        }
    };
    Ok(Json(orders))
}

/// Get order by id (order parties and admins only)
pub async fn get_by_id(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let service = OrderService::from_state(&state);
    let order = service.get_order(&id).await?;
    ensure_party(&user, &order)?;
    Ok(Json(order))
}

/// Apply a lifecycle transition
///
/// `{status: "ASSIGNED", agent_id}` 走分配协调器；其余目标状态直接
/// 交给状态机。非法流转返回 409。
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    let service = OrderService::from_state(&state);

    authorize_transition(&service, &user, &id, payload.status).await?;

    if payload.status == OrderStatus::Assigned {
        let agent_id = payload
            .agent_id
            .ok_or_else(|| AppError::validation("agent_id is required for assignment"))?;
        let coordinator = AssignmentCoordinator::new(service);
        let order = coordinator.assign(&id, &agent_id, &user).await?;
        return Ok(Json(order));
    }

    let order = service.transition(&id, payload.status).await?;
    Ok(Json(order))
}

/// Record payment settlement (online confirmation / COD collection)
pub async fn record_payment(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let service = OrderService::from_state(&state);

    // 收款人：管理员（在线支付确认）或该订单的骑手（COD 当面收款）
    if user.role != Role::Admin {
        let order = service.get_order(&id).await?;
        if order.delivery_agent.as_deref() != Some(user.id.as_str()) {
            return Err(AppError::forbidden(
                "Only the assigned agent may collect payment",
            ));
        }
    }

    let order = service.record_payment(&id).await?;
    Ok(Json(order))
}

/// 订单可见性：管理员、下单顾客、已分配骑手
fn ensure_party(user: &CurrentUser, order: &Order) -> AppResult<()> {
    let allowed = user.is_admin()
        || order.customer_id == user.id
        || order.delivery_agent.as_deref() == Some(user.id.as_str());
    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden("Not a party to this order"))
    }
}

/// 按角色限定可请求的目标状态
///
/// - 管理员：任意目标
/// - 骑手：自己订单的配送侧流转（取货、送达、COD 等待收款）
/// - 顾客：只能取消自己的订单
async fn authorize_transition(
    service: &OrderService,
    user: &CurrentUser,
    order_id: &str,
    target: OrderStatus,
) -> AppResult<()> {
    if user.is_admin() {
        return Ok(());
    }

    let order = service.get_order(order_id).await?;
    match user.role {
        Role::DeliveryAgent => {
            if order.delivery_agent.as_deref() != Some(user.id.as_str()) {
                return Err(AppError::forbidden("Order is not assigned to you"));
            }
            match target {
                OrderStatus::OutForDelivery
                | OrderStatus::AwaitingPayment
                | OrderStatus::Delivered => Ok(()),
                _ => Err(AppError::forbidden("Agents cannot apply this transition")),
            }
        }
        Role::Customer => {
            if order.customer_id != user.id {
                return Err(AppError::forbidden("Not your order"));
            }
            if target == OrderStatus::Cancelled {
                Ok(())
            } else {
                Err(AppError::forbidden("Customers may only cancel"))
            }
        }
        Role::Admin => Ok(()),
    }
}
