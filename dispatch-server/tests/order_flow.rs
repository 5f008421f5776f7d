//! End-to-end order lifecycle tests against an in-memory database and
//! an in-process event sink.

use std::sync::Arc;
use std::time::Duration;

use dispatch_server::analytics::{AnalyticsReconciler, ReconcileOutcome};
use dispatch_server::auth::CurrentUser;
use dispatch_server::db::DbService;
use dispatch_server::db::models::{OrderRecord, ProductRecord, UserRecord};
use dispatch_server::db::repository::{OrderRepository, ProductRepository, UserRepository};
use dispatch_server::orders::lifecycle::plan_transition;
use dispatch_server::orders::{AssignmentCoordinator, OrderError, OrderService};
use dispatch_server::realtime::{MemorySink, SessionRegistry, SessionSink, SinkMessage};
use dispatch_server::{Config, ServerState};
use shared::models::order::{
    CreateOrderRequest, DeliveryAddress, Order, OrderItemInput, OrderStatus, PaymentInfo,
    PaymentMethod, PaymentStatus,
};
use shared::models::user::{ApprovalState, Role};
use shared::util::now_millis;
use tokio::sync::mpsc::UnboundedReceiver;

struct TestEnv {
    state: ServerState,
    sink: Arc<MemorySink>,
}

async fn test_env() -> TestEnv {
    let db = DbService::memory().await.expect("memory db").db;
    let registry = Arc::new(SessionRegistry::new());
    let sink = Arc::new(MemorySink::new());
    let state = ServerState::with_parts(
        Config::with_overrides("/tmp/pelican-test", 0),
        db,
        registry,
        sink.clone() as Arc<dyn SessionSink>,
    );
    TestEnv { state, sink }
}

async fn seed_user(state: &ServerState, username: &str, role: Role, online: bool) -> CurrentUser {
    let repo = UserRepository::new(state.db.clone());
    let record = repo
        .create(UserRecord {
            id: None,
            username: username.to_string(),
            password_hash: "unused".to_string(),
            role,
            approval: ApprovalState::Approved,
            rejection_reason: None,
            is_online: online,
            active_order_count: 0,
            created_at: now_millis(),
        })
        .await
        .expect("seed user");
    CurrentUser {
        id: record.id.expect("user id").to_string(),
        username: username.to_string(),
        role,
    }
}

async fn seed_product(state: &ServerState, name: &str, price: f64) -> String {
    let repo = ProductRepository::new(state.db.clone());
    let record = repo
        .create(ProductRecord {
            id: None,
            name: name.to_string(),
            price,
            is_active: true,
            placeholder: false,
        })
        .await
        .expect("seed product");
    record.id.expect("product id").to_string()
}

fn order_request(product_id: &str, quantity: i32, method: PaymentMethod) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![OrderItemInput {
            product_id: product_id.to_string(),
            quantity,
        }],
        delivery_address: DeliveryAddress {
            street: "12 Harbour Lane".to_string(),
            city: "Porto".to_string(),
            postal_code: None,
            phone: None,
        },
        payment_method: method,
        tax: Some(18.0),
        delivery_fee: Some(30.0),
        discount: Some(0.0),
    }
}

fn drain(rx: &mut UnboundedReceiver<SinkMessage>) -> Vec<SinkMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

#[tokio::test]
async fn test_create_order_totals() {
    let env = test_env().await;
    let customer = seed_user(&env.state, "alice", Role::Customer, false).await;
    let product = seed_product(&env.state, "Margherita", 199.0).await;

    let service = OrderService::from_state(&env.state);
    let order = service
        .create_order(&customer, order_request(&product, 2, PaymentMethod::Cod))
        .await
        .expect("create order");

    // 199*2 + 18 + 30 - 0 = 646
    assert_eq!(order.subtotal, 398.0);
    assert_eq!(order.total, 646.0);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.order_number, "ORD-1");
    assert!(order.delivery_agent.is_none());
    assert!(order.agent_invariant_holds());
}

#[tokio::test]
async fn test_full_cod_lifecycle_with_fanout() {
    let env = test_env().await;
    let customer = seed_user(&env.state, "alice", Role::Customer, false).await;
    let agent = seed_user(&env.state, "bob", Role::DeliveryAgent, true).await;
    let admin = seed_user(&env.state, "root", Role::Admin, false).await;
    let product = seed_product(&env.state, "Margherita", 199.0).await;

    // Live sessions for everyone
    let mut customer_rx = env.sink.attach("s-customer");
    let mut agent_rx = env.sink.attach("s-agent");
    let mut admin_rx = env.sink.attach("s-admin");
    env.state.registry.register("s-customer", &customer.id, Role::Customer);
    env.state.registry.register("s-agent", &agent.id, Role::DeliveryAgent);
    env.state.registry.register("s-admin", &admin.id, Role::Admin);

    let service = OrderService::from_state(&env.state);
    let order = service
        .create_order(&customer, order_request(&product, 2, PaymentMethod::Cod))
        .await
        .unwrap();

    // order:new goes to admins only
    let created_events = drain(&mut admin_rx);
    assert_eq!(created_events.len(), 1);
    assert_eq!(created_events[0].event, "order:new");
    assert!(drain(&mut customer_rx).is_empty());

    // Confirm, then assign
    let order = service
        .transition(&order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);

    let coordinator = AssignmentCoordinator::new(OrderService::from_state(&env.state));
    let order = coordinator.assign(&order.id, &agent.id, &admin).await.unwrap();
    assert_eq!(order.status, OrderStatus::Assigned);
    assert_eq!(order.delivery_agent.as_deref(), Some(agent.id.as_str()));
    assert!(order.agent_invariant_holds());

    // Both the agent's and the customer's sessions observe the assignment
    let agent_events = drain(&mut agent_rx);
    assert!(agent_events.iter().any(|m| m.event == "order:assigned"));
    let customer_events = drain(&mut customer_rx);
    assert!(customer_events.iter().any(|m| m.event == "order:assigned"));

    // Agent count incremented
    let users = UserRepository::new(env.state.db.clone());
    let agent_record = users.find_by_id(&agent.id).await.unwrap().unwrap();
    assert_eq!(agent_record.active_order_count, 1);

    // Pickup; requesting delivery on unpaid COD re-routes to AWAITING_PAYMENT
    let order = service
        .transition(&order.id, OrderStatus::OutForDelivery)
        .await
        .unwrap();
    let order = service
        .transition(&order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::AwaitingPayment);
    assert!(order.delivered_at.is_none());
    assert!(order.agent_invariant_holds());

    // Collecting the cash completes delivery
    let order = service.record_payment(&order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.payment.status, PaymentStatus::Paid);
    assert!(order.delivered_at.is_some());
    assert!(order.agent_invariant_holds());

    // Agent released
    let agent_record = users.find_by_id(&agent.id).await.unwrap().unwrap();
    assert_eq!(agent_record.active_order_count, 0);

    // Aggregates reflect the delivered order exactly once
    let products = ProductRepository::new(env.state.db.clone());
    let aggregate = products.find_aggregate(&product).await.unwrap().unwrap();
    assert_eq!(aggregate.sales_count, 2);
    assert_eq!(aggregate.total_revenue, 398.0);

    // Reconciling again is a no-op
    let reconciler = AnalyticsReconciler::new(env.state.db.clone());
    let outcome = reconciler.reconcile(&order.id).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyApplied);
    let aggregate = products.find_aggregate(&product).await.unwrap().unwrap();
    assert_eq!(aggregate.sales_count, 2);
    assert_eq!(aggregate.total_revenue, 398.0);

    // payment:received reached the admin
    let admin_events = drain(&mut admin_rx);
    assert!(admin_events.iter().any(|m| m.event == "payment:received"));
}

#[tokio::test]
async fn test_invalid_and_terminal_transitions() {
    let env = test_env().await;
    let customer = seed_user(&env.state, "alice", Role::Customer, false).await;
    let product = seed_product(&env.state, "Ramen", 80.0).await;

    let service = OrderService::from_state(&env.state);
    let order = service
        .create_order(&customer, order_request(&product, 1, PaymentMethod::Online))
        .await
        .unwrap();

    // pending -> delivered skips states
    let err = service
        .transition(&order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));

    // Cancel, then everything fails with TerminalState
    let order = service
        .transition(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.cancelled_at.is_some());
    assert!(order.agent_invariant_holds());

    let err = service
        .transition(&order.id, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::TerminalState(_)));
}

#[tokio::test]
async fn test_assignment_preconditions() {
    let env = test_env().await;
    let customer = seed_user(&env.state, "alice", Role::Customer, false).await;
    let admin = seed_user(&env.state, "root", Role::Admin, false).await;
    let offline_agent = seed_user(&env.state, "bob", Role::DeliveryAgent, false).await;
    let product = seed_product(&env.state, "Ramen", 80.0).await;

    let service = OrderService::from_state(&env.state);
    let order = service
        .create_order(&customer, order_request(&product, 1, PaymentMethod::Cod))
        .await
        .unwrap();

    let coordinator = AssignmentCoordinator::new(OrderService::from_state(&env.state));

    // Order still pending: not assignable
    let err = coordinator
        .assign(&order.id, &offline_agent.id, &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OrderNotAssignable(_)));

    let order = service
        .transition(&order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    // Offline agent
    let err = coordinator
        .assign(&order.id, &offline_agent.id, &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AgentUnavailable(_)));

    // Unapproved agent
    let users = UserRepository::new(env.state.db.clone());
    let pending_agent = seed_user(&env.state, "carol", Role::DeliveryAgent, true).await;
    users
        .set_approval(&pending_agent.id, ApprovalState::Pending, None)
        .await
        .unwrap();
    let err = coordinator
        .assign(&order.id, &pending_agent.id, &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AgentUnavailable(_)));

    // Unknown agent
    let err = coordinator
        .assign(&order.id, "user:missing", &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}

#[tokio::test]
async fn test_agent_offline_guard() {
    let env = test_env().await;
    let customer = seed_user(&env.state, "alice", Role::Customer, false).await;
    let agent = seed_user(&env.state, "bob", Role::DeliveryAgent, true).await;
    let admin = seed_user(&env.state, "root", Role::Admin, false).await;
    let product = seed_product(&env.state, "Ramen", 80.0).await;

    let service = OrderService::from_state(&env.state);
    let order = service
        .create_order(&customer, order_request(&product, 1, PaymentMethod::Online))
        .await
        .unwrap();
    let order = service
        .transition(&order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    let coordinator = AssignmentCoordinator::new(OrderService::from_state(&env.state));
    coordinator.assign(&order.id, &agent.id, &admin).await.unwrap();

    // Going offline with an active order is refused
    let users = UserRepository::new(env.state.db.clone());
    assert!(users.set_online(&agent.id, false).await.unwrap().is_none());

    // Cancelling the order releases the agent; offline now succeeds
    service
        .transition(&order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let updated = users.set_online(&agent.id, false).await.unwrap().unwrap();
    assert!(!updated.is_online);
    assert_eq!(updated.active_order_count, 0);
}

#[tokio::test]
async fn test_concurrent_transition_conflict() {
    let env = test_env().await;
    let customer = seed_user(&env.state, "alice", Role::Customer, false).await;
    let product = seed_product(&env.state, "Ramen", 80.0).await;

    let service = OrderService::from_state(&env.state);
    let order = service
        .create_order(&customer, order_request(&product, 1, PaymentMethod::Cod))
        .await
        .unwrap();
    let order = service
        .transition(&order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    // Two writers race from the same snapshot: assign vs cancel
    let repo = OrderRepository::new(env.state.db.clone());
    let snapshot = repo.find_by_id(&order.id).await.unwrap().unwrap();
    let record_id = snapshot.id.clone().unwrap();

    let assign_plan = plan_transition(
        snapshot.status,
        &snapshot.payment,
        OrderStatus::Assigned,
        Some("user:bob"),
    )
    .unwrap();
    let cancel_plan =
        plan_transition(snapshot.status, &snapshot.payment, OrderStatus::Cancelled, None).unwrap();

    let first = repo
        .apply_transition(&record_id, snapshot.version, &assign_plan, now_millis())
        .await
        .unwrap();
    assert!(first.is_some());

    // Second writer's version is stale: no row matched, caller maps this
    // to ConcurrentModification
    let second = repo
        .apply_transition(&record_id, snapshot.version, &cancel_plan, now_millis())
        .await
        .unwrap();
    assert!(second.is_none());

    let final_state = repo.find_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(final_state.status, OrderStatus::Assigned);
    assert!(Order::from(final_state).agent_invariant_holds());
}

#[tokio::test]
async fn test_reconciler_synthesizes_missing_product() {
    let env = test_env().await;

    // A delivered order referencing a product that no longer exists
    let repo = OrderRepository::new(env.state.db.clone());
    let now = now_millis();
    let record = repo
        .create(OrderRecord {
            id: None,
            order_number: "ORD-99".to_string(),
            customer_id: "user:ghost-customer".to_string(),
            items: vec![shared::models::order::OrderItem {
                product_id: "product:ghost".to_string(),
                name: "Discontinued Bowl".to_string(),
                unit_price: 55.0,
                quantity: 3,
                line_total: 165.0,
            }],
            subtotal: 165.0,
            tax: 0.0,
            delivery_fee: 0.0,
            discount: 0.0,
            total: 165.0,
            delivery_address: DeliveryAddress::default(),
            payment: PaymentInfo {
                method: PaymentMethod::Online,
                status: PaymentStatus::Paid,
                paid_at: Some(now),
            },
            status: OrderStatus::Delivered,
            delivery_agent: Some("user:ghost-agent".to_string()),
            created_at: now,
            confirmed_at: Some(now),
            assigned_at: Some(now),
            picked_up_at: Some(now),
            delivered_at: Some(now),
            cancelled_at: None,
            analytics_applied: false,
            version: 5,
        })
        .await
        .unwrap();
    let order_id = record.id.unwrap().to_string();

    let reconciler = AnalyticsReconciler::new(env.state.db.clone());
    let outcome = reconciler.reconcile(&order_id).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied { items: 1 });

    // Placeholder product synthesized from the item snapshot
    let products = ProductRepository::new(env.state.db.clone());
    let ghost = products.find_by_id("product:ghost").await.unwrap().unwrap();
    assert!(ghost.placeholder);
    assert!(!ghost.is_active);
    assert_eq!(ghost.name, "Discontinued Bowl");

    let aggregate = products.find_aggregate("product:ghost").await.unwrap().unwrap();
    assert_eq!(aggregate.sales_count, 3);
    assert_eq!(aggregate.total_revenue, 165.0);
}

#[tokio::test]
async fn test_backfill_counts_each_order_once() {
    let env = test_env().await;
    let customer = seed_user(&env.state, "alice", Role::Customer, false).await;
    let agent = seed_user(&env.state, "bob", Role::DeliveryAgent, true).await;
    let admin = seed_user(&env.state, "root", Role::Admin, false).await;
    let product = seed_product(&env.state, "Ramen", 80.0).await;

    // Deliver one order through the normal flow (reconciled inline)
    let service = OrderService::from_state(&env.state);
    let order = service
        .create_order(&customer, order_request(&product, 1, PaymentMethod::Online))
        .await
        .unwrap();
    let order = service
        .transition(&order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    let coordinator = AssignmentCoordinator::new(OrderService::from_state(&env.state));
    let order = coordinator.assign(&order.id, &agent.id, &admin).await.unwrap();
    let order = service
        .transition(&order.id, OrderStatus::OutForDelivery)
        .await
        .unwrap();
    service.record_payment(&order.id).await.unwrap();
    let order = service
        .transition(&order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);

    // Backfill over all delivered orders must not double-count it
    env.state.backfill.start(env.state.db.clone()).unwrap();
    for _ in 0..100 {
        if !env.state.backfill.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!env.state.backfill.is_running());

    let products = ProductRepository::new(env.state.db.clone());
    let aggregate = products.find_aggregate(&product).await.unwrap().unwrap();
    assert_eq!(aggregate.sales_count, 1);
    assert_eq!(aggregate.total_revenue, 80.0);
}
