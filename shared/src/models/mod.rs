//! Domain models shared between the dispatch server and clients.

pub mod order;
pub mod product;
pub mod user;

pub use order::{
    CreateOrderRequest, DeliveryAddress, Order, OrderItem, OrderItemInput, OrderStatus,
    PaymentInfo, PaymentMethod, PaymentStatus,
};
pub use product::{Product, ProductAggregate, ProductCreate};
pub use user::{ApprovalState, Role, UserResponse};
