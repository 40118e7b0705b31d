//! Order workflow: inventory ledger, slug allocation, status lifecycle and the service
//! that composes them.

pub mod inventory;
pub mod lifecycle;
pub mod service;
pub mod slug;
pub mod views;

pub use service::{ListOrders, NewLineItem, OrderService, Paging};
pub use views::{
    DeliveryWithOrder, LineItemView, OrderListing, OrderSummary, OrderWithProductSummary, Pagination, RankedProduct,
};
