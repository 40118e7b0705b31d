//! Aggregates module
pub mod product;
pub mod order;
pub mod delivery;
pub mod payment;
pub mod refund;

pub use product::{ColorImages, ColorVariant, Media, NewProduct, Product, ProductError, ProductRecord, ProductSummary, MAX_PRICE};
pub use order::{Customization, LineItem, Order, OrderError, OrderRecord, OrderStatus, StockEffect, MAX_ORDER_TOTAL};
pub use delivery::{Delivery, DeliveryAddress, DeliveryRecord, DeliveryStatus};
pub use payment::{Payment, PaymentError, PaymentRecord, PaymentStatus};
pub use refund::{Refund, RefundError, RefundRecord, RefundStatus};
