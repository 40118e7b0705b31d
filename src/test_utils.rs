//! Shared fixtures for unit and router tests.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::api::AppState;
use crate::catalog::CatalogService;
use crate::deliveries::DeliveryService;
use crate::domain::aggregates::{Media, NewProduct, Product};
use crate::domain::value_objects::Sku;
use crate::orders::{OrderService, Paging};
use crate::payments::PaymentService;
use crate::publisher::EventPublisher;
use crate::refunds::RefundService;
use crate::store::{MemoryStore, Store, UserSummary};

pub fn test_user(name: &str) -> UserSummary {
    UserSummary { id: Uuid::now_v7(), name: name.to_string(), email: format!("{}@example.com", name.to_lowercase()) }
}

/// Catalog input with a SKU derived from `name`.
pub fn new_product(name: &str, price: &str, quantity: u32) -> NewProduct {
    let sku = format!("SKU-{}", name.to_uppercase().replace(' ', "-"));
    NewProduct {
        sku: Sku::new(sku).unwrap(),
        name: name.to_string(),
        description: format!("{name} description"),
        price: price.parse::<Decimal>().unwrap(),
        quantity,
        category_id: None,
        subcategory_id: None,
        is_customizable: false,
        media: Media { images: vec![format!("{}.png", name.to_lowercase())], videos: vec![] },
        sizes: vec![],
        colors: vec![],
    }
}

/// In-memory store with one registered user and services wired to it.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub user: UserSummary,
    pub orders: OrderService,
    pub catalog: CatalogService,
    pub deliveries: DeliveryService,
    pub payments: PaymentService,
    pub refunds: RefundService,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let user = test_user("Ada");
        store.add_user(user.clone()).await;
        let shared: Arc<dyn Store> = store.clone();
        Self {
            orders: OrderService::new(shared.clone(), EventPublisher::disabled(), Paging::default()),
            catalog: CatalogService::new(shared.clone()),
            deliveries: DeliveryService::new(shared.clone(), EventPublisher::disabled()),
            payments: PaymentService::new(shared.clone(), EventPublisher::disabled()),
            refunds: RefundService::new(shared, EventPublisher::disabled()),
            store,
            user,
        }
    }

    pub async fn product(&self, name: &str, price: &str, quantity: u32) -> Product {
        self.catalog.create_product(new_product(name, price, quantity)).await.unwrap()
    }

    pub async fn stock(&self, product_id: Uuid) -> u32 {
        self.store.find_product(product_id).await.unwrap().unwrap().quantity()
    }

    pub async fn other_user(&self, name: &str) -> UserSummary {
        let user = test_user(name);
        self.store.add_user(user.clone()).await;
        user
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.store.clone(), EventPublisher::disabled(), Paging::default())
    }
}
