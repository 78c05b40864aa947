#![allow(dead_code)]

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use storefront_checkout::{
    catalog::{CatalogError, CatalogGateway, ProductSnapshot},
    db::{create_orm_conn, run_migrations},
    entity::{cart_items, carts, order_items, orders},
    middleware::auth::{AuthUser, Claims},
    notify::{Notifier, OrderConfirmation},
    services::identity_service::CartIdentity,
    state::AppState,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

/// In-memory catalog. Unknown ids are reported as not found.
#[derive(Default)]
pub struct FakeCatalog {
    products: Mutex<HashMap<String, Result<ProductSnapshot, CatalogError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn put(&self, product: ProductSnapshot) {
        self.products
            .lock()
            .expect("catalog lock")
            .insert(product.id.clone(), Ok(product));
    }

    pub fn fail(&self, product_id: &str, err: CatalogError) {
        self.products
            .lock()
            .expect("catalog lock")
            .insert(product_id.to_owned(), Err(err));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("catalog lock").clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("catalog lock").clear();
    }
}

#[async_trait]
impl CatalogGateway for FakeCatalog {
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot, CatalogError> {
        self.calls
            .lock()
            .expect("catalog lock")
            .push(product_id.to_owned());
        self.products
            .lock()
            .expect("catalog lock")
            .get(product_id)
            .cloned()
            .unwrap_or_else(|| Err(CatalogError::NotFound(product_id.to_owned())))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OrderConfirmation>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<OrderConfirmation> {
        self.sent.lock().expect("notifier lock").clone()
    }

    /// Wait until at least `count` confirmations arrived or a second passed.
    pub async fn wait_for(&self, count: usize) -> Vec<OrderConfirmation> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn order_confirmed(&self, confirmation: &OrderConfirmation) -> anyhow::Result<()> {
        self.sent
            .lock()
            .expect("notifier lock")
            .push(confirmation.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub catalog: Arc<FakeCatalog>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn memory_db() -> anyhow::Result<DatabaseConnection> {
    let orm = create_orm_conn("sqlite::memory:").await?;
    run_migrations(&orm).await?;
    Ok(orm)
}

pub fn state_with(
    orm: DatabaseConnection,
    catalog: Arc<dyn CatalogGateway>,
    notifier: Arc<dyn Notifier>,
) -> AppState {
    AppState {
        orm,
        catalog,
        notifier,
        jwt_secret: JWT_SECRET.into(),
    }
}

pub async fn setup() -> anyhow::Result<TestApp> {
    let catalog = Arc::new(FakeCatalog::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let state = state_with(memory_db().await?, catalog.clone(), notifier.clone());
    Ok(TestApp {
        state,
        catalog,
        notifier,
    })
}

pub fn money(text: &str) -> Decimal {
    Decimal::from_str(text).expect("valid decimal literal")
}

pub fn product(id: &str, price: &str, discount_percent: i32) -> ProductSnapshot {
    ProductSnapshot {
        id: id.into(),
        title: Some(format!("Product {id}")),
        slug: Some(id.to_lowercase()),
        price: money(price),
        currency: "RUB".into(),
        discount_percent,
        image_url: Some(format!("https://cdn.example.com/{id}.png")),
        thumbnail_url: None,
        category: None,
    }
}

pub fn guest(token: &str) -> CartIdentity {
    CartIdentity::guest(token)
}

pub fn user(user_id: Uuid, email: Option<&str>) -> AuthUser {
    AuthUser {
        user_id,
        role: "user".into(),
        email: email.map(Into::into),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
        email: None,
    }
}

pub fn bearer(user_id: Uuid, role: &str, email: Option<&str>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.into(),
        email: email.map(Into::into),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token");
    format!("Bearer {token}")
}

pub async fn all_carts(orm: &DatabaseConnection) -> Vec<carts::Model> {
    carts::Entity::find().all(orm).await.expect("carts")
}

pub async fn lines_of(orm: &DatabaseConnection, cart_id: Uuid) -> Vec<cart_items::Model> {
    cart_items::Entity::find()
        .filter(cart_items::Column::CartId.eq(cart_id))
        .all(orm)
        .await
        .expect("cart items")
}

pub async fn count_orders(orm: &DatabaseConnection) -> (usize, usize) {
    let orders = orders::Entity::find().all(orm).await.expect("orders").len();
    let items = order_items::Entity::find()
        .all(orm)
        .await
        .expect("order items")
        .len();
    (orders, items)
}
