use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{catalog::CatalogGateway, notify::Notifier};

#[derive(Clone)]
pub struct AppState {
    pub orm: DatabaseConnection,
    pub catalog: Arc<dyn CatalogGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub jwt_secret: Arc<str>,
}
