use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_checkout::{
    catalog::{CatalogGateway, HttpCatalogClient},
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    notify::{LogNotifier, Notifier, WebhookNotifier},
    routes::build_router,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_checkout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    if config.catalog.read_token.is_none() {
        tracing::warn!("CATALOG_READ_TOKEN is not set; every catalog lookup will fail");
    }
    let catalog: Arc<dyn CatalogGateway> = Arc::new(HttpCatalogClient::new(config.catalog.clone())?);
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.catalog.timeout)?),
        None => Arc::new(LogNotifier),
    };

    let state = AppState {
        orm,
        catalog,
        notifier,
        jwt_secret: config.jwt_secret.as_str().into(),
    };
    let app = build_router(state);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
