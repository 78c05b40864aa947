use std::{env, time::Duration};

use anyhow::{Context, anyhow};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub catalog: CatalogConfig,
    pub notify_webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Base for relative media URLs returned by the catalog.
    pub public_url: String,
    pub read_token: Option<String>,
    pub timeout: Duration,
    pub default_currency: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} is not set"));

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let host = var("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("APP_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let base_url = required("CATALOG_BASE_URL")?;
        let public_url = var("CATALOG_PUBLIC_URL").unwrap_or_else(|| base_url.clone());
        let timeout_secs = match var("CATALOG_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("CATALOG_TIMEOUT_SECONDS must be a whole number of seconds")?,
            None => 5,
        };
        if timeout_secs == 0 {
            return Err(anyhow!("CATALOG_TIMEOUT_SECONDS must be greater than 0"));
        }

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            catalog: CatalogConfig {
                base_url,
                public_url,
                read_token: var("CATALOG_READ_TOKEN"),
                timeout: Duration::from_secs(timeout_secs),
                default_currency: var("CATALOG_DEFAULT_CURRENCY").unwrap_or_else(|| "RUB".into()),
            },
            notify_webhook_url: var("NOTIFY_WEBHOOK_URL"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const MINIMAL: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/store"),
        ("JWT_SECRET", "secret"),
        ("CATALOG_BASE_URL", "http://catalog:1337"),
    ];

    #[test]
    fn applies_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&MINIMAL)).expect("config");

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.catalog.public_url, "http://catalog:1337");
        assert_eq!(config.catalog.timeout, Duration::from_secs(5));
        assert_eq!(config.catalog.default_currency, "RUB");
        assert!(config.catalog.read_token.is_none());
        assert!(config.notify_webhook_url.is_none());
    }

    #[test]
    fn reads_overrides() {
        let mut pairs = MINIMAL.to_vec();
        pairs.extend([
            ("APP_PORT", "8080"),
            ("CATALOG_PUBLIC_URL", "https://cdn.example.com"),
            ("CATALOG_READ_TOKEN", "tok"),
            ("CATALOG_TIMEOUT_SECONDS", "2"),
            ("CATALOG_DEFAULT_CURRENCY", "EUR"),
            ("NOTIFY_WEBHOOK_URL", "http://hooks/orders"),
        ]);
        let config = AppConfig::from_lookup(lookup_from(&pairs)).expect("config");

        assert_eq!(config.port, 8080);
        assert_eq!(config.catalog.public_url, "https://cdn.example.com");
        assert_eq!(config.catalog.read_token.as_deref(), Some("tok"));
        assert_eq!(config.catalog.timeout, Duration::from_secs(2));
        assert_eq!(config.catalog.default_currency, "EUR");
        assert_eq!(config.notify_webhook_url.as_deref(), Some("http://hooks/orders"));
    }

    #[test]
    fn rejects_missing_required_and_bad_timeout() {
        let err = AppConfig::from_lookup(lookup_from(&MINIMAL[..2])).unwrap_err();
        assert!(err.to_string().contains("CATALOG_BASE_URL"));

        let mut pairs = MINIMAL.to_vec();
        pairs.push(("CATALOG_TIMEOUT_SECONDS", "0"));
        assert!(AppConfig::from_lookup(lookup_from(&pairs)).is_err());

        let mut pairs = MINIMAL.to_vec();
        pairs.push(("CATALOG_TIMEOUT_SECONDS", "soon"));
        assert!(AppConfig::from_lookup(lookup_from(&pairs)).is_err());
    }
}
