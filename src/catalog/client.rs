use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::config::CatalogConfig;

use super::{CatalogError, CatalogGateway, ProductSnapshot, normalize};

/// HTTP client for the catalog's content API.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    config: CatalogConfig,
    http: Client,
}

impl HttpCatalogClient {
    /// Build a client whose every request is bounded by `config.timeout`.
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| CatalogError::Unavailable(format!("failed to build http client: {err}")))?;

        Ok(Self { config, http })
    }

    fn product_url(&self, product_id: &str) -> Result<Url, CatalogError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|err| CatalogError::Unavailable(format!("invalid catalog base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| CatalogError::Unavailable("catalog base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", "products", product_id]);
        Ok(url)
    }
}

#[async_trait]
impl CatalogGateway for HttpCatalogClient {
    async fn get_product(&self, product_id: &str) -> Result<ProductSnapshot, CatalogError> {
        let Some(token) = self.config.read_token.as_deref() else {
            tracing::error!("CATALOG_READ_TOKEN is not configured");
            return Err(CatalogError::Unavailable(
                "catalog read token is not configured".into(),
            ));
        };

        let url = self.product_url(product_id)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("populate[0]", "image"), ("populate[1]", "category")])
            .send()
            .await
            .map_err(|err| {
                tracing::error!(product_id, error = %err, "catalog request failed");
                CatalogError::Unavailable(err.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(product_id.to_owned()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(product_id, status = %status, body = %text, "catalog returned an error status");
            return Err(CatalogError::Unavailable(format!(
                "catalog returned status {status}"
            )));
        }

        let payload: Value = response.json().await.map_err(|err| {
            tracing::error!(product_id, error = %err, "invalid JSON from catalog");
            CatalogError::Unavailable(format!("invalid JSON from catalog: {err}"))
        })?;

        normalize::product_from_payload(product_id, &payload, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(base_url: &str, read_token: Option<&str>) -> CatalogConfig {
        CatalogConfig {
            base_url: base_url.into(),
            public_url: base_url.into(),
            read_token: read_token.map(Into::into),
            timeout: Duration::from_secs(1),
            default_currency: "RUB".into(),
        }
    }

    #[test]
    fn product_url_escapes_the_id() {
        let client = HttpCatalogClient::new(config("http://catalog:1337/", Some("t"))).expect("client");

        let url = client.product_url("doc 1/x").expect("url");
        assert_eq!(url.as_str(), "http://catalog:1337/api/products/doc%201%2Fx");
    }

    #[tokio::test]
    async fn missing_token_is_unavailable_without_a_request() {
        let client = HttpCatalogClient::new(config("http://127.0.0.1:9", None)).expect("client");

        let result = client.get_product("sku-1").await;
        assert!(
            matches!(result, Err(CatalogError::Unavailable(_))),
            "expected Unavailable, got {result:?}"
        );
    }
}
