//! HTTP client for the backend REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use mercadito_core::{Principal, Product, ProductId};

use super::types::{
    NamedEntity, ProductDto, QuantityRequest, RemoteCart, normalize_products,
};
use super::{BackendError, CatalogSource, RemoteCartService};
use crate::config::BackendConfig;

/// Maximum number of body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the backend REST API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        // A base URL without a trailing slash would make `join` drop its last
        // path segment.
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(BackendClientInner { client, base_url }),
        })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Build an authenticated request for a customer-only endpoint.
    fn customer_request(
        &self,
        principal: &Principal,
        method: reqwest::Method,
        url: Url,
    ) -> Result<reqwest::RequestBuilder, BackendError> {
        let token = match principal.access_token() {
            Some(token) if principal.is_customer() => token,
            _ => {
                return Err(BackendError::Forbidden(format!(
                    "cart endpoints require a customer principal (got {})",
                    principal.kind().as_str()
                )));
            }
        };

        Ok(self
            .inner
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    /// Send a request and check the status, discarding the body.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), BackendError> {
        let response = request.send().await?;
        check_status(response).await.map(|_| ())
    }

    /// Send a request and parse a JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body),
                "Failed to parse backend response"
            );
            BackendError::Parse(e.to_string())
        })
    }
}

/// Map non-success statuses to typed errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized(truncate(&body))),
        StatusCode::FORBIDDEN => Err(BackendError::Forbidden(truncate(&body))),
        _ => Err(BackendError::Api {
            status: status.as_u16(),
            message: truncate(&body),
        }),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

#[async_trait]
impl RemoteCartService for BackendClient {
    #[instrument(skip(self, principal))]
    async fn fetch_cart(&self, principal: &Principal) -> Result<RemoteCart, BackendError> {
        let request = self.customer_request(principal, reqwest::Method::GET, self.endpoint("cart")?)?;
        let cart: RemoteCart = self.send_json(request).await?;
        debug!(lines = cart.lines.len(), "Fetched remote cart");
        Ok(cart)
    }

    #[instrument(skip(self, principal), fields(product_id = %product_id))]
    async fn add(
        &self,
        principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let request = self
            .customer_request(principal, reqwest::Method::POST, self.endpoint("cart/add")?)?
            .json(&QuantityRequest {
                product_id,
                quantity,
            });
        self.send(request).await
    }

    #[instrument(skip(self, principal), fields(product_id = %product_id))]
    async fn remove(
        &self,
        principal: &Principal,
        product_id: &ProductId,
    ) -> Result<(), BackendError> {
        let mut url = self.endpoint("cart/items/")?;
        url.path_segments_mut()
            .map_err(|()| BackendError::UnexpectedShape("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(product_id.as_str());

        let request = self.customer_request(principal, reqwest::Method::DELETE, url)?;
        self.send(request).await
    }

    #[instrument(skip(self, principal), fields(product_id = %product_id))]
    async fn set_quantity(
        &self,
        principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let request = self
            .customer_request(principal, reqwest::Method::PUT, self.endpoint("cart/quantity")?)?
            .json(&QuantityRequest {
                product_id,
                quantity,
            });
        self.send(request).await
    }

    #[instrument(skip(self, principal))]
    async fn clear(&self, principal: &Principal) -> Result<(), BackendError> {
        let request = self.customer_request(principal, reqwest::Method::POST, self.endpoint("cart/clear")?)?;
        self.send(request).await
    }
}

#[async_trait]
impl CatalogSource for BackendClient {
    #[instrument(skip(self))]
    async fn products(&self) -> Result<Vec<Product>, BackendError> {
        let request = self.inner.client.get(self.endpoint("products")?);
        let products: Vec<ProductDto> = self.send_json(request).await?;
        Ok(normalize_products(products))
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<NamedEntity>, BackendError> {
        let request = self.inner.client.get(self.endpoint("categories")?);
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    async fn brands(&self) -> Result<Vec<NamedEntity>, BackendError> {
        let request = self.inner.client.get(self.endpoint("brands")?);
        self.send_json(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            base_url: Url::parse(base).expect("url"),
            request_timeout: Duration::from_secs(5),
        })
        .expect("client")
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = client("https://api.example.com/v1");
        assert_eq!(client.base_url().as_str(), "https://api.example.com/v1/");
        assert_eq!(
            client.endpoint("cart").expect("endpoint").as_str(),
            "https://api.example.com/v1/cart"
        );
    }

    #[tokio::test]
    async fn test_cart_calls_rejected_for_non_customer() {
        // The request is refused before any network I/O happens.
        let client = client("http://127.0.0.1:9/");

        let anonymous = Principal::anonymous();
        let result = client.fetch_cart(&anonymous).await;
        assert!(matches!(result, Err(BackendError::Forbidden(_))));

        let staff = Principal::staff("s1", SecretString::from("tok"));
        let result = client.clear(&staff).await;
        assert!(matches!(result, Err(BackendError::Forbidden(_))));
    }

    #[test]
    fn test_client_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<BackendClient>();
    }
}
