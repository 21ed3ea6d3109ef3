//! Synchronous product lookup against the product-owning service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{Money, ProductId};
use inventory::InventoryLedger;
use opentelemetry::global;
use opentelemetry::propagation::TextMapPropagator;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Point-in-time view of a product as reported by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
}

/// Failures of the product lookup itself, as opposed to "not found".
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid product service URL: {0}")]
    InvalidUrl(String),

    #[error("Product service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Product service unreachable: {0}")]
    Transport(String),

    #[error("Product service answered with status {0}")]
    UnexpectedStatus(u16),

    #[error("Product service returned an undecodable body: {0}")]
    Decode(String),

    #[error("Inventory ledger error: {0}")]
    Ledger(#[from] inventory::InventoryError),
}

/// Read-only access to product data owned by another service.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetches a product. `Ok(None)` means the owner reported it absent.
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, CatalogError>;
}

/// Catalogue backed by the product service's REST API.
///
/// Every call is bounded by the client timeout and is never retried.
#[derive(Debug, Clone)]
pub struct HttpProductCatalog {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpProductCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let base_url =
            Url::parse(base_url).map_err(|e| CatalogError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// URL of a single product; the ID is percent-encoded as one path segment.
    fn product_url(&self, id: &ProductId) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("products")
            .push(id.as_str());
        Ok(url)
    }

    async fn request(&self, url: Url) -> Result<Option<ProductSnapshot>, CatalogError> {
        let response = self
            .client
            .get(url)
            .headers(trace_headers())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        match response.status() {
            StatusCode::OK => response
                .json::<ProductSnapshot>()
                .await
                .map(Some)
                .map_err(|e| {
                    if e.is_timeout() {
                        CatalogError::Timeout(self.timeout)
                    } else {
                        CatalogError::Decode(e.to_string())
                    }
                }),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(CatalogError::UnexpectedStatus(status.as_u16())),
        }
    }

    fn classify(&self, error: reqwest::Error) -> CatalogError {
        if error.is_timeout() {
            CatalogError::Timeout(self.timeout)
        } else {
            CatalogError::Transport(error.to_string())
        }
    }
}

/// W3C trace context of the current span, empty unless a propagator is
/// installed.
fn trace_headers() -> HeaderMap {
    let context = tracing::Span::current().context();
    let mut carrier: HashMap<String, String> = HashMap::new();
    global::get_text_map_propagator(|propagator| propagator.inject_context(&context, &mut carrier));
    carrier
        .into_iter()
        .filter_map(|(name, value)| {
            Some((
                HeaderName::try_from(name).ok()?,
                HeaderValue::try_from(value).ok()?,
            ))
        })
        .collect()
}

#[async_trait]
impl ProductCatalog for HttpProductCatalog {
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, CatalogError> {
        let url = self.product_url(id)?;
        let start = Instant::now();
        let result = self.request(url).await;

        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(CatalogError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        metrics::histogram!("upstream_request_duration_seconds", "outcome" => outcome)
            .record(start.elapsed().as_secs_f64());
        tracing::debug!(outcome, "product lookup finished");

        result
    }
}

/// Catalogue reading directly from an inventory ledger in the same process.
#[derive(Clone)]
pub struct LedgerCatalog {
    ledger: Arc<dyn InventoryLedger>,
}

impl LedgerCatalog {
    pub fn new(ledger: Arc<dyn InventoryLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl ProductCatalog for LedgerCatalog {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, CatalogError> {
        let product = self.ledger.get_product(id).await?;
        Ok(product.map(|p| ProductSnapshot {
            id: p.id,
            name: p.name,
            price: p.price,
            stock: p.stock,
        }))
    }
}
