//! Paginated catalog fetching from the marketplace product API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::html::normalize_html;
use crate::product::{lenient_price, Catalog, ProductRecord};

/// One page of the product listing as returned by the marketplace.
///
/// Items stay raw here so one malformed entry can be skipped without losing
/// the rest of the page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<Value>,
    #[serde(default)]
    pub total_pages: i64,
}

/// Product entry as it appears on the wire. Everything is optional and
/// tolerant of nulls; [`ApiProduct::into_record`] decides the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiProduct {
    #[serde(deserialize_with = "lenient_text")]
    pub barcode: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_price")]
    pub sale_price: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    pub product_url: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub category_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub brand: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<ApiImage>,
    #[serde(deserialize_with = "null_as_default")]
    pub attributes: Vec<ApiAttribute>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiImage {
    #[serde(deserialize_with = "lenient_text")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiAttribute {
    #[serde(deserialize_with = "lenient_text")]
    pub attribute_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub attribute_value: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Strings as is, numbers and booleans in their JSON spelling, anything else absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        v @ (Value::Number(_) | Value::Bool(_)) => Some(v.to_string()),
        _ => None,
    })
}

impl ApiProduct {
    /// Convert to a `(barcode, record)` pair, or `None` when the entry has no
    /// usable barcode.
    pub fn into_record(self) -> Option<(String, ProductRecord)> {
        let barcode = self.barcode.filter(|b| !b.trim().is_empty())?;

        let attributes: BTreeMap<String, String> = self
            .attributes
            .into_iter()
            .filter_map(|a| Some((a.attribute_name?, a.attribute_value.unwrap_or_default())))
            .collect();

        let record = ProductRecord {
            title: self.title.unwrap_or_default(),
            description: normalize_html(self.description.as_deref()),
            // salePrice is the authoritative price; listPrice is ignored
            price: self.sale_price,
            url: self.product_url.unwrap_or_default(),
            category: self.category_name.unwrap_or_default(),
            brand: self.brand.unwrap_or_default(),
            image: self.images.into_iter().next().and_then(|i| i.url),
            attributes: if attributes.is_empty() { None } else { Some(attributes) },
        };
        Some((barcode, record))
    }
}

/// Source of product listing pages
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<ApiPage, FetchError>;
}

/// Marketplace connection settings
#[derive(Clone)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub seller_id: String,
    pub auth_token: String,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("base_url", &self.base_url)
            .field("seller_id", &self.seller_id)
            .field("auth_token", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MarketplaceConfig {
    /// Listing endpoint for the configured seller
    pub fn products_url(&self) -> String {
        format!(
            "{}/integration/product/sellers/{}/products",
            self.base_url.trim_end_matches('/'),
            self.seller_id
        )
    }
}

/// HTTP page source for the marketplace product API
#[derive(Clone)]
pub struct HttpPageSource {
    client: Client,
    url: String,
    auth_token: String,
}

impl std::fmt::Debug for HttpPageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPageSource")
            .field("client", &"<reqwest::Client>")
            .field("url", &self.url)
            .finish()
    }
}

impl HttpPageSource {
    pub fn new(config: &MarketplaceConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent("stockroom/0.1");
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            url: config.products_url(),
            auth_token: config.auth_token.clone(),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page: u32) -> Result<ApiPage, FetchError> {
        debug!("Requesting product page {} from {}", page, self.url);

        let response = self
            .client
            .get(&self.url)
            .query(&[("page", page.to_string()), ("onSale", "true".to_string())])
            .header("Authorization", self.auth_token.as_str())
            .send()
            .await
            .map_err(|source| FetchError::Transport { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport { page, source })?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            page,
            reason: e.to_string(),
        })
    }
}

/// Walks every listing page and assembles a fresh catalog
pub struct CatalogFetcher<S: PageSource> {
    source: S,
}

impl<S: PageSource> CatalogFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch the full catalog. Any failure yields an empty catalog; callers
    /// must treat emptiness as "nothing usable was fetched".
    pub async fn fetch_catalog(&self) -> Catalog {
        match self.try_fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Catalog fetch aborted: {}", e);
                Catalog::new()
            }
        }
    }

    /// Fetch the full catalog, failing fast on the first bad page.
    pub async fn try_fetch_catalog(&self) -> Result<Catalog, FetchError> {
        let mut catalog = Catalog::new();
        let mut page: u32 = 0;

        loop {
            let data = self.source.fetch_page(page).await?;

            let total = data.content.len();
            let mut skipped = 0;
            for (index, item) in data.content.into_iter().enumerate() {
                let product = match serde_json::from_value::<ApiProduct>(item) {
                    Ok(product) => product,
                    Err(e) => {
                        warn!("Skipping malformed item {} on page {}: {}", index, page, e);
                        skipped += 1;
                        continue;
                    }
                };
                match product.into_record() {
                    Some((barcode, record)) => {
                        catalog.insert(barcode, record);
                    }
                    None => skipped += 1,
                }
            }
            debug!(
                "Page {}/{}: {} items, {} skipped",
                page, data.total_pages, total, skipped
            );

            // totalPages comes from upstream; anything below 1 means one page
            let last_page = data.total_pages.saturating_sub(1);
            if i64::from(page) >= last_page || page == u32::MAX {
                break;
            }
            page += 1;
        }

        info!("Fetched {} products over {} page(s)", catalog.len(), u64::from(page) + 1);
        Ok(catalog)
    }
}
