//! Product catalog tools exposed to agents

use async_trait::async_trait;
use serde_json::Value;
use anyhow::{Result, Context};
use std::path::PathBuf;
use tracing::debug;

use stockroom_catalog::{load_catalog, lookup_product, render_titles_and_prices, ProductDb};
use super::{ToolHandler, ToolParam};

/// Return the whole catalog snapshot
pub struct LoadProductsTool {
    snapshot_path: PathBuf,
}

impl LoadProductsTool {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self { snapshot_path: snapshot_path.into() }
    }
}

#[async_trait]
impl ToolHandler for LoadProductsTool {
    fn name(&self) -> &'static str {
        "load_products_from_json"
    }

    fn description(&self) -> &'static str {
        "Load every product from the local catalog snapshot. Returns a JSON object \
         keyed by barcode with title, description, price, productUrl, category and brand."
    }

    async fn execute(&self, _input: Value) -> Result<String> {
        let path = self.snapshot_path.clone();
        let catalog = tokio::task::spawn_blocking(move || load_catalog(&path))
            .await
            .context("spawn_blocking task panicked")??;

        debug!("Loaded {} products for agent", catalog.len());
        Ok(serde_json::to_string(&catalog)?)
    }
}

const TITLE_FORMATS: &[&str] = &["json", "text"];

/// List every stored product's title and price
pub struct ProductTitlesTool {
    db: ProductDb,
}

impl ProductTitlesTool {
    pub fn new(db: ProductDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ToolHandler for ProductTitlesTool {
    fn name(&self) -> &'static str {
        "get_all_product_titles_and_prices"
    }

    fn description(&self) -> &'static str {
        "List the title and price of every product in the database. \
         Prices are in Turkish Lira. Returns a JSON array of {title, price} by default."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::optional_choice(
            "format",
            "Optional: 'json' (default) for a list, 'text' for one flattened line",
            TITLE_FORMATS,
        )]
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let format = input.get("format").and_then(|v| v.as_str()).unwrap_or("json");
        if !TITLE_FORMATS.contains(&format) {
            anyhow::bail!("Unsupported format '{}', expected 'json' or 'text'", format);
        }

        let db = self.db.clone();
        let rows = tokio::task::spawn_blocking(move || db.titles_and_prices())
            .await
            .context("spawn_blocking task panicked")?
            .context("Failed to read product titles")?;

        debug!("Returning {} title/price rows as {}", rows.len(), format);
        if format == "text" {
            Ok(render_titles_and_prices(&rows))
        } else {
            Ok(serde_json::to_string(&rows)?)
        }
    }
}

/// Look up one product in the snapshot by barcode
pub struct ProductLookupTool {
    snapshot_path: PathBuf,
}

impl ProductLookupTool {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self { snapshot_path: snapshot_path.into() }
    }
}

#[async_trait]
impl ToolHandler for ProductLookupTool {
    fn name(&self) -> &'static str {
        "get_product_by_barcode"
    }

    fn description(&self) -> &'static str {
        "Look up a single product by its barcode. Returns the product details as JSON, \
         or an empty object if the barcode is unknown."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required_text("barcode", "Product barcode")]
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let barcode = input.get("barcode")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Missing 'barcode' parameter"))?
            .to_string();

        debug!("Looking up barcode {}", barcode);

        let path = self.snapshot_path.clone();
        let product = tokio::task::spawn_blocking(move || lookup_product(&path, &barcode))
            .await
            .context("spawn_blocking task panicked")??;

        match product {
            Some(product) => Ok(serde_json::to_string(&product)?),
            None => Ok("{}".to_string()),
        }
    }
}
