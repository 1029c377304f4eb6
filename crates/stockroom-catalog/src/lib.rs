//! Product catalog pipeline for stockroom
//!
//! This crate provides:
//! - Markup stripping for marketplace descriptions
//! - Paginated fetching of a seller's product listing
//! - JSON snapshot storage with point lookup
//! - Idempotent sync of the snapshot into a SQLite products table
//! - Title/price retrieval for agent tools

pub mod db;
pub mod error;
pub mod fetcher;
pub mod html;
pub mod product;
pub mod store;

// Re-export main types
pub use db::{render_titles_and_prices, ProductDb, SyncError, SyncReport};
pub use error::{CatalogError, FetchError};
pub use fetcher::{CatalogFetcher, HttpPageSource, MarketplaceConfig, PageSource};
pub use html::normalize_html;
pub use product::{Catalog, ProductRecord, TitlePrice, MAX_TEXT_LEN};
pub use store::{load_catalog, lookup_product, save_catalog, DEFAULT_SNAPSHOT_PATH};

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_to_table_pipeline() -> Result<()> {
        let dir = TempDir::new()?;
        let snapshot = dir.path().join("products.json");

        let mut catalog = Catalog::new();
        catalog.insert(
            "8690001",
            ProductRecord {
                title: "Karakovan Balı".to_string(),
                description: normalize_html(Some("<p>Doğal</p><p>Ham</p>")),
                price: Some(899.0),
                url: "https://example.com/8690001".to_string(),
                category: "Bal".to_string(),
                brand: "Beyorganik".to_string(),
                image: None,
                attributes: None,
            },
        );
        save_catalog(&catalog, &snapshot)?;

        let found = lookup_product(&snapshot, "8690001")?.expect("product in snapshot");
        assert_eq!(found.description, "Doğal\nHam");

        let db = ProductDb::open(dir.path().join("products.db"))?;
        let report = db.sync_snapshot(&snapshot)?;
        assert_eq!(report.inserted, 1);

        let rows = db.titles_and_prices()?;
        assert_eq!(render_titles_and_prices(&rows), "Title: Karakovan Balı, Price: 899 ");
        Ok(())
    }
}
