//! SQLite products table: snapshot sync and read queries

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::product::{truncate_text, Catalog, ProductRecord, TitlePrice};
use crate::store::load_catalog;

/// Outcome of reconciling a catalog into the products table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Why a snapshot sync could not run at all
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Snapshot(#[from] CatalogError),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// SQLite-backed products table (thread-safe via Arc<Mutex>)
///
/// The single connection is shared across callers; each operation holds the
/// lock for its whole duration and releases it on every exit path.
#[derive(Clone)]
pub struct ProductDb {
    conn: Arc<Mutex<Connection>>,
}

impl ProductDb {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open SQLite database at {:?}", path.as_ref()))?;
        info!("Opened products database at {:?}", path.as_ref());
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection. A pre-existing `products` table is kept as is.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_products_table(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("Database mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Load the snapshot at `path` and insert every product not yet stored.
    pub fn sync_snapshot(&self, path: &Path) -> Result<SyncReport, SyncError> {
        let catalog = load_catalog(path)?;
        Ok(self.sync_catalog(&catalog)?)
    }

    /// Insert every product of `catalog` whose barcode is not yet stored.
    ///
    /// Existing rows are never updated. A failing row is logged and counted
    /// but does not stop the batch. Everything commits once at the end.
    pub fn sync_catalog(&self, catalog: &Catalog) -> Result<SyncReport> {
        let mut conn = self.lock();
        let tx = conn.transaction().context("Failed to begin sync transaction")?;
        let mut report = SyncReport::default();

        for (barcode, product) in catalog.iter() {
            match insert_if_absent(&tx, barcode, product) {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!("Error inserting barcode {}: {}", barcode, e);
                    report.failed += 1;
                }
            }
        }

        tx.commit().context("Failed to commit sync transaction")?;
        info!(
            "Inserted: {} | Skipped (exists): {} | Failed: {}",
            report.inserted, report.skipped, report.failed
        );
        Ok(report)
    }

    /// All `(title, price)` pairs in storage order
    pub fn titles_and_prices(&self) -> Result<Vec<TitlePrice>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT title, price FROM products")
            .context("Failed to prepare titles query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TitlePrice {
                    title: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    price: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Read {} title/price rows", rows.len());
        Ok(rows)
    }

    /// Fetch one stored product by barcode
    pub fn get_product(&self, barcode: &str) -> Result<Option<ProductRecord>> {
        let conn = self.lock();
        let product = conn
            .query_row(
                "SELECT title, description, price, productUrl, category, brand
                 FROM products WHERE barcode = ?1",
                params![barcode],
                |row| {
                    Ok(ProductRecord {
                        title: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        price: row.get(2)?,
                        url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        brand: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                        image: None,
                        attributes: None,
                    })
                },
            )
            .optional()?;
        Ok(product)
    }

    /// Number of stored products
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Create the products table if it does not exist. Safe to call repeatedly.
pub fn init_products_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS products (
            barcode TEXT PRIMARY KEY,
            title TEXT,
            description TEXT,
            price REAL,
            productUrl TEXT,
            category TEXT,
            brand TEXT
        )",
        [],
    )
    .context("Failed to create products table")?;
    debug!("Products table ready");
    Ok(())
}

/// Returns `Ok(true)` when a row was inserted, `Ok(false)` when it already existed.
fn insert_if_absent(conn: &Connection, barcode: &str, product: &ProductRecord) -> rusqlite::Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM products WHERE barcode = ?1 LIMIT 1",
            params![barcode],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO products (barcode, title, description, price, productUrl, category, brand)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            barcode,
            truncate_text(&product.title),
            truncate_text(&product.description),
            product.price_or_zero(),
            truncate_text(&product.url),
            truncate_text(&product.category),
            truncate_text(&product.brand),
        ],
    )?;
    Ok(true)
}

/// Flatten title/price rows into one text blob for agents that want prose
pub fn render_titles_and_prices(rows: &[TitlePrice]) -> String {
    rows.iter()
        .map(|r| format!("Title: {}, Price: {} ", r.title, r.price))
        .collect()
}
