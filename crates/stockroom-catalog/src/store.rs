//! JSON snapshot of the catalog on disk

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::product::{Catalog, ProductRecord};

/// Default snapshot location, relative to the working directory
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/external/products.json";

/// Write the full catalog to `path`, replacing whatever was there.
pub fn save_catalog(catalog: &Catalog, path: &Path) -> Result<(), CatalogError> {
    let json = serde_json::to_string_pretty(catalog)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, json).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Saved {} products to {}", catalog.len(), path.display());
    Ok(())
}

/// Read a snapshot back into a catalog.
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let content = std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => CatalogError::NotFound {
            path: path.to_path_buf(),
        },
        _ => CatalogError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    // from_slice also rejects non-UTF-8 content
    let catalog: Catalog =
        serde_json::from_slice(&content).map_err(|source| CatalogError::CorruptData {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("Loaded {} products from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// Look a single product up by barcode. Loads the whole snapshot each call.
pub fn lookup_product(path: &Path, identifier: &str) -> Result<Option<ProductRecord>, CatalogError> {
    let catalog = load_catalog(path)?;
    Ok(catalog.into_inner().remove(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.insert(
            "8690000000011",
            ProductRecord {
                title: "Çiçek Balı 850g".to_string(),
                description: "Doğal\nKatkısız".to_string(),
                price: Some(449.9),
                url: "https://example.com/p/1".to_string(),
                category: "Bal".to_string(),
                brand: "Beyorganik".to_string(),
                image: Some("https://cdn.example.com/1.jpg".to_string()),
                attributes: Some(BTreeMap::from([("Gramaj".to_string(), "850g".to_string())])),
            },
        );
        catalog.insert(
            "8690000000028",
            ProductRecord {
                title: "Zeytinyağı".to_string(),
                description: String::new(),
                price: None,
                url: String::new(),
                category: "Yağ".to_string(),
                brand: "Beyorganik".to_string(),
                image: None,
                attributes: None,
            },
        );
        catalog
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/products.json");
        let catalog = sample_catalog();

        save_catalog(&catalog, &path).unwrap();
        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_snapshot_is_pretty_utf8_keyed_by_barcode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        save_catalog(&sample_catalog(), &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"8690000000011\": {"));
        assert!(raw.contains("Çiçek Balı"));
        assert!(raw.contains("\"productUrl\""));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        save_catalog(&sample_catalog(), &path).unwrap();
        save_catalog(&Catalog::new(), &path).unwrap();
        assert!(load_catalog(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_catalog(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound { .. }));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_catalog(&path).unwrap_err(), CatalogError::CorruptData { .. }));

        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(load_catalog(&path).unwrap_err(), CatalogError::CorruptData { .. }));
    }

    #[test]
    fn test_lookup_product() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.json");
        save_catalog(&sample_catalog(), &path).unwrap();

        let found = lookup_product(&path, "8690000000028").unwrap().unwrap();
        assert_eq!(found.title, "Zeytinyağı");
        assert!(lookup_product(&path, "0000").unwrap().is_none());
    }
}
