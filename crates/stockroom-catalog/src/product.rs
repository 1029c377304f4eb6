//! Product records and the catalog that groups them by barcode

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Maximum length, in characters, of any text column in the products table
pub const MAX_TEXT_LEN: usize = 65_535;

/// A single catalog entry.
///
/// The barcode is not stored inside the record: it is the key the record is
/// filed under in a [`Catalog`] and in the snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Option<f64>,
    #[serde(default, rename = "productUrl")]
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

impl ProductRecord {
    /// Price as stored in the relational table (absent prices become 0.0)
    pub fn price_or_zero(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }
}

/// Accept numbers and numeric strings. Anything else, including negative or
/// non-finite values, reads as absent.
pub(crate) fn lenient_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|p| p.is_finite() && *p >= 0.0))
}

/// Truncate a text field to the relational storage limit.
///
/// Counts characters, not bytes, so multi-byte text is never split mid-char.
pub fn truncate_text(s: &str) -> &str {
    match s.char_indices().nth(MAX_TEXT_LEN) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// All products from one fetch run, keyed by barcode
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    products: BTreeMap<String, ProductRecord>,
}

/// Snapshot entries go through [`Catalog::insert`], so blank keys are dropped
impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, ProductRecord>::deserialize(deserializer)?;
        let mut catalog = Catalog::new();
        for (identifier, record) in raw {
            if !catalog.insert(identifier, record) {
                warn!("Dropping snapshot entry with a blank barcode");
            }
        }
        Ok(catalog)
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Blank identifiers are rejected and return false.
    pub fn insert(&mut self, identifier: impl Into<String>, record: ProductRecord) -> bool {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return false;
        }
        self.products.insert(identifier, record);
        true
    }

    pub fn get(&self, identifier: &str) -> Option<&ProductRecord> {
        self.products.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProductRecord)> {
        self.products.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, ProductRecord> {
        self.products
    }
}

impl IntoIterator for Catalog {
    type Item = (String, ProductRecord);
    type IntoIter = std::collections::btree_map::IntoIter<String, ProductRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.products.into_iter()
    }
}

/// One `(title, price)` row from the products table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitlePrice {
    pub title: String,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, price: Option<f64>) -> ProductRecord {
        ProductRecord {
            title: title.to_string(),
            description: String::new(),
            price,
            url: String::new(),
            category: String::new(),
            brand: String::new(),
            image: None,
            attributes: None,
        }
    }

    #[test]
    fn test_truncate_text_long() {
        let long = "a".repeat(100_000);
        assert_eq!(truncate_text(&long).chars().count(), MAX_TEXT_LEN);
    }

    #[test]
    fn test_truncate_text_short_untouched() {
        assert_eq!(truncate_text("short"), "short");
        let exact = "b".repeat(MAX_TEXT_LEN);
        assert_eq!(truncate_text(&exact), exact);
    }

    #[test]
    fn test_truncate_text_multibyte() {
        let long = "ğ".repeat(MAX_TEXT_LEN + 10);
        let truncated = truncate_text(&long);
        assert_eq!(truncated.chars().count(), MAX_TEXT_LEN);
        assert_eq!(truncated.len(), MAX_TEXT_LEN * 'ğ'.len_utf8());
    }

    #[test]
    fn test_catalog_rejects_empty_identifier() {
        let mut catalog = Catalog::new();
        assert!(!catalog.insert("", record("x", None)));
        assert!(!catalog.insert("  ", record("x", None)));
        assert!(catalog.insert("869001", record("x", None)));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_lenient_price() {
        let json = r#"{"title":"a","price":"12.5"}"#;
        let rec: ProductRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.price, Some(12.5));

        let json = r#"{"title":"a","price":"n/a"}"#;
        let rec: ProductRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.price, None);
        assert_eq!(rec.price_or_zero(), 0.0);

        let json = r#"{"title":"a"}"#;
        let rec: ProductRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.price, None);
    }

    #[test]
    fn test_negative_price_reads_as_absent() {
        for raw in ["-5", "\"-0.01\"", "\"inf\""] {
            let json = format!(r#"{{"title":"a","price":{}}}"#, raw);
            let rec: ProductRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(rec.price, None, "price {}", raw);
        }
    }

    #[test]
    fn test_catalog_deserialize_drops_blank_identifiers() {
        let json = r#"{
            "": {"title": "no id", "price": 1},
            " ": {"title": "blank id"},
            "869": {"title": "kept", "price": -5}
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.len(), 1);
        let kept = catalog.get("869").unwrap();
        assert_eq!(kept.title, "kept");
        assert_eq!(kept.price, None);
    }

    #[test]
    fn test_extensions_omitted_when_absent() {
        let json = serde_json::to_string(&record("x", Some(1.0))).unwrap();
        assert!(json.contains("\"productUrl\""));
        assert!(!json.contains("image"));
        assert!(!json.contains("attributes"));
    }
}
