use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use stockroom_catalog::{MarketplaceConfig, DEFAULT_SNAPSHOT_PATH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockroomConfig {
    pub marketplace: MarketplaceSection,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MarketplaceSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub seller_id: String,
    #[serde(default)]
    pub auth_token: String,
    /// Request timeout; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for MarketplaceSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceSection")
            .field("base_url", &self.base_url)
            .field("seller_id", &self.seller_id)
            .field("auth_token", &mask_secret(&self.auth_token))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MarketplaceSection {
    /// Connection settings for a fetch. Seller id and token must both be set;
    /// an unset `${VAR}` expands to an empty string.
    pub fn to_marketplace_config(&self) -> Result<MarketplaceConfig> {
        if self.seller_id.trim().is_empty() {
            anyhow::bail!(
                "marketplace.seller_id is empty. Set STOCKROOM_SELLER_ID or edit the config file."
            );
        }
        if self.auth_token.trim().is_empty() {
            anyhow::bail!(
                "marketplace.auth_token is empty. Set STOCKROOM_API_AUTH or edit the config file."
            );
        }

        Ok(MarketplaceConfig {
            base_url: self.base_url.clone(),
            seller_id: self.seller_id.trim().to_string(),
            auth_token: self.auth_token.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }
}

fn default_base_url() -> String {
    "https://apigw.trendyol.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

fn default_snapshot_path() -> String {
    DEFAULT_SNAPSHOT_PATH.to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "~/.stockroom/products.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stockroom")
}

impl StockroomConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        // The config carries marketplace credentials
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `stockroom init` first.",
                path.display()
            )
        })?;

        Self::parse(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Parse config text, expanding allowlisted `${VAR}` references first
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;

        if !config.marketplace.auth_token.is_empty()
            && !content.contains("${STOCKROOM_API_AUTH}")
        {
            warn!(
                "Marketplace token is hardcoded in config file. For security, use environment variables: auth_token = \"${{STOCKROOM_API_AUTH}}\""
            );
        }

        Ok(config)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        expand_home(&self.snapshot.path)
    }

    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.database.path)
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
const ALLOWED_ENV_VARS: &[&str] = &[
    "STOCKROOM_SELLER_ID",
    "STOCKROOM_API_AUTH",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(s).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[marketplace]
seller_id = "12345"
auth_token = "Basic abcdefgh12345678"
"#;

    #[test]
    fn test_parse_defaults() {
        let cfg = StockroomConfig::parse(MINIMAL).unwrap();
        assert_eq!(cfg.marketplace.base_url, "https://apigw.trendyol.com");
        assert_eq!(cfg.marketplace.timeout_secs, None);
        assert_eq!(cfg.snapshot.path, "data/external/products.json");
        assert_eq!(cfg.database.path, "~/.stockroom/products.db");

        let mp = cfg.marketplace.to_marketplace_config().unwrap();
        assert_eq!(mp.seller_id, "12345");
        assert!(mp.timeout.is_none());
    }

    #[test]
    fn test_fetch_needs_seller_and_token() {
        let mut section = MarketplaceSection {
            base_url: default_base_url(),
            seller_id: String::new(),
            auth_token: "Basic abcdefgh".to_string(),
            timeout_secs: None,
        };
        let err = section.to_marketplace_config().unwrap_err();
        assert!(err.to_string().contains("seller_id"));

        section.seller_id = "12345".to_string();
        section.auth_token = "  ".to_string();
        let err = section.to_marketplace_config().unwrap_err();
        assert!(err.to_string().contains("auth_token"));
    }

    #[test]
    fn test_default_config_template_parses() {
        let cfg = StockroomConfig::parse(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(cfg.snapshot.path, "data/external/products.json");
    }

    #[test]
    fn test_debug_masks_token() {
        let cfg = StockroomConfig::parse(MINIMAL).unwrap();
        let debug = format!("{:?}", cfg);
        assert!(!debug.contains("abcdefgh12345678"));
        assert!(debug.contains("Bas...5678"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(empty)");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("çok-gizli-anahtar"), "çok...htar");
    }

    #[test]
    fn test_expand_env_vars_allowlist() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(expand_env_vars("dir = \"${HOME}/x\""), format!("dir = \"{}/x\"", home));
        assert_eq!(expand_env_vars("v = \"${PATH}\""), "v = \"${PATH}\"");
        assert_eq!(expand_env_vars("v = \"${unterminated\""), "v = \"${unterminated\"");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("data/p.json"), PathBuf::from("data/p.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.stockroom/products.db"), home.join(".stockroom/products.db"));
        }
    }

    #[test]
    fn test_load_rejects_open_permissions() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
            assert!(StockroomConfig::load(&Some(path.clone())).is_err());
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        }

        let cfg = StockroomConfig::load(&Some(path)).unwrap();
        assert_eq!(cfg.marketplace.seller_id, "12345");
    }
}
