use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stockroom_catalog::{
    lookup_product, render_titles_and_prices, save_catalog, CatalogFetcher, HttpPageSource,
    ProductDb,
};
use stockroom_tools::product_registry;

mod config;

use config::StockroomConfig;

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(version)]
#[command(about = "Stockroom: marketplace catalog sync and product tools for agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// Fetch the full catalog from the marketplace and write the snapshot
    Fetch {
        /// Overwrite the snapshot even when nothing was fetched
        #[arg(long)]
        allow_empty: bool,
    },

    /// Insert snapshot products missing from the database
    Sync,

    /// Look a product up by barcode
    Lookup {
        barcode: String,

        /// Read from the database instead of the snapshot
        #[arg(long)]
        db: bool,
    },

    /// Print every stored title and price
    Titles {
        /// Print one flattened line instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// List the tools exposed to agents
    Tools,

    /// Invoke an agent tool by name
    Tool {
        /// Tool name
        name: String,

        /// JSON input for the tool
        #[arg(long, default_value = "{}")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Fetch { allow_empty } => cmd_fetch(&cli.config, allow_empty).await,
        Commands::Sync => cmd_sync(&cli.config).await,
        Commands::Lookup { barcode, db } => cmd_lookup(&cli.config, &barcode, db).await,
        Commands::Titles { text } => cmd_titles(&cli.config, text).await,
        Commands::Tools => cmd_tools(&cli.config).await,
        Commands::Tool { name, input } => cmd_tool(&cli.config, &name, &input).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("Stockroom initialized at {}", config_dir.display());
    println!("Set STOCKROOM_SELLER_ID and STOCKROOM_API_AUTH, or edit {}.", config_path.display());
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = StockroomConfig::load(config_path)?;
    println!("{:#?}", cfg);
    Ok(())
}

async fn cmd_fetch(config_path: &Option<PathBuf>, allow_empty: bool) -> Result<()> {
    let cfg = StockroomConfig::load(config_path)?;
    let snapshot = cfg.snapshot_path();

    let source = HttpPageSource::new(&cfg.marketplace.to_marketplace_config()?)
        .context("Failed to create HTTP client")?;
    info!("Fetching catalog for seller {}", cfg.marketplace.seller_id);
    let catalog = CatalogFetcher::new(source).fetch_catalog().await;

    if catalog.is_empty() && !allow_empty {
        warn!(
            "Fetched catalog is empty; leaving {} untouched (use --allow-empty to overwrite)",
            snapshot.display()
        );
        return Ok(());
    }

    save_catalog(&catalog, &snapshot)?;
    println!("Saved {} products to {}", catalog.len(), snapshot.display());
    Ok(())
}

fn open_db(cfg: &StockroomConfig) -> Result<ProductDb> {
    let db_path = cfg.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database dir: {}", parent.display()))?;
    }
    ProductDb::open(&db_path)
}

async fn cmd_sync(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = StockroomConfig::load(config_path)?;
    let db = open_db(&cfg)?;
    let snapshot = cfg.snapshot_path();

    let report = tokio::task::spawn_blocking(move || db.sync_snapshot(&snapshot))
        .await
        .context("spawn_blocking task panicked")??;

    println!(
        "Inserted: {} | Skipped (exists): {} | Failed: {}",
        report.inserted, report.skipped, report.failed
    );
    Ok(())
}

async fn cmd_lookup(config_path: &Option<PathBuf>, barcode: &str, from_db: bool) -> Result<()> {
    let cfg = StockroomConfig::load(config_path)?;

    let product = if from_db {
        open_db(&cfg)?.get_product(barcode)?
    } else {
        lookup_product(&cfg.snapshot_path(), barcode)?
    };

    match product {
        Some(product) => println!("{}", serde_json::to_string_pretty(&product)?),
        None => println!("{{}}"),
    }
    Ok(())
}

async fn cmd_titles(config_path: &Option<PathBuf>, text: bool) -> Result<()> {
    let cfg = StockroomConfig::load(config_path)?;
    let rows = open_db(&cfg)?.titles_and_prices()?;

    if text {
        println!("{}", render_titles_and_prices(&rows));
    } else {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(())
}

async fn cmd_tools(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = StockroomConfig::load(config_path)?;
    let registry = product_registry(cfg.snapshot_path(), open_db(&cfg)?);
    println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
    Ok(())
}

async fn cmd_tool(config_path: &Option<PathBuf>, name: &str, input: &str) -> Result<()> {
    let cfg = StockroomConfig::load(config_path)?;
    let input: serde_json::Value =
        serde_json::from_str(input).context("Tool input must be a JSON object")?;

    let registry = product_registry(cfg.snapshot_path(), open_db(&cfg)?);
    let output = registry.call(name, input).await?;
    println!("{}", output);
    Ok(())
}
