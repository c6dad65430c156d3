//! Binary entrypoint for the tradepost CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and `shop.toml`
//! - `check` - load and summarize the catalog (`--json` for machine output)
//! - `history <player>` - show a player's recent trades from the durable log
//! - `top` - show the current weekly leaderboard (`--sellers` for the sell side)
//!
//! The interactive storefront itself lives in the embedding game; this binary
//! only bootstraps configuration and inspects persisted state.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::warn;

use tradepost::config::{Config, STARTER_CATALOG};
use tradepost::shop::{format_money, Catalog, SledTradeLog, TradeLog, WeekKey};

#[derive(Parser)]
#[command(name = "tradepost")]
#[command(about = "Transaction and pricing engine for an in-game storefront")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config.toml and shop.toml
    Init,
    /// Load the catalog and print a summary
    Check {
        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a player's recent transactions
    History {
        player: String,
        /// Maximum entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the current weekly leaderboard
    Top {
        /// Rank by amount sold instead of bought
        #[arg(long)]
        sellers: bool,
        /// Number of rows
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match &cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => init_files(&cli.config).await,
        Commands::Check { json } => {
            let config = load_config(&cli.config).await?;
            check_catalog(&config, json)
        }
        Commands::History { player, limit } => {
            let config = load_config(&cli.config).await?;
            show_history(&config, &player, limit)
        }
        Commands::Top { sellers, limit } => {
            let config = load_config(&cli.config).await?;
            show_top(&config, sellers, limit)
        }
    }
}

fn init_logging(config: &Option<Config>, verbose: u8) {
    let level = match verbose {
        0 => config
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}

async fn load_config(path: &str) -> Result<Config> {
    Config::load(path)
        .await
        .map_err(|e| anyhow!("{}\nRun `tradepost init` to create a starter config.", e))
}

async fn init_files(config_path: &str) -> Result<()> {
    if tokio::fs::try_exists(config_path).await.unwrap_or(false) {
        return Err(anyhow!("{} already exists, refusing to overwrite", config_path));
    }
    Config::create_default(config_path).await?;
    println!("Wrote {}", config_path);

    let catalog_path = Config::default().shop.catalog_file;
    if tokio::fs::try_exists(&catalog_path).await.unwrap_or(false) {
        warn!("{} already exists, leaving it alone", catalog_path);
    } else {
        tokio::fs::write(&catalog_path, STARTER_CATALOG).await?;
        println!("Wrote {}", catalog_path);
    }
    Ok(())
}

fn check_catalog(config: &Config, json: bool) -> Result<()> {
    let catalog = Catalog::load(&config.shop.catalog_file)?;
    if json {
        let summary = serde_json::json!({
            "categories": catalog
                .categories()
                .iter()
                .map(|c| serde_json::json!({
                    "name": c.name,
                    "items": c.items.len(),
                }))
                .collect::<Vec<_>>(),
            "items": catalog.item_count(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "Catalog OK: {} categories, {} items",
        catalog.categories().len(),
        catalog.item_count()
    );
    for category in catalog.categories() {
        println!("  {} ({} items)", category.name, category.items.len());
        for item in &category.items {
            let buy = item
                .buy_price
                .map(|p| format_money(p, &config.shop.currency_symbol))
                .unwrap_or_else(|| "-".to_string());
            let sell = item
                .sell_price
                .map(|p| format_money(p, &config.shop.currency_symbol))
                .unwrap_or_else(|| "-".to_string());
            println!("    {:<24} buy {:<10} sell {}", item.display_name, buy, sell);
        }
    }
    Ok(())
}

fn open_log(config: &Config) -> Result<SledTradeLog> {
    if !config.storage.enabled {
        return Err(anyhow!("durable storage is disabled in this config"));
    }
    Ok(SledTradeLog::open(&config.storage.data_dir)?)
}

fn show_history(config: &Config, player: &str, limit: usize) -> Result<()> {
    let log = open_log(config)?;
    let trades = log.recent(player, limit)?;
    if trades.is_empty() {
        println!("No recorded trades for {}", player);
        return Ok(());
    }
    for tx in trades {
        println!("{}", tx);
    }
    Ok(())
}

fn show_top(config: &Config, sellers: bool, limit: usize) -> Result<()> {
    let log = open_log(config)?;
    let week = WeekKey::current();
    let mut rows = log.week_stats(week)?;
    rows.sort_by(|a, b| {
        let (x, y) = if sellers {
            (b.total_sold, a.total_sold)
        } else {
            (b.total_bought, a.total_bought)
        };
        x.cmp(&y)
    });
    rows.truncate(limit);

    let side = if sellers { "sellers" } else { "buyers" };
    println!("Top {} for {}:", side, week);
    if rows.is_empty() {
        println!("  (no trades this week)");
    }
    for (rank, stats) in rows.iter().enumerate() {
        let total = if sellers {
            stats.total_sold
        } else {
            stats.total_bought
        };
        println!(
            "  {:>2}. {:<16} {}",
            rank + 1,
            stats.player,
            format_money(total, &config.shop.currency_symbol)
        );
    }
    Ok(())
}
