//! Fundflow CLI
//!
//! Command-line front end for the fund dashboard data core:
//! - List funds from the subgraph
//! - Watch a fund's investor streams with live flowing balances
//! - Show a wallet's token portfolio
//! - Project a single stream checkpoint
//! - Validate an investment amount

use anyhow::Context;
use clap::{Parser, Subcommand};
use fundflow::config::{generate_default_config, Config, LoggingConfig};
use fundflow::format::{flow_rate_per_month, format_units};
use fundflow::{
    BalanceProjector, FetchOutcome, FileStore, FundListSource, FundView, IndexerClient,
    MetadataCache, PortfolioSource, Poller, StreamBoard, StreamCheckpoint, StreamListSource,
    SubgraphClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fundflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Streaming-payment fund dashboard data core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List funds created through the factory
    Funds {
        /// Keep polling and reprint on every change
        #[arg(short, long)]
        watch: bool,
    },

    /// Watch a fund's investor streams with live balances
    Streams {
        /// Fund contract address
        fund: String,
        /// Seconds between redraws
        #[arg(long, default_value = "1")]
        every: u64,
        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Show a wallet's token balances
    Portfolio {
        /// Wallet address
        wallet: String,
        /// Include tokens with a zero balance
        #[arg(long)]
        all: bool,
    },

    /// Project a stream checkpoint to a point in time
    Balance {
        /// Amount streamed at the checkpoint (smallest units)
        #[arg(long)]
        amount: u128,
        /// Checkpoint time (Unix seconds)
        #[arg(long)]
        at: i64,
        /// Flow rate (smallest units per second)
        #[arg(long)]
        rate: String,
        /// Time to project to (Unix seconds, default: now)
        #[arg(long)]
        now: Option<i64>,
        /// Token decimals for display
        #[arg(long, default_value = "18")]
        decimals: u8,
    },

    /// Check an investment amount before submitting it
    Validate {
        /// Amount as entered (e.g. "12.5")
        amount: String,
        /// Token decimals
        #[arg(long, default_value = "18")]
        decimals: u8,
        /// Available balance (smallest units)
        #[arg(long)]
        balance: Option<u128>,
    },

    /// Record a fund's metadata URI in the local cache
    Remember {
        /// Fund contract address
        fund: String,
        /// Metadata URI (e.g. ipfs://...)
        uri: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    let json = cli.format == "json";

    match cli.command {
        Commands::Funds { watch } => run_funds(&config, watch, json).await,
        Commands::Streams {
            fund,
            every,
            duration,
        } => run_streams(&config, &fund, every, duration, json).await,
        Commands::Portfolio { wallet, all } => run_portfolio(&config, &wallet, all, json).await,
        Commands::Balance {
            amount,
            at,
            rate,
            now,
            decimals,
        } => {
            let rate = fundflow::stream::parse_flow_rate(&rate);
            let checkpoint = StreamCheckpoint::from_seconds(amount, at, rate);
            let balance = match now {
                Some(secs) => checkpoint.balance_at(secs.saturating_mul(1_000)),
                None => checkpoint.balance_now(),
            };

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "checkpoint": checkpoint,
                        "balance": balance.to_string(),
                    })
                );
            } else {
                println!("Checkpoint: {}", checkpoint);
                println!("Balance:    {} ({})", format_units(balance, decimals, 6), balance);
                println!(
                    "Per month:  {}",
                    format_units(flow_rate_per_month(checkpoint.flow_rate_per_sec()), decimals, 4)
                );
            }
            Ok(())
        }
        Commands::Validate {
            amount,
            decimals,
            balance,
        } => {
            let result = match balance {
                Some(balance) => fundflow::validate_investment(&amount, decimals, balance),
                None => fundflow::parse_token_amount(&amount, decimals),
            };

            match result {
                Ok(units) => {
                    println!("OK: {} smallest units", units);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Invalid amount: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Remember { fund, uri } => {
            fundflow::validation::validate_address(&fund)?;
            let store = FileStore::open(config.cache.resolved_path())?;
            MetadataCache::new(store).remember(&fund, &uri)?;
            println!("Cached metadata URI for {}", fund.to_lowercase());
            Ok(())
        }
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
            Ok(())
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("fundflow={}", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_funds(config: &Config, watch: bool, json: bool) -> anyhow::Result<()> {
    let client = Arc::new(SubgraphClient::new(config.subgraph.client_config())?);
    let poller = Poller::new(FundListSource::new(client), config.poller.poller_config());
    let cache = match FileStore::open(config.cache.resolved_path()) {
        Ok(store) => Some(MetadataCache::new(store)),
        Err(e) => {
            tracing::warn!(error = %e, "Metadata cache unavailable");
            None
        }
    };

    let print = |state: &fundflow::QueryResult<fundflow::FundCreated>| {
        if let Some(message) = state.error_message() {
            eprintln!("{}", message);
        }

        let views: Vec<(FundView, Option<String>)> = state
            .items
            .iter()
            .cloned()
            .map(|fund| {
                let uri = cache
                    .as_ref()
                    .and_then(|c| c.uri(&fund.fund_address).ok().flatten());
                (FundView::from_parts(fund, None), uri)
            })
            .collect();

        if json {
            let rows: Vec<_> = views
                .iter()
                .map(|(view, uri)| serde_json::json!({ "fund": view, "metadata_uri": uri }))
                .collect();
            println!("{}", serde_json::Value::Array(rows));
            return;
        }

        println!("{:<44} {:<10} {:<24} {:<12} {}", "FUND", "SYMBOL", "NAME", "TVL", "CREATED");
        for (view, uri) in &views {
            let fund = view.fund();
            println!(
                "{:<44} {:<10} {:<24} {:<12} {}{}",
                fund.fund_address,
                fund.symbol,
                fund.name,
                view.tvl(),
                fund.created_at.format("%Y-%m-%d"),
                uri.as_deref().map(|u| format!("  {}", u)).unwrap_or_default()
            );
        }
    };

    if !watch {
        let outcome = poller.fetch_once().await;
        print(&poller.snapshot());
        if !matches!(outcome, FetchOutcome::Updated(_)) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut handle = poller.start();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = handle.changed() => {
                if !changed {
                    break;
                }
                print(&handle.snapshot());
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn run_streams(
    config: &Config,
    fund: &str,
    every: u64,
    duration: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    fundflow::validation::validate_address(fund)?;

    let client = Arc::new(SubgraphClient::new(config.subgraph.client_config())?);
    let source = StreamListSource::new(client, fund);
    let board = StreamBoard::start(
        Poller::new(source, config.poller.poller_config()),
        BalanceProjector::new(config.projector.projector_config()),
    );

    let deadline = duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut redraw = tokio::time::interval(Duration::from_secs(every.max(1)));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => break,
            _ = redraw.tick() => {
                let status = board.status();
                if status.loading {
                    continue;
                }
                if let Some(message) = status.error_message() {
                    eprintln!("{}", message);
                }

                let rows = board.rows().await;
                if json {
                    println!("{}", serde_json::to_string(&rows)?);
                    continue;
                }

                println!(
                    "{:<44} {:<8} {:>24} {:>18}",
                    "INVESTOR", "TOKEN", "STREAMED", "PER MONTH"
                );
                for row in &rows {
                    let per_month = flow_rate_per_month(row.flow_rate_per_sec);
                    println!(
                        "{:<44} {:<8} {:>24} {:>18}",
                        row.sender,
                        row.token_symbol,
                        format_units(row.balance, row.token_decimals, 6),
                        format_units(per_month, row.token_decimals, 2)
                    );
                }
                println!();
            }
        }
    }

    board.shutdown().await;
    Ok(())
}

async fn run_portfolio(config: &Config, wallet: &str, all: bool, json: bool) -> anyhow::Result<()> {
    fundflow::validation::validate_address(wallet)?;

    let client = Arc::new(IndexerClient::new(config.indexer.client_config()?)?);
    let mut source = PortfolioSource::new(client, wallet);
    if all {
        source = source.include_empty();
    }

    let poller = Poller::new(source, config.poller.poller_config());
    poller.fetch_once().await;
    let state = poller.snapshot();

    if let Some(message) = state.error_message() {
        eprintln!("{}", message);
        std::process::exit(1);
    }

    if json {
        println!("{}", serde_json::to_string(&state.items)?);
        return Ok(());
    }

    println!("{:<44} {:<8} {:>24} {:>12}", "TOKEN", "SYMBOL", "BALANCE", "VALUE");
    for token in &state.items {
        println!(
            "{:<44} {:<8} {:>24} {:>12}",
            token.contract_address,
            token.symbol,
            format_units(token.balance, token.decimals, 6),
            token
                .quote
                .map(|q| format!("{:.2}", q))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}
