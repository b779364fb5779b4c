//! # Fundflow
//!
//! Data core for a streaming-payment investment fund dashboard: polls a
//! chain-indexing subgraph and a portfolio indexer for fund and stream
//! records, and projects each stream's flowing balance between refreshes.
//!
//! ## Features
//!
//! - **Flowing balances**: integer-exact linear projection of streamed
//!   amounts, redrawn on a bounded cadence
//! - **Polling with retry**: fetch-on-start, fixed refresh interval,
//!   rate-limit retry, one request in flight, cancellation on stop
//! - **Typed records**: fund, stream and token-balance records decoded once
//!   at the parse boundary
//! - **Local validation**: amounts and fund parameters rejected before any
//!   network call
//!
//! ## Modules
//!
//! - [`stream`]: checkpoints and the balance projector
//! - [`fetch`]: pollers, retry state and fetch errors
//! - [`sources`]: subgraph and indexer clients
//! - [`board`]: poller-to-projector wiring for a fund's streams
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fundflow::fetch::{Poller, PollerConfig};
//! use fundflow::sources::{StreamListSource, SubgraphClient, SubgraphConfig};
//! use fundflow::stream::BalanceProjector;
//! use fundflow::StreamBoard;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(SubgraphClient::new(SubgraphConfig::default())?);
//!     let source = StreamListSource::new(client, "0x52908400098527886e0f7030069857d2e4169ee7");
//!
//!     let board = StreamBoard::start(
//!         Poller::new(source, PollerConfig::default()),
//!         BalanceProjector::default(),
//!     );
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//!     for row in board.rows().await {
//!         println!("{} {}", row.sender, row.balance);
//!     }
//!
//!     board.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod format;
pub mod records;
pub mod sources;
pub mod stream;
pub mod validation;

// Re-export top-level types for convenience
pub use stream::{BalanceProjector, ProjectorConfig, ProjectorHandle, StreamCheckpoint};

pub use fetch::{
    FetchError, FetchOutcome, FetchResult, PollHandle, Poller, PollerConfig, QueryResult,
    RemoteSource,
};

pub use sources::{
    FundListSource, IndexerAuth, IndexerClient, IndexerConfig, PortfolioSource, StreamListSource,
    SubgraphClient, SubgraphConfig,
};

pub use records::{FundCreated, FundMetadata, FundView, StreamRecord, TokenBalance};

pub use board::{BoardRow, StreamBoard};

pub use cache::{CacheError, FileStore, KeyValueStore, MemoryStore, MetadataCache};

pub use validation::{parse_token_amount, validate_investment, FundParams, ValidationError};

pub use config::{Config, ConfigError, LoggingConfig};
