//! Remote Record Sources
//!
//! Concrete [`RemoteSource`](crate::fetch::RemoteSource) implementations:
//! - Subgraph (GraphQL): fund creations, investor streams
//! - Portfolio indexer (REST): wallet token balances

mod indexer;
mod subgraph;

pub use indexer::{IndexerAuth, IndexerClient, IndexerConfig, PortfolioSource};
pub use subgraph::{FundListSource, StreamListSource, SubgraphClient, SubgraphConfig};
