//! Domain records
//!
//! Typed records decoded from subgraph and indexer payloads. Raw payloads are
//! converted once, here; partially missing metadata becomes an explicit
//! [`FundView::Fallback`] instead of optional fields scattered through
//! consumers.

use crate::fetch::FetchError;
use crate::stream::{parse_flow_rate, StreamCheckpoint};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A fund created through the fund factory contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundCreated {
    /// Fund contract address (lowercase hex)
    pub fund_address: String,
    /// Manager address
    pub manager: String,
    /// Fund token name
    pub name: String,
    /// Fund token symbol
    pub symbol: String,
    /// Block time of creation
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawFundCreated {
    pub fund_address: String,
    pub manager: String,
    pub fund_token_name: String,
    pub fund_token_symbol: String,
    pub block_timestamp: String,
}

impl FundCreated {
    pub(crate) fn from_raw(raw: RawFundCreated) -> Result<Self, FetchError> {
        Ok(Self {
            fund_address: raw.fund_address.to_lowercase(),
            manager: raw.manager.to_lowercase(),
            name: raw.fund_token_name,
            symbol: raw.fund_token_symbol,
            created_at: parse_timestamp("blockTimestamp", &raw.block_timestamp)?,
        })
    }
}

/// A continuous payment stream as reported by the subgraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Subgraph entity id
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub token_address: String,
    pub token_symbol: String,
    pub token_decimals: u8,
    /// Smallest units per second; `0` when the stream is closed
    pub current_flow_rate: u128,
    /// Amount streamed up to `updated_at_secs`
    pub streamed_until_updated_at: u128,
    pub updated_at_secs: i64,
}

impl StreamRecord {
    /// Checkpoint for balance projection
    pub fn checkpoint(&self) -> StreamCheckpoint {
        StreamCheckpoint::from_seconds(
            self.streamed_until_updated_at,
            self.updated_at_secs,
            self.current_flow_rate,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawStream {
    pub id: String,
    pub current_flow_rate: String,
    pub streamed_until_updated_at: String,
    pub updated_at_timestamp: String,
    pub sender: RawEntityRef,
    pub receiver: RawEntityRef,
    pub token: RawToken,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEntityRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawToken {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

impl StreamRecord {
    pub(crate) fn from_raw(raw: RawStream) -> Result<Self, FetchError> {
        let streamed = raw
            .streamed_until_updated_at
            .trim()
            .parse::<u128>()
            .map_err(|_| {
                FetchError::Decode(format!(
                    "stream {}: invalid streamedUntilUpdatedAt {:?}",
                    raw.id, raw.streamed_until_updated_at
                ))
            })?;
        let updated_at_secs = raw.updated_at_timestamp.trim().parse::<i64>().map_err(|_| {
            FetchError::Decode(format!(
                "stream {}: invalid updatedAtTimestamp {:?}",
                raw.id, raw.updated_at_timestamp
            ))
        })?;

        Ok(Self {
            current_flow_rate: parse_flow_rate(&raw.current_flow_rate),
            streamed_until_updated_at: streamed,
            updated_at_secs,
            sender: raw.sender.id.to_lowercase(),
            receiver: raw.receiver.id.to_lowercase(),
            token_address: raw.token.id.to_lowercase(),
            token_symbol: raw.token.symbol,
            token_decimals: raw.token.decimals,
            id: raw.id,
        })
    }
}

/// A token held by a wallet, from the portfolio indexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub contract_address: String,
    pub contract_name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Balance in smallest units
    pub balance: u128,
    /// Value in the indexer's quote currency, when priced
    pub quote: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTokenBalance {
    pub contract_address: String,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub contract_ticker_symbol: Option<String>,
    #[serde(default)]
    pub contract_decimals: Option<u8>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub quote: Option<f64>,
}

impl TokenBalance {
    pub(crate) fn from_raw(raw: RawTokenBalance) -> Result<Self, FetchError> {
        let balance = match raw.balance.as_deref() {
            None | Some("") => 0,
            Some(value) => value.parse::<u128>().map_err(|_| {
                FetchError::Decode(format!(
                    "token {}: invalid balance {:?}",
                    raw.contract_address, value
                ))
            })?,
        };

        Ok(Self {
            contract_address: raw.contract_address.to_lowercase(),
            contract_name: raw.contract_name.unwrap_or_default(),
            symbol: raw.contract_ticker_symbol.unwrap_or_default(),
            decimals: raw.contract_decimals.unwrap_or(18),
            balance,
            quote: raw.quote.filter(|q| q.is_finite()),
        })
    }
}

/// Off-chain fund metadata document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub performance_metrics: PerformanceMetrics,
}

/// Headline performance numbers, as decimal strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(default = "zero")]
    pub tvl: String,
    #[serde(default = "zero")]
    pub returns: String,
    #[serde(default = "zero")]
    pub investors: String,
}

fn zero() -> String {
    "0".to_string()
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            tvl: zero(),
            returns: zero(),
            investors: zero(),
        }
    }
}

/// A fund ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FundView {
    /// Metadata was available and well formed
    Parsed {
        fund: FundCreated,
        metadata: FundMetadata,
    },
    /// No usable metadata; defaults apply
    Fallback { fund: FundCreated },
}

impl FundView {
    /// Combine a fund with its metadata document, if any
    pub fn from_parts(fund: FundCreated, metadata: Option<&serde_json::Value>) -> Self {
        let Some(value) = metadata else {
            return FundView::Fallback { fund };
        };

        // Derived structs also accept arrays as tuples; metadata must be an object
        if !value.is_object() {
            tracing::debug!(fund = %fund.fund_address, "Fund metadata is not an object");
            return FundView::Fallback { fund };
        }

        match FundMetadata::deserialize(value) {
            Ok(metadata) => FundView::Parsed { fund, metadata },
            Err(e) => {
                tracing::debug!(fund = %fund.fund_address, error = %e, "Unusable fund metadata");
                FundView::Fallback { fund }
            }
        }
    }

    pub fn fund(&self) -> &FundCreated {
        match self {
            FundView::Parsed { fund, .. } | FundView::Fallback { fund } => fund,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            FundView::Parsed { metadata, .. } => &metadata.description,
            FundView::Fallback { .. } => "",
        }
    }

    pub fn tvl(&self) -> &str {
        match self {
            FundView::Parsed { metadata, .. } => &metadata.performance_metrics.tvl,
            FundView::Fallback { .. } => "0",
        }
    }

    pub fn performance(&self) -> PerformanceMetrics {
        match self {
            FundView::Parsed { metadata, .. } => metadata.performance_metrics.clone(),
            FundView::Fallback { .. } => PerformanceMetrics::default(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FundView::Fallback { .. })
    }
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, FetchError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| FetchError::Decode(format!("invalid {} {:?}", field, raw)))
}
