//! Portfolio indexer REST client
//!
//! Reads wallet token balances from a third-party chain-indexing API that
//! wraps every payload in `{data, error, error_message, error_code}`.

use crate::fetch::{FetchError, FetchResult, RemoteSource, TOO_MANY_REQUESTS};
use crate::records::{RawTokenBalance, TokenBalance};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// How requests authenticate against the indexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexerAuth {
    None,
    Bearer(String),
    /// API key sent as the basic-auth user name
    Basic { username: String, password: Option<String> },
}

/// Configuration for the indexer client
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// API base URL, without trailing slash
    pub base_url: String,
    /// Chain name as used in API paths (e.g. "base-mainnet")
    pub chain: String,
    pub auth: IndexerAuth,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.covalenthq.com".to_string(),
            chain: "base-mainnet".to_string(),
            auth: IndexerAuth::None,
            request_timeout_ms: 15_000,
        }
    }
}

/// REST client for the portfolio indexer
pub struct IndexerClient {
    client: Client,
    config: IndexerConfig,
}

#[derive(Debug, Deserialize)]
struct Envelope<D> {
    data: Option<D>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct BalancesData {
    #[serde(default)]
    items: Vec<RawTokenBalance>,
}

impl IndexerClient {
    /// Create a new indexer client with the given configuration
    pub fn new(config: IndexerConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("fundflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            IndexerAuth::None => request,
            IndexerAuth::Bearer(token) => request.bearer_auth(token),
            IndexerAuth::Basic { username, password } => {
                request.basic_auth(username, password.as_deref())
            }
        }
    }

    /// GET `path` and unwrap the response envelope
    pub async fn get<D: DeserializeOwned>(&self, path: &str) -> FetchResult<D> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let response = self.authorize(self.client.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), text));
        }

        let envelope: Envelope<D> = response.json().await?;

        if envelope.error {
            if envelope.error_code == Some(TOO_MANY_REQUESTS) {
                return Err(FetchError::RateLimited { attempt: 0 });
            }
            return Err(FetchError::Remote(
                envelope
                    .error_message
                    .unwrap_or_else(|| "unknown indexer error".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| FetchError::Decode("response has no data".to_string()))
    }

    /// Token balances held by `wallet`
    pub async fn token_balances(&self, wallet: &str) -> FetchResult<Vec<TokenBalance>> {
        let path = format!(
            "/v1/{}/address/{}/balances_v2/",
            urlencoding::encode(&self.config.chain),
            urlencoding::encode(wallet)
        );
        let data: BalancesData = self.get(&path).await?;

        data.items.into_iter().map(TokenBalance::from_raw).collect()
    }
}

/// Token holdings of one wallet
pub struct PortfolioSource {
    client: Arc<IndexerClient>,
    wallet: String,
    hide_empty: bool,
    name: String,
}

impl PortfolioSource {
    pub fn new(client: Arc<IndexerClient>, wallet: &str) -> Self {
        let wallet = wallet.to_lowercase();
        Self {
            client,
            name: format!("indexer:portfolio:{}", wallet),
            wallet,
            hide_empty: true,
        }
    }

    /// Keep tokens with a zero balance in the results
    pub fn include_empty(mut self) -> Self {
        self.hide_empty = false;
        self
    }
}

#[async_trait]
impl RemoteSource for PortfolioSource {
    type Item = TokenBalance;

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> FetchResult<Vec<TokenBalance>> {
        let mut balances = self.client.token_balances(&self.wallet).await?;
        if self.hide_empty {
            balances.retain(|b| b.balance > 0);
        }
        Ok(balances)
    }
}
