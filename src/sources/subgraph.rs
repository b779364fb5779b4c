//! Subgraph GraphQL client
//!
//! POSTs `{query, variables}` to a chain-indexing subgraph and decodes the
//! `{data, errors}` envelope.

use crate::fetch::{FetchError, FetchResult, RemoteSource};
use crate::records::{FundCreated, RawFundCreated, RawStream, StreamRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the subgraph client
#[derive(Debug, Clone)]
pub struct SubgraphConfig {
    /// GraphQL endpoint URL
    pub url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum records per list query
    pub page_size: u32,
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/subgraphs/name/fundflow".to_string(),
            request_timeout_ms: 15_000,
            page_size: 100,
        }
    }
}

/// GraphQL client for the fund subgraph
pub struct SubgraphClient {
    client: Client,
    config: SubgraphConfig,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl SubgraphClient {
    /// Create a new subgraph client with the given configuration
    pub fn new(config: SubgraphConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("fundflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &SubgraphConfig {
        &self.config
    }

    /// Run a query and decode its `data` field
    pub async fn query<D: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> FetchResult<D> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), text));
        }

        let body: GraphQlResponse<D> = response.json().await?;

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(FetchError::Remote(messages.join("; ")));
        }

        body.data.ok_or_else(|| FetchError::Decode("response has no data".to_string()))
    }
}

const FUNDS_QUERY: &str = r#"
query Funds($first: Int!) {
  fundCreateds(first: $first, orderBy: blockTimestamp, orderDirection: desc) {
    fundAddress
    manager
    fundTokenName
    fundTokenSymbol
    blockTimestamp
  }
}
"#;

const STREAMS_QUERY: &str = r#"
query FundStreams($receiver: String!, $first: Int!) {
  streams(
    first: $first
    where: { receiver: $receiver }
    orderBy: updatedAtTimestamp
    orderDirection: desc
  ) {
    id
    currentFlowRate
    streamedUntilUpdatedAt
    updatedAtTimestamp
    sender { id }
    receiver { id }
    token { id symbol decimals }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct FundsData {
    #[serde(rename = "fundCreateds")]
    fund_createds: Vec<RawFundCreated>,
}

#[derive(Debug, Deserialize)]
struct StreamsData {
    streams: Vec<RawStream>,
}

/// Funds created through the factory, newest first
pub struct FundListSource {
    client: Arc<SubgraphClient>,
}

impl FundListSource {
    pub fn new(client: Arc<SubgraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteSource for FundListSource {
    type Item = FundCreated;

    fn name(&self) -> &str {
        "subgraph:funds"
    }

    async fn fetch(&self) -> FetchResult<Vec<FundCreated>> {
        let variables = json!({ "first": self.client.config.page_size });
        let data: FundsData = self.client.query(FUNDS_QUERY, variables).await?;

        data.fund_createds
            .into_iter()
            .map(FundCreated::from_raw)
            .collect()
    }
}

/// Investor streams flowing into one fund
pub struct StreamListSource {
    client: Arc<SubgraphClient>,
    receiver: String,
    name: String,
}

impl StreamListSource {
    pub fn new(client: Arc<SubgraphClient>, receiver: &str) -> Self {
        let receiver = receiver.to_lowercase();
        Self {
            client,
            name: format!("subgraph:streams:{}", receiver),
            receiver,
        }
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }
}

#[async_trait]
impl RemoteSource for StreamListSource {
    type Item = StreamRecord;

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> FetchResult<Vec<StreamRecord>> {
        let variables = json!({
            "receiver": self.receiver,
            "first": self.client.config.page_size,
        });
        let data: StreamsData = self.client.query(STREAMS_QUERY, variables).await?;

        data.streams
            .into_iter()
            .map(StreamRecord::from_raw)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchOutcome, Poller, PollerConfig};
    use crate::sources::test_server::serve;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(url: String) -> Arc<SubgraphClient> {
        client_with_timeout(url, 2_000)
    }

    fn client_with_timeout(url: String, request_timeout_ms: u64) -> Arc<SubgraphClient> {
        Arc::new(
            SubgraphClient::new(SubgraphConfig {
                url,
                request_timeout_ms,
                page_size: 10,
            })
            .unwrap(),
        )
    }

    fn slow_server(hits: Arc<AtomicUsize>, delay: Duration) -> Router {
        Router::new().route(
            "/",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    Json(json!({ "data": { "fundCreateds": [] } }))
                }
            }),
        )
    }

    #[test]
    fn test_default_config() {
        let config = SubgraphConfig::default();
        assert_eq!(config.request_timeout_ms, 15_000);
        assert_eq!(config.page_size, 100);
    }

    #[tokio::test]
    async fn test_fetch_streams() {
        let app = Router::new().route(
            "/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["variables"]["receiver"], "0xfund");
                assert_eq!(body["variables"]["first"], 10);
                Json(json!({
                    "data": { "streams": [{
                        "id": "s1",
                        "currentFlowRate": "10",
                        "streamedUntilUpdatedAt": "1000000",
                        "updatedAtTimestamp": "1000",
                        "sender": { "id": "0xA" },
                        "receiver": { "id": "0xfund" },
                        "token": { "id": "0xT", "symbol": "USDCx", "decimals": 6 }
                    }]}
                }))
            }),
        );
        let url = serve(app).await;

        let source = StreamListSource::new(client(url), "0xFUND");
        let streams = source.fetch().await.unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].sender, "0xa");
        assert_eq!(streams[0].checkpoint().balance_at(1_005_000), 1_000_050);
    }

    #[tokio::test]
    async fn test_fetch_funds() {
        let app = Router::new().route(
            "/",
            post(|| async {
                Json(json!({
                    "data": { "fundCreateds": [{
                        "fundAddress": "0xF1",
                        "manager": "0xM",
                        "fundTokenName": "Alpha",
                        "fundTokenSymbol": "ALP",
                        "blockTimestamp": "1700000000"
                    }]}
                }))
            }),
        );
        let url = serve(app).await;

        let funds = FundListSource::new(client(url)).fetch().await.unwrap();
        assert_eq!(funds.len(), 1);
        assert_eq!(funds[0].fund_address, "0xf1");
        assert_eq!(funds[0].symbol, "ALP");
    }

    #[tokio::test]
    async fn test_rate_limit_status() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()
                }
            }),
        );
        let url = serve(app).await;

        let err = FundListSource::new(client(url)).fetch().await.unwrap_err();
        assert!(err.is_rate_limit());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_graphql_errors() {
        let app = Router::new().route(
            "/",
            post(|| async {
                Json(json!({ "data": null, "errors": [{ "message": "indexing error" }] }))
            }),
        );
        let url = serve(app).await;

        let err = FundListSource::new(client(url)).fetch().await.unwrap_err();
        assert_eq!(err, FetchError::Remote("indexing error".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let app = Router::new().route(
            "/",
            post(|| async { Json(json!({ "data": { "streams": 7 } })) }),
        );
        let url = serve(app).await;

        let err = StreamListSource::new(client(url), "0xfund")
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_server_error() {
        let app = Router::new().route(
            "/",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down").into_response() }),
        );
        let url = serve(app).await;

        let err = FundListSource::new(client(url)).fetch().await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Api {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve(slow_server(Arc::clone(&hits), Duration::from_millis(800))).await;

        let err = FundListSource::new(client_with_timeout(url, 100))
            .fetch()
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Timeout);
        assert!(!err.is_rate_limit());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poller_surfaces_timeout_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve(slow_server(Arc::clone(&hits), Duration::from_millis(800))).await;

        let poller = Poller::new(
            FundListSource::new(client_with_timeout(url, 100)),
            PollerConfig {
                poll_interval_ms: 60_000,
                max_retries: 3,
                retry_delay_ms: 10,
            },
        );

        assert_eq!(poller.fetch_once().await, FetchOutcome::Failed);

        let state = poller.snapshot();
        assert_eq!(state.error, Some(FetchError::Timeout));
        assert!(!state.loading);
        assert!(state.items.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
