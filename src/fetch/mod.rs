//! Remote Data Fetching
//!
//! Polling, retry and error handling shared by every remote record source
//! (subgraph queries, indexer REST endpoints).
//!
//! ## Architecture
//!
//! - **RemoteSource**: one logical query against an external endpoint
//! - **Poller**: fetch-on-start, fixed-interval refresh, rate-limit retry,
//!   single request in flight
//! - **PollHandle**: cancellation handle returned by `Poller::start`
//! - **FetchError**: tagged error taxonomy with user-facing messages

mod error;
mod poller;
mod retry;

pub use error::{FetchError, FetchResult, TOO_MANY_REQUESTS};
pub use poller::{FetchOutcome, PollHandle, Poller, PollerConfig, QueryResult};
pub use retry::{RetryDecision, RetryPolicy, RetryState};

use async_trait::async_trait;

/// A remote query producing a list of records
#[async_trait]
pub trait RemoteSource: Send + Sync + 'static {
    /// Record type produced by this source
    type Item: Clone + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// Issue the request and decode the records
    async fn fetch(&self) -> FetchResult<Vec<Self::Item>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Source replaying canned responses
    pub struct ScriptedSource<T> {
        script: Mutex<VecDeque<FetchResult<Vec<T>>>>,
        fallback: Option<FetchResult<Vec<T>>>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        max_concurrent: Arc<AtomicUsize>,
    }

    impl<T: Clone> ScriptedSource<T> {
        pub fn new(script: Vec<FetchResult<Vec<T>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback: None,
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
                active: Arc::new(AtomicUsize::new(0)),
                max_concurrent: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn repeating(response: FetchResult<Vec<T>>) -> Self {
            let mut source = Self::new(Vec::new());
            source.fallback = Some(response);
            source
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }

        pub fn max_concurrent(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.max_concurrent)
        }

        pub fn push(&self, response: FetchResult<Vec<T>>) {
            self.script.lock().unwrap().push_back(response);
        }
    }

    #[async_trait]
    impl<T: Clone + Send + Sync + 'static> RemoteSource for ScriptedSource<T> {
        type Item = T;

        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self) -> FetchResult<Vec<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(active, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);

            let next = self.script.lock().unwrap().pop_front();
            match (next, &self.fallback) {
                (Some(response), _) => response,
                (None, Some(fallback)) => fallback.clone(),
                (None, None) => Err(FetchError::Network("script exhausted".into())),
            }
        }
    }
}
