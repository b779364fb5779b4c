//! Stream Board
//!
//! Wires a stream poller to one balance projector per stream: every fresh
//! result replaces each stream's checkpoint, starts projectors for streams
//! that appeared and stops those for streams that vanished.

use crate::fetch::{PollHandle, Poller, QueryResult, RemoteSource};
use crate::records::StreamRecord;
use crate::stream::{BalanceProjector, ProjectorHandle};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One stream as shown on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardRow {
    pub id: String,
    pub sender: String,
    pub token_symbol: String,
    pub token_decimals: u8,
    /// Projected balance in smallest units
    pub balance: u128,
    pub flow_rate_per_sec: u128,
    pub flowing: bool,
}

struct BoardEntry {
    record: StreamRecord,
    projector: ProjectorHandle,
}

type Entries = Arc<RwLock<HashMap<String, BoardEntry>>>;

/// Live flowing balances for every stream a poller returns
pub struct StreamBoard {
    poller: Option<PollHandle<StreamRecord>>,
    entries: Entries,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamBoard {
    /// Start polling and projecting
    pub fn start<S>(poller: Poller<S>, projector: BalanceProjector) -> Self
    where
        S: RemoteSource<Item = StreamRecord>,
    {
        let handle = poller.start();
        let updates = handle.subscribe();
        let entries: Entries = Arc::new(RwLock::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_board(
            updates,
            Arc::clone(&entries),
            projector,
            cancel.clone(),
        ));

        Self {
            poller: Some(handle),
            entries,
            cancel,
            task: Some(task),
        }
    }

    /// Rows ordered by projected balance, largest first
    pub async fn rows(&self) -> Vec<BoardRow> {
        let entries = self.entries.read().await;
        let mut rows: Vec<BoardRow> = entries
            .values()
            .map(|entry| BoardRow {
                id: entry.record.id.clone(),
                sender: entry.record.sender.clone(),
                token_symbol: entry.record.token_symbol.clone(),
                token_decimals: entry.record.token_decimals,
                balance: entry.projector.balance(),
                flow_rate_per_sec: entry.record.current_flow_rate,
                flowing: entry.record.current_flow_rate > 0,
            })
            .collect();

        rows.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    /// Loading/error state of the underlying poller
    pub fn status(&self) -> QueryResult<StreamRecord> {
        self.poller
            .as_ref()
            .map(PollHandle::snapshot)
            .unwrap_or_default()
    }

    /// Ask the poller for an immediate refresh
    pub fn refresh(&self) -> bool {
        self.poller.as_ref().map(PollHandle::refresh).unwrap_or(false)
    }

    /// Stop the poller and every projector
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        if let Some(poller) = self.poller.take() {
            poller.shutdown().await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Board task ended abnormally");
            }
        }

        let entries: Vec<BoardEntry> = self.entries.write().await.drain().map(|(_, e)| e).collect();
        for entry in entries {
            entry.projector.shutdown().await;
        }
    }
}

impl Drop for StreamBoard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_board(
    mut updates: watch::Receiver<QueryResult<StreamRecord>>,
    entries: Entries,
    projector: BalanceProjector,
    cancel: CancellationToken,
) {
    loop {
        let items = updates.borrow_and_update().items.clone();
        sync_entries(&entries, &projector, items).await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    // Projectors stop when their handles drop
    entries.write().await.clear();
}

async fn sync_entries(
    entries: &Entries,
    projector: &BalanceProjector,
    records: Vec<StreamRecord>,
) {
    let mut entries = entries.write().await;
    let mut seen = HashSet::with_capacity(records.len());

    for record in records {
        seen.insert(record.id.clone());
        let checkpoint = record.checkpoint();

        match entries.get_mut(&record.id) {
            Some(entry) => {
                if entry.projector.checkpoint() != checkpoint {
                    entry.projector.replace(checkpoint);
                }
                entry.record = record;
            }
            None => {
                tracing::debug!(stream = %record.id, "Tracking new stream");
                let handle = projector.start(checkpoint);
                entries.insert(
                    record.id.clone(),
                    BoardEntry {
                        record,
                        projector: handle,
                    },
                );
            }
        }
    }

    entries.retain(|id, _| {
        let keep = seen.contains(id);
        if !keep {
            tracing::debug!(stream = %id, "Stream no longer reported");
        }
        keep
    });
}
