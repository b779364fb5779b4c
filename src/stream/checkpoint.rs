//! Stream checkpoints and balance projection
//!
//! A checkpoint is the last known `(amount, time, rate)` triple reported by
//! the indexer for a stream. The displayed balance between refreshes is a
//! linear extrapolation from it.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds per second, used to scale per-second flow rates
const MS_PER_SEC: u128 = 1_000;

/// Snapshot of a continuous payment stream at a point in time
///
/// Amounts are in the token's smallest unit. Times are Unix milliseconds.
/// A checkpoint is never mutated; fresher data produces a new one.
/// Amounts serialize as decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamCheckpoint {
    #[serde(with = "decimal_string")]
    streamed_at_checkpoint: u128,
    checkpoint_ms: i64,
    #[serde(with = "decimal_string")]
    flow_rate_per_sec: u128,
}

impl StreamCheckpoint {
    /// Create a checkpoint from a millisecond timestamp
    pub fn new(streamed_at_checkpoint: u128, checkpoint_ms: i64, flow_rate_per_sec: u128) -> Self {
        Self {
            streamed_at_checkpoint,
            checkpoint_ms,
            flow_rate_per_sec,
        }
    }

    /// Create a checkpoint from a second timestamp (the subgraph's unit)
    pub fn from_seconds(
        streamed_at_checkpoint: u128,
        checkpoint_secs: i64,
        flow_rate_per_sec: u128,
    ) -> Self {
        Self::new(
            streamed_at_checkpoint,
            checkpoint_secs.saturating_mul(1_000),
            flow_rate_per_sec,
        )
    }

    /// A checkpoint for a stream that is not flowing
    pub fn inactive(amount: u128, checkpoint_ms: i64) -> Self {
        Self::new(amount, checkpoint_ms, 0)
    }

    /// Amount streamed up to the checkpoint time
    pub fn streamed_at_checkpoint(&self) -> u128 {
        self.streamed_at_checkpoint
    }

    /// Checkpoint time in Unix milliseconds
    pub fn checkpoint_ms(&self) -> i64 {
        self.checkpoint_ms
    }

    /// Smallest units streamed per second
    pub fn flow_rate_per_sec(&self) -> u128 {
        self.flow_rate_per_sec
    }

    /// Whether the balance changes over time
    pub fn is_flowing(&self) -> bool {
        self.flow_rate_per_sec > 0
    }

    /// Projected balance at `now_ms`
    ///
    /// Elapsed time before the checkpoint (clock skew, stale checkpoint) is
    /// clamped to zero. Arithmetic saturates instead of wrapping.
    pub fn balance_at(&self, now_ms: i64) -> u128 {
        if !self.is_flowing() {
            return self.streamed_at_checkpoint;
        }

        let elapsed_ms = now_ms.saturating_sub(self.checkpoint_ms).max(0) as u128;
        let streamed_since = self.flow_rate_per_sec.saturating_mul(elapsed_ms) / MS_PER_SEC;

        self.streamed_at_checkpoint.saturating_add(streamed_since)
    }

    /// Projected balance at the current wall-clock time
    pub fn balance_now(&self) -> u128 {
        self.balance_at(Utc::now().timestamp_millis())
    }
}

impl std::fmt::Display for StreamCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let at = Utc
            .timestamp_millis_opt(self.checkpoint_ms)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.checkpoint_ms.to_string());
        write!(
            f,
            "{} @ {} (+{}/s)",
            self.streamed_at_checkpoint, at, self.flow_rate_per_sec
        )
    }
}

/// Parse a flow rate reported by an indexer
///
/// Rates that are negative, non-finite or not numbers at all describe no
/// displayable inflow and become `0`.
pub fn parse_flow_rate(raw: &str) -> u128 {
    let raw = raw.trim();

    if let Ok(rate) = raw.parse::<i128>() {
        return u128::try_from(rate).unwrap_or(0);
    }

    match raw.parse::<f64>() {
        Ok(rate) if rate.is_finite() && rate > 0.0 => rate as u128,
        _ => 0,
    }
}

/// `u128` as a JSON string; JSON numbers cannot carry 18-decimal amounts
mod decimal_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.trim().parse().map_err(de::Error::custom)
    }
}
