//! Flowing Balances
//!
//! Real-time projection of continuous payment streams.
//!
//! ## Architecture
//!
//! - **StreamCheckpoint**: last known `(amount, time, rate)` for a stream
//! - **BalanceProjector**: periodic task extrapolating the balance between
//!   indexer refreshes
//! - **ProjectorHandle**: owns the task; replacing a checkpoint takes effect
//!   on the next recomputation, dropping the handle cancels the loop

mod checkpoint;
mod projector;

pub use checkpoint::{parse_flow_rate, StreamCheckpoint};
pub use projector::{
    BalanceProjector, Clock, ManualClock, ProjectorConfig, ProjectorHandle, SystemClock,
    MIN_TICK_INTERVAL_MS,
};
