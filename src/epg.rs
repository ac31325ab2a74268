//! EPG collaborator boundary.
//!
//! The registry consumes EPG change notifications, looks up program entries
//! by channel and time window, and writes the inverse "this program has a
//! timer" reference back into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::channels::Channel;

/// Stable reference to a timer as held by the EPG side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRef {
    pub client_id: i32,
    pub client_index: i32,
}

/// Snapshot of one EPG program entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgEntry {
    pub id: i64,
    pub channel_number: i32,
    pub is_radio: bool,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

/// Change notification emitted by the EPG store.
///
/// The registry only reacts to `Changed`; other signals pass through the
/// same channel and are ignored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpgEvent {
    /// EPG data was reloaded or rewritten.
    Changed,
    /// A single entry was touched (progress updates and the like).
    ItemUpdated,
}

/// Electronic program guide store.
///
/// `set_timer` is called by the registry while it holds its own lock, so
/// implementations must not call back into the registry from it.
pub trait EpgStore: Send + Sync {
    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<EpgEvent>;

    /// Find the entry on `channel` whose window matches `[start, end]`.
    fn find_entry(
        &self,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<EpgEntry>;

    /// Set or clear the timer back-reference on an entry.
    fn set_timer(&self, epg_id: i64, timer: Option<TimerRef>);
}
