//! A single scheduled recording timer.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::client::TimerClients;
use crate::epg::TimerRef;

/// Client index of a locally created timer that no backend has confirmed
/// yet. Such timers are never matched or removed by reconciliation.
pub const INSTANT_CLIENT_INDEX: i32 = -1;

/// One timer record.
///
/// Identity is the `(client_id, client_index)` pair. An entry keeps its slot
/// in the registry across updates; reconciliation merges fields in place via
/// [`TimerEntry::update_entry`] instead of replacing the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEntry {
    pub client_id: i32,
    pub client_index: i32,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub channel_number: i32,
    pub client_channel_uid: i32,
    pub is_radio: bool,
    pub priority: i32,
    pub lifetime_days: i32,
    pub is_repeating: bool,
    pub is_active: bool,
    pub is_recording: bool,
    pub title: String,
    pub summary: String,
    pub path: String,
    /// Weak reference into the EPG store, owned and invalidated by the
    /// registry. Never copied by `update_entry`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epg_id: Option<i64>,
}

fn merge_field<T: PartialEq + Clone>(dst: &mut T, src: &T, changed: &mut bool) {
    if dst != src {
        *dst = src.clone();
        *changed = true;
    }
}

impl TimerEntry {
    /// Scheduled duration.
    pub fn duration(&self) -> Duration {
        self.end_utc - self.start_utc
    }

    /// Set the end time to `minutes` after the start time.
    pub fn set_duration(&mut self, minutes: i64) {
        self.end_utc = self.start_utc + Duration::minutes(minutes);
    }

    pub fn start_local(&self) -> DateTime<Local> {
        self.start_utc.with_timezone(&Local)
    }

    pub fn end_local(&self) -> DateTime<Local> {
        self.end_utc.with_timezone(&Local)
    }

    /// Whether this is a local, not-yet-confirmed instant timer.
    pub fn is_instant(&self) -> bool {
        self.client_index == INSTANT_CLIENT_INDEX
    }

    /// Reference handed to the EPG store for the inverse link.
    pub fn timer_ref(&self) -> TimerRef {
        TimerRef {
            client_id: self.client_id,
            client_index: self.client_index,
        }
    }

    /// Merge `src` into `self` field by field, in place.
    ///
    /// Returns true iff anything actually changed, which callers use to
    /// decide whether to log and notify. The EPG link is local state and is
    /// left untouched.
    pub fn update_entry(&mut self, src: &TimerEntry) -> bool {
        let mut changed = false;

        merge_field(&mut self.client_id, &src.client_id, &mut changed);
        merge_field(&mut self.client_index, &src.client_index, &mut changed);
        merge_field(&mut self.start_utc, &src.start_utc, &mut changed);
        merge_field(&mut self.end_utc, &src.end_utc, &mut changed);
        merge_field(&mut self.channel_number, &src.channel_number, &mut changed);
        merge_field(
            &mut self.client_channel_uid,
            &src.client_channel_uid,
            &mut changed,
        );
        merge_field(&mut self.is_radio, &src.is_radio, &mut changed);
        merge_field(&mut self.priority, &src.priority, &mut changed);
        merge_field(&mut self.lifetime_days, &src.lifetime_days, &mut changed);
        merge_field(&mut self.is_repeating, &src.is_repeating, &mut changed);
        merge_field(&mut self.is_active, &src.is_active, &mut changed);
        merge_field(&mut self.is_recording, &src.is_recording, &mut changed);
        merge_field(&mut self.title, &src.title, &mut changed);
        merge_field(&mut self.summary, &src.summary, &mut changed);
        merge_field(&mut self.path, &src.path, &mut changed);

        changed
    }

    /// Total order used for sorting and "next active timer" selection:
    /// start time ascending, ties broken by client id then client index.
    pub fn compare(&self, other: &TimerEntry) -> Ordering {
        self.start_utc
            .cmp(&other.start_utc)
            .then(self.client_id.cmp(&other.client_id))
            .then(self.client_index.cmp(&other.client_index))
    }

    /// Schedule this timer on its backend client.
    pub fn add_to_client(&self, clients: &dyn TimerClients) -> bool {
        match clients.create_timer(self) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "failed to add timer {} on client {}: {}",
                    self.client_index, self.client_id, e
                );
                false
            }
        }
    }

    /// Delete this timer from its backend client.
    pub fn delete_from_client(&self, clients: &dyn TimerClients, force: bool) -> bool {
        match clients.delete_timer(self, force) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "failed to delete timer {} on client {}: {}",
                    self.client_index, self.client_id, e
                );
                false
            }
        }
    }

    /// Rename this timer on its backend client.
    pub fn rename_on_client(&self, clients: &dyn TimerClients, new_name: &str) -> bool {
        match clients.rename_timer(self, new_name) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "failed to rename timer {} on client {}: {}",
                    self.client_index, self.client_id, e
                );
                false
            }
        }
    }

    /// Push this timer's current fields to its backend client.
    pub fn update_on_client(&self, clients: &dyn TimerClients) -> bool {
        match clients.update_timer(self) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "failed to update timer {} on client {}: {}",
                    self.client_index, self.client_id, e
                );
                false
            }
        }
    }
}
