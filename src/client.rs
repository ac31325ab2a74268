//! Backend-client collaborator boundary.
//!
//! A `TimerClients` implementation fronts one or more physical or network
//! tuner sources. The registry never talks to a backend any other way.

use thiserror::Error;

use crate::entry::TimerEntry;

/// Failure from a backend timer call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client {0} does not support timers")]
    Unsupported(i32),
    #[error("backend call failed: {0}")]
    Call(String),
    #[error("failed to fetch timers: {0}")]
    Fetch(String),
}

/// Collection of backend recording clients, keyed internally by client id.
///
/// `fetch_all_timers` must report a hard fetch failure as `Err` rather than
/// an empty list; the registry treats the two very differently during
/// reconciliation.
pub trait TimerClients: Send + Sync {
    /// Current timer list across all clients.
    fn fetch_all_timers(&self) -> Result<Vec<TimerEntry>, ClientError>;

    /// Schedule a new timer on the client identified by `timer.client_id`.
    fn create_timer(&self, timer: &TimerEntry) -> Result<(), ClientError>;

    /// Delete a timer. `force` overrides "timer is currently active"
    /// protections on the backend.
    fn delete_timer(&self, timer: &TimerEntry, force: bool) -> Result<(), ClientError>;

    /// Rename a timer on its client.
    fn rename_timer(&self, timer: &TimerEntry, new_name: &str) -> Result<(), ClientError>;

    /// Push a full-field update of a timer to its client.
    fn update_timer(&self, timer: &TimerEntry) -> Result<(), ClientError>;

    /// Whether the given client supports timer scheduling at all.
    fn supports_timers(&self, client_id: i32) -> bool;
}
