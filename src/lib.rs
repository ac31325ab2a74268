//! PVR timer registry
//!
//! Authoritative, thread-safe, in-memory collection of scheduled recording
//! timers, reconciled against the state reported by one or more backend
//! recording clients. The backend clients, EPG store and channel resolver
//! are narrow collaborator traits; everything else (persistence, network
//! protocol, UI) lives outside this crate.

pub mod channels;
pub mod client;
pub mod entry;
pub mod epg;
pub mod models;
pub mod refresh;
pub mod registry;

#[cfg(test)]
pub(crate) mod testutil;

pub use channels::{Channel, ChannelSource};
pub use client::{ClientError, TimerClients};
pub use entry::{TimerEntry, INSTANT_CLIENT_INDEX};
pub use epg::{EpgEntry, EpgEvent, EpgStore, TimerRef};
pub use models::{DefaultStrings, ListItem, TimerSettings, TimersEvent, UiStrings};
pub use refresh::RefreshTask;
pub use registry::TimerRegistry;

/// Initialize logging for timer operations
///
/// When debug_logging is false, only INFO and above is shown
pub fn init_logging(debug_logging: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug_logging {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let subscriber = fmt()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(filter)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
