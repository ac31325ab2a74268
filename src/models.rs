//! Shared value types: injected settings, display items, change events and
//! the string-resolution capability.

use serde::{Deserialize, Serialize};

use crate::entry::TimerEntry;
use crate::epg::EpgEntry;

/// Fallback instant-recording duration in minutes.
pub const DEFAULT_INSTANT_RECORD_MINUTES: u32 = 180;
/// Fallback timer priority.
pub const DEFAULT_PRIORITY: i32 = 50;
/// Fallback timer lifetime in days.
pub const DEFAULT_LIFETIME_DAYS: i32 = 30;

/// Tunables consumed when an instant timer is created.
///
/// A zero field means "unset" and falls back to the documented default at
/// the point of use, so a half-filled config file still produces sane
/// timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default)]
    pub instant_record_minutes: u32,
    #[serde(default)]
    pub default_priority: i32,
    #[serde(default)]
    pub default_lifetime_days: i32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            instant_record_minutes: DEFAULT_INSTANT_RECORD_MINUTES,
            default_priority: DEFAULT_PRIORITY,
            default_lifetime_days: DEFAULT_LIFETIME_DAYS,
        }
    }
}

impl TimerSettings {
    /// Instant-recording duration with the 180 minute fallback applied.
    pub fn instant_duration_minutes(&self) -> u32 {
        if self.instant_record_minutes == 0 {
            DEFAULT_INSTANT_RECORD_MINUTES
        } else {
            self.instant_record_minutes
        }
    }

    /// Priority with the fallback of 50 applied.
    pub fn priority(&self) -> i32 {
        if self.default_priority == 0 {
            DEFAULT_PRIORITY
        } else {
            self.default_priority
        }
    }

    /// Lifetime in days with the fallback of 30 applied.
    pub fn lifetime_days(&self) -> i32 {
        if self.default_lifetime_days == 0 {
            DEFAULT_LIFETIME_DAYS
        } else {
            self.default_lifetime_days
        }
    }
}

/// Display-ready item handed to the presentation layer.
///
/// An item wraps at most one timer and at most one EPG entry; the synthetic
/// "add timer" entry in a directory listing wraps neither.
#[derive(Debug, Clone, Serialize)]
pub struct ListItem {
    pub path: String,
    pub label: String,
    pub timer: Option<TimerEntry>,
    pub epg: Option<EpgEntry>,
}

impl ListItem {
    /// The synthetic "add new timer" entry shown at the top of the timers
    /// folder.
    pub fn add_timer(base: &str, label: String) -> Self {
        Self {
            path: format!("{}/add.timer", base),
            label,
            timer: None,
            epg: None,
        }
    }

    pub fn from_timer(timer: &TimerEntry) -> Self {
        Self {
            path: timer.path.clone(),
            label: timer.title.clone(),
            timer: Some(timer.clone()),
            epg: None,
        }
    }

    pub fn from_epg(entry: &EpgEntry, path: String, label: String) -> Self {
        Self {
            path,
            label,
            timer: None,
            epg: Some(entry.clone()),
        }
    }

    pub fn is_timer(&self) -> bool {
        self.timer.is_some()
    }
}

/// Event sent to observers when the timer list changes.
#[derive(Debug, Clone, Serialize)]
pub struct TimersEvent {
    pub event_type: String,
}

impl TimersEvent {
    pub fn changed() -> Self {
        Self {
            event_type: "timers-changed".to_string(),
        }
    }
}

/// User-visible strings consumed by the registry.
///
/// The default bodies are plain English; a frontend injects its own
/// implementation to localize them.
pub trait UiStrings: Send + Sync {
    fn add_timer_label(&self) -> String {
        "Add timer...".to_string()
    }

    fn instant_timer_title(&self) -> String {
        "Instant recording".to_string()
    }

    fn timers_not_supported(&self) -> String {
        "The backend for this channel does not support timers".to_string()
    }
}

/// English defaults.
pub struct DefaultStrings;

impl UiStrings for DefaultStrings {}
