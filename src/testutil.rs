//! Mock collaborators shared by the registry and refresh tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::channels::{Channel, ChannelSource};
use crate::client::{ClientError, TimerClients};
use crate::entry::TimerEntry;
use crate::epg::{EpgEntry, EpgEvent, EpgStore, TimerRef};
use crate::models::DefaultStrings;
use crate::registry::TimerRegistry;

pub(crate) fn tag(client_id: i32, client_index: i32, start_hour: u32) -> TimerEntry {
    let start = Utc.with_ymd_and_hms(2026, 3, 14, start_hour, 0, 0).unwrap();
    tag_at(client_id, client_index, start)
}

pub(crate) fn tag_at(client_id: i32, client_index: i32, start: DateTime<Utc>) -> TimerEntry {
    TimerEntry {
        client_id,
        client_index,
        start_utc: start,
        end_utc: start + Duration::hours(1),
        channel_number: 3,
        client_channel_uid: 1003,
        is_radio: false,
        priority: 50,
        lifetime_days: 30,
        is_repeating: false,
        is_active: true,
        is_recording: false,
        title: format!("timer {}/{}", client_id, client_index),
        summary: String::new(),
        path: format!("pvr://timers/{}/{}", client_id, client_index),
        epg_id: None,
    }
}

pub(crate) fn channel(number: i32) -> Channel {
    Channel {
        client_id: 1,
        unique_id: 1000 + number,
        number,
        name: format!("Channel {}", number),
        is_radio: false,
    }
}

#[derive(Default)]
pub(crate) struct MockClients {
    pub remote: Mutex<Vec<TimerEntry>>,
    pub fetches: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub created: Mutex<Vec<TimerEntry>>,
    pub deleted: Mutex<Vec<TimerRef>>,
    pub renamed: Mutex<Vec<(TimerRef, String)>>,
    pub updated: Mutex<Vec<TimerRef>>,
    pub unsupported: Mutex<Vec<i32>>,
}

impl TimerClients for MockClients {
    fn fetch_all_timers(&self) -> Result<Vec<TimerEntry>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ClientError::Fetch("backend offline".to_string()));
        }
        Ok(self.remote.lock().clone())
    }

    fn create_timer(&self, timer: &TimerEntry) -> Result<(), ClientError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Call("create rejected".to_string()));
        }
        self.created.lock().push(timer.clone());
        Ok(())
    }

    fn delete_timer(&self, timer: &TimerEntry, _force: bool) -> Result<(), ClientError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ClientError::Call("delete rejected".to_string()));
        }
        self.deleted.lock().push(timer.timer_ref());
        Ok(())
    }

    fn rename_timer(&self, timer: &TimerEntry, new_name: &str) -> Result<(), ClientError> {
        self.renamed
            .lock()
            .push((timer.timer_ref(), new_name.to_string()));
        Ok(())
    }

    fn update_timer(&self, timer: &TimerEntry) -> Result<(), ClientError> {
        self.updated.lock().push(timer.timer_ref());
        Ok(())
    }

    fn supports_timers(&self, client_id: i32) -> bool {
        !self.unsupported.lock().contains(&client_id)
    }
}

pub(crate) struct MockEpg {
    pub entries: Mutex<Vec<EpgEntry>>,
    pub set_calls: Mutex<Vec<(i64, Option<TimerRef>)>>,
    pub tx: broadcast::Sender<EpgEvent>,
}

impl Default for MockEpg {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self {
            entries: Mutex::new(Vec::new()),
            set_calls: Mutex::new(Vec::new()),
            tx,
        }
    }
}

impl EpgStore for MockEpg {
    fn subscribe(&self) -> broadcast::Receiver<EpgEvent> {
        self.tx.subscribe()
    }

    fn find_entry(
        &self,
        channel: &Channel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<EpgEntry> {
        self.entries
            .lock()
            .iter()
            .find(|e| {
                e.channel_number == channel.number
                    && e.is_radio == channel.is_radio
                    && e.start_utc >= start
                    && e.end_utc <= end
            })
            .cloned()
    }

    fn set_timer(&self, epg_id: i64, timer: Option<TimerRef>) {
        self.set_calls.lock().push((epg_id, timer));
    }
}

#[derive(Default)]
pub(crate) struct MockChannels {
    pub current: Mutex<Option<Channel>>,
    pub first_tv: Mutex<Option<Channel>>,
    pub recording: Mutex<Vec<(i32, bool)>>,
}

impl ChannelSource for MockChannels {
    fn current_channel(&self) -> Option<Channel> {
        self.current.lock().clone()
    }

    fn first_tv_channel(&self) -> Option<Channel> {
        self.first_tv.lock().clone()
    }

    fn set_recording(&self, channel: &Channel, recording: bool) {
        self.recording.lock().push((channel.unique_id, recording));
    }
}

pub(crate) struct Harness {
    pub registry: Arc<TimerRegistry>,
    pub clients: Arc<MockClients>,
    pub epg: Arc<MockEpg>,
    pub channels: Arc<MockChannels>,
}

pub(crate) fn harness() -> Harness {
    let clients = Arc::new(MockClients::default());
    let epg = Arc::new(MockEpg::default());
    let channels = Arc::new(MockChannels::default());
    let registry = TimerRegistry::new(
        clients.clone(),
        epg.clone(),
        channels.clone(),
        Arc::new(DefaultStrings),
    );
    Harness {
        registry,
        clients,
        epg,
        channels,
    }
}

/// Poll `condition` until it holds or a few seconds elapse.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(25)).await;
    }
    panic!("condition not met in time");
}
