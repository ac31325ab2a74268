//! The authoritative in-memory collection of scheduled recording timers.
//!
//! One mutex guards the whole sequence plus the "update in progress" flag;
//! every read and write of the sequence goes through it. Change
//! notifications are broadcast only after the lock has been released, since
//! observers are free to call straight back into the query operations.

use std::sync::{Arc, Weak};

use chrono::Local;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, ChannelSource};
use crate::client::{ClientError, TimerClients};
use crate::entry::{TimerEntry, INSTANT_CLIENT_INDEX};
use crate::epg::{EpgEntry, EpgEvent, EpgStore};
use crate::models::{ListItem, TimerSettings, TimersEvent, UiStrings};

/// Path of an instant timer before any client has confirmed it.
const NEW_TIMER_PATH: &str = "pvr://timers/new";

struct Inner {
    timers: Vec<TimerEntry>,
    /// Guards against overlapping reconciliation passes.
    updating: bool,
}

/// Owns every known timer and reconciles the list against the state
/// reported by the backend clients.
pub struct TimerRegistry {
    clients: Arc<dyn TimerClients>,
    epg: Arc<dyn EpgStore>,
    channels: Arc<dyn ChannelSource>,
    strings: Arc<dyn UiStrings>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<TimersEvent>,
    /// Handle back to the owning Arc, for spawning background work.
    weak_self: Weak<TimerRegistry>,
    /// In-flight async refresh; replaced (not joined) on restart.
    refresh_task: Mutex<Option<JoinHandle<bool>>>,
    epg_listener: Mutex<Option<JoinHandle<()>>>,
}

impl TimerRegistry {
    pub fn new(
        clients: Arc<dyn TimerClients>,
        epg: Arc<dyn EpgStore>,
        channels: Arc<dyn ChannelSource>,
        strings: Arc<dyn UiStrings>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new_cyclic(|me| Self {
            clients,
            epg,
            channels,
            strings,
            inner: Mutex::new(Inner {
                timers: Vec::new(),
                updating: false,
            }),
            events,
            weak_self: me.clone(),
            refresh_task: Mutex::new(None),
            epg_listener: Mutex::new(None),
        })
    }

    /// Subscribe to "timers changed" notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TimersEvent> {
        self.events.subscribe()
    }

    /// Clear any existing state, subscribe to EPG change notifications and
    /// run one synchronous reconciliation pass. Returns the timer count.
    ///
    /// Must be called from within a Tokio runtime; the EPG listener runs as
    /// a spawned task until the next `load` replaces it.
    pub fn load(&self) -> usize {
        self.unload();

        // the listener holds a weak handle so it never keeps the registry
        // alive on its own
        let weak = self.weak_self.clone();
        let mut rx = self.epg.subscribe();
        let listener = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(EpgEvent::Changed) => {
                        let Some(registry) = weak.upgrade() else {
                            break;
                        };
                        if tokio::task::spawn_blocking(move || registry.trigger_update(false))
                            .await
                            .is_err()
                        {
                            error!("epg-triggered timer update panicked");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("epg listener lagged, skipped {} notifications", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(prev) = self.epg_listener.lock().replace(listener) {
            prev.abort();
        }

        self.trigger_update(false);
        self.timer_count()
    }

    /// Drop every owned timer, detaching EPG back-references first.
    ///
    /// The EPG subscription stays alive; a later `load` replaces it.
    pub fn unload(&self) {
        let mut inner = self.inner.lock();
        for timer in inner.timers.drain(..) {
            if let Some(epg_id) = timer.epg_id {
                self.epg.set_timer(epg_id, None);
            }
        }
    }

    /// Ask the backend clients for their current timer list.
    ///
    /// The returned snapshot is owned by the caller and discarded after
    /// reconciliation. A hard fetch failure is an `Err`, never an empty
    /// list.
    pub fn fetch_snapshot(&self) -> Result<Vec<TimerEntry>, ClientError> {
        self.clients.fetch_all_timers()
    }

    fn execute_update(&self) -> bool {
        debug!("updating timers");
        match self.fetch_snapshot() {
            Ok(snapshot) => self.reconcile(snapshot),
            Err(e) => {
                // A transient fetch failure must not wipe the registry.
                error!("timer fetch failed, keeping current list: {}", e);
                self.inner.lock().updating = false;
                false
            }
        }
    }

    /// Merge a freshly fetched snapshot into the live list.
    ///
    /// Matching entries are updated in place so their identity survives;
    /// new entries are appended and EPG-linked; entries missing from the
    /// snapshot are removed with their EPG back-reference cleared first.
    /// Local instant timers (`client_index == -1`) are never matched or
    /// removed here. Returns whether anything changed.
    pub fn reconcile(&self, snapshot: Vec<TimerEntry>) -> bool {
        let mut changed = false;
        let mut inner = self.inner.lock();

        for tag in &snapshot {
            if tag.is_instant() {
                debug!("skipping unconfirmed timer in snapshot from client {}", tag.client_id);
                continue;
            }

            let existing = inner
                .timers
                .iter()
                .position(|t| t.client_id == tag.client_id && t.client_index == tag.client_index);
            match existing {
                Some(i) => {
                    if inner.timers[i].update_entry(tag) {
                        changed = true;
                        info!("updated timer {} on client {}", tag.client_index, tag.client_id);
                    }
                }
                None => {
                    let mut added = tag.clone();
                    added.epg_id = None;
                    self.link_epg(&mut added);
                    inner.timers.push(added);
                    changed = true;
                    info!("added timer {} on client {}", tag.client_index, tag.client_id);
                }
            }
        }

        inner.timers.retain(|timer| {
            if timer.is_instant() {
                return true;
            }
            let present = snapshot
                .iter()
                .any(|s| s.client_id == timer.client_id && s.client_index == timer.client_index);
            if !present {
                info!(
                    "deleted timer {} on client {}",
                    timer.client_index, timer.client_id
                );
                if let Some(epg_id) = timer.epg_id {
                    self.epg.set_timer(epg_id, None);
                }
                changed = true;
            }
            present
        });

        inner.updating = false;
        if changed {
            inner.timers.sort_by(|a, b| a.compare(b));
            drop(inner);
            // outside the lock, observers may re-enter the registry
            let _ = self.events.send(TimersEvent::changed());
        }

        changed
    }

    /// Upsert a single timer pushed by a backend client, without a full
    /// refetch.
    ///
    /// The matching `(client_id, client_index)` entry is merged in place;
    /// an unknown pair appends a new, EPG-linked entry. Re-sorts and
    /// notifies observers when anything changed.
    pub fn update_entry(&self, timer: &TimerEntry) -> bool {
        let changed;
        {
            let mut inner = self.inner.lock();
            let existing = inner.timers.iter().position(|t| {
                t.client_id == timer.client_id && t.client_index == timer.client_index
            });
            changed = match existing {
                Some(i) => {
                    if inner.timers[i].update_entry(timer) {
                        info!(
                            "updated timer {} on client {}",
                            timer.client_index, timer.client_id
                        );
                        true
                    } else {
                        false
                    }
                }
                None => {
                    let mut added = timer.clone();
                    added.epg_id = None;
                    self.link_epg(&mut added);
                    inner.timers.push(added);
                    info!(
                        "added timer {} on client {}",
                        timer.client_index, timer.client_id
                    );
                    true
                }
            };
            if changed {
                inner.timers.sort_by(|a, b| a.compare(b));
            }
        }
        if changed {
            let _ = self.events.send(TimersEvent::changed());
        }
        changed
    }

    /// Kick off a reconciliation.
    ///
    /// Returns false without doing anything if a pass is already in
    /// progress. When `asynchronous`, the previous refresh task is
    /// cancelled and replaced, and false is returned immediately (callers
    /// re-query later); otherwise the fetch and merge run inline and their
    /// result is returned.
    pub fn trigger_update(&self, asynchronous: bool) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.updating {
                return false;
            }
            inner.updating = true;
        }

        if asynchronous {
            let Some(registry) = self.weak_self.upgrade() else {
                self.inner.lock().updating = false;
                return false;
            };
            let mut slot = self.refresh_task.lock();
            if let Some(prev) = slot.take() {
                prev.abort();
            }
            *slot = Some(tokio::task::spawn_blocking(move || registry.execute_update()));
            false
        } else {
            self.execute_update()
        }
    }

    /// Whether any owned timer is currently recording.
    pub fn is_recording(&self) -> bool {
        self.inner.lock().timers.iter().any(|t| t.is_recording)
    }

    pub fn timer_count(&self) -> usize {
        self.inner.lock().timers.len()
    }

    /// All timers as display-ready items.
    pub fn get_timers(&self) -> Vec<ListItem> {
        self.inner
            .lock()
            .timers
            .iter()
            .map(ListItem::from_timer)
            .collect()
    }

    /// The active timer that starts first, by the entry total order.
    pub fn next_active_timer(&self) -> Option<TimerEntry> {
        self.inner
            .lock()
            .timers
            .iter()
            .filter(|t| t.is_active)
            .min_by(|a, b| a.compare(b))
            .cloned()
    }

    /// Append every active timer to `out`; returns how many were appended.
    pub fn active_timers(&self, out: &mut Vec<TimerEntry>) -> usize {
        let inner = self.inner.lock();
        let before = out.len();
        for timer in inner.timers.iter().filter(|t| t.is_active) {
            out.push(timer.clone());
        }
        out.len() - before
    }

    /// Directory listing for a virtual path ending in a `timers` segment:
    /// one synthetic "add timer" entry followed by every timer. Returns
    /// false, leaving `items` untouched, for any other path.
    pub fn get_directory(&self, path: &str, items: &mut Vec<ListItem>) -> bool {
        let base = path.trim_end_matches('/');
        let segment = base.rsplit('/').next().unwrap_or(base);
        if segment != "timers" {
            return false;
        }

        items.push(ListItem::add_timer(base, self.strings.add_timer_label()));
        let inner = self.inner.lock();
        for timer in &inner.timers {
            items.push(ListItem::from_timer(timer));
        }
        true
    }

    /// Whether any timer is set on `channel` (number and radio flag match).
    pub fn channel_has_timers(&self, channel: &Channel) -> bool {
        self.inner
            .lock()
            .timers
            .iter()
            .any(|t| t.channel_number == channel.number && t.is_radio == channel.is_radio)
    }

    /// Delete every timer on `channel`, subject to the filters.
    ///
    /// With `active_only`, timers whose local window does not contain the
    /// current time are skipped; with `delete_repeating` false, repeating
    /// timers are skipped. A timer is removed locally only when the backend
    /// deletion succeeds. Returns true iff at least one deletion succeeded.
    pub fn delete_timers_on_channel(
        &self,
        channel: &Channel,
        delete_repeating: bool,
        active_only: bool,
    ) -> bool {
        let now = Local::now();
        let candidates: Vec<TimerEntry> = {
            let inner = self.inner.lock();
            inner
                .timers
                .iter()
                .filter(|timer| {
                    if active_only && (now < timer.start_local() || now > timer.end_local()) {
                        return false;
                    }
                    if !delete_repeating && timer.is_repeating {
                        return false;
                    }
                    timer.channel_number == channel.number && timer.is_radio == channel.is_radio
                })
                .cloned()
                .collect()
        };

        // backend I/O outside the lock, readers stay unblocked
        let mut confirmed: Vec<(i32, i32)> = Vec::new();
        for timer in &candidates {
            if timer.delete_from_client(self.clients.as_ref(), true) {
                confirmed.push((timer.client_id, timer.client_index));
            } else {
                warn!(
                    "backend kept timer {} on client {}, leaving local entry in place",
                    timer.client_index, timer.client_id
                );
            }
        }
        if confirmed.is_empty() {
            return false;
        }

        let mut inner = self.inner.lock();
        inner.timers.retain(|timer| {
            if confirmed.contains(&(timer.client_id, timer.client_index)) {
                if let Some(epg_id) = timer.epg_id {
                    self.epg.set_timer(epg_id, None);
                }
                false
            } else {
                true
            }
        });

        true
    }

    /// Create a "record now" timer on `channel`, falling back to the
    /// current channel and then the first TV channel.
    ///
    /// Duration, priority and lifetime come from `settings` with the
    /// documented fallbacks. When `start_timer` is set the timer is
    /// registered with the backend before insertion and discarded if that
    /// fails; on success the channel is marked as recording.
    pub fn instant_timer(
        &self,
        channel: Option<Channel>,
        start_timer: bool,
        settings: &TimerSettings,
    ) -> Option<TimerEntry> {
        let channel = channel
            .or_else(|| self.channels.current_channel())
            .or_else(|| self.channels.first_tv_channel())?;

        let now = chrono::Utc::now();
        let mut timer = TimerEntry {
            client_id: channel.client_id,
            client_index: INSTANT_CLIENT_INDEX,
            start_utc: now,
            end_utc: now,
            channel_number: channel.number,
            client_channel_uid: channel.unique_id,
            is_radio: channel.is_radio,
            priority: settings.priority(),
            lifetime_days: settings.lifetime_days(),
            is_repeating: false,
            is_active: true,
            is_recording: false,
            title: self.strings.instant_timer_title(),
            summary: String::new(),
            path: NEW_TIMER_PATH.to_string(),
            epg_id: None,
        };
        timer.set_duration(settings.instant_duration_minutes() as i64);
        timer.summary = format!(
            "{} from {} to {}",
            timer.start_local().format("%Y-%m-%d"),
            timer.start_local().format("%H:%M"),
            timer.end_local().format("%H:%M"),
        );

        if start_timer && !timer.add_to_client(self.clients.as_ref()) {
            error!("unable to add an instant timer on the client");
            return None;
        }

        {
            let mut inner = self.inner.lock();
            inner.timers.push(timer.clone());
            inner.timers.sort_by(|a, b| a.compare(b));
        }
        if start_timer {
            self.channels.set_recording(&channel, true);
        }

        Some(timer)
    }

    fn timer_of<'a>(item: &'a ListItem, op: &str) -> Option<&'a TimerEntry> {
        let tag = item.timer.as_ref();
        if tag.is_none() {
            error!("{}: item does not wrap a timer", op);
        }
        tag
    }

    /// Schedule the timer wrapped by `item` on its backend client.
    pub fn add_timer(&self, item: &ListItem) -> bool {
        let Some(tag) = Self::timer_of(item, "add_timer") else {
            return false;
        };
        if !self.clients.supports_timers(tag.client_id) {
            error!("{}", self.strings.timers_not_supported());
            return false;
        }
        tag.add_to_client(self.clients.as_ref())
    }

    /// Delete the timer wrapped by `item` from its backend client.
    pub fn delete_timer(&self, item: &ListItem, force: bool) -> bool {
        let Some(tag) = Self::timer_of(item, "delete_timer") else {
            return false;
        };
        tag.delete_from_client(self.clients.as_ref(), force)
    }

    /// Rename the timer wrapped by `item` on its backend client.
    pub fn rename_timer(&self, item: &ListItem, new_name: &str) -> bool {
        let Some(tag) = Self::timer_of(item, "rename_timer") else {
            return false;
        };
        tag.rename_on_client(self.clients.as_ref(), new_name)
    }

    /// Push the timer wrapped by `item` to its backend client.
    pub fn update_timer(&self, item: &ListItem) -> bool {
        let Some(tag) = Self::timer_of(item, "update_timer") else {
            return false;
        };
        tag.update_on_client(self.clients.as_ref())
    }

    /// First timer matching the `(client_id, client_index)` pair.
    pub fn get_by_client(&self, client_id: i32, client_index: i32) -> Option<TimerEntry> {
        self.inner
            .lock()
            .timers
            .iter()
            .find(|t| t.client_id == client_id && t.client_index == client_index)
            .cloned()
    }

    /// First timer whose channel matches the EPG entry's and whose window
    /// fully contains the EPG entry's window.
    pub fn get_match(&self, epg: &EpgEntry) -> Option<TimerEntry> {
        self.inner
            .lock()
            .timers
            .iter()
            .find(|t| {
                t.channel_number == epg.channel_number
                    && t.is_radio == epg.is_radio
                    && t.start_utc <= epg.start_utc
                    && t.end_utc >= epg.end_utc
            })
            .cloned()
    }

    /// `get_match` for the EPG entry wrapped by a display item, if any.
    pub fn get_match_item(&self, item: &ListItem) -> Option<TimerEntry> {
        item.epg.as_ref().and_then(|epg| self.get_match(epg))
    }

    fn link_epg(&self, timer: &mut TimerEntry) {
        if timer.epg_id.is_some() {
            return;
        }
        let channel = Channel {
            client_id: timer.client_id,
            unique_id: timer.client_channel_uid,
            number: timer.channel_number,
            name: String::new(),
            is_radio: timer.is_radio,
        };
        if let Some(epg) = self.epg.find_entry(&channel, timer.start_utc, timer.end_utc) {
            self.epg.set_timer(epg.id, Some(timer.timer_ref()));
            timer.epg_id = Some(epg.id);
        }
    }
}
