//! Decides when a character is re-evaluated.
//!
//! The host calls in from many threads at once: one update per live
//! character per frame, plus equip notifications from wherever the
//! equipment change happened. The scheduler turns that stream into at most
//! one re-evaluation per character at a time:
//!
//! - an equip change marks a watched character *pending*; it re-evaluates
//!   on its next update
//! - otherwise a watched character re-evaluates at most once per
//!   `actor_interval_ms`
//! - the menu preview character re-evaluates every `menu_actor_interval_ms`
//!   whether or not it is watched
//!
//! The watchlist, the pending set and the in-flight set each have their
//! own mutex and no two are held together.

use std::collections::{HashMap, HashSet};

use dynmorph_core::metrics::spans;
use dynmorph_core::types::CharacterId;
use parking_lot::Mutex;
use tracing::{debug, trace, trace_span};

use crate::config::SchedulerConfig;

/// Result of offering a character an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not watched, or not due yet.
    Skipped,
    /// Another thread is already re-evaluating this character.
    Busy,
    /// Re-evaluation ran; `changed` is what it returned.
    Evaluated {
        /// Whether a visual refresh is warranted.
        changed: bool,
    },
}

impl TickOutcome {
    /// Whether the re-evaluation ran and reported a change.
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Evaluated { changed: true })
    }
}

/// Per-character debounce and mutual exclusion.
pub struct ReevaluationScheduler {
    config: SchedulerConfig,
    /// Watched characters and the time of their last re-evaluation.
    watchlist: Mutex<HashMap<CharacterId, Option<u64>>>,
    pending: Mutex<HashSet<CharacterId>>,
    in_flight: Mutex<HashSet<CharacterId>>,
    menu_actor: Mutex<Option<(CharacterId, Option<u64>)>>,
}

impl ReevaluationScheduler {
    /// Scheduler with the player watched if configured.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let scheduler = Self {
            watchlist: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashSet::new()),
            menu_actor: Mutex::new(None),
            config,
        };
        if scheduler.config.watch_player {
            scheduler.watch(scheduler.config.player());
        }
        scheduler
    }

    /// Scheduling intervals.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Watchlist
    // -----------------------------------------------------------------------

    /// Start tracking `id`. It re-evaluates on its next update.
    pub fn watch(&self, id: CharacterId) {
        self.watchlist.lock().entry(id).or_insert(None);
        self.pending.lock().insert(id);
        debug!(character = %id, "Watching");
    }

    /// Stop tracking `id`.
    pub fn unwatch(&self, id: CharacterId) {
        self.watchlist.lock().remove(&id);
        self.pending.lock().remove(&id);
        debug!(character = %id, "Unwatched");
    }

    /// Whether `id` is on the watchlist.
    #[must_use]
    pub fn is_watched(&self, id: CharacterId) -> bool {
        self.watchlist.lock().contains_key(&id)
    }

    /// Whether `id` waits for its next update.
    #[must_use]
    pub fn is_pending(&self, id: CharacterId) -> bool {
        self.pending.lock().contains(&id)
    }

    /// Watched characters in ID order.
    #[must_use]
    pub fn watched(&self) -> Vec<CharacterId> {
        let mut ids: Vec<CharacterId> = self.watchlist.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Designate the menu preview character, or clear it.
    pub fn set_menu_actor(&self, id: Option<CharacterId>) {
        *self.menu_actor.lock() = id.map(|id| (id, None));
    }

    /// The menu preview character.
    #[must_use]
    pub fn menu_actor(&self) -> Option<CharacterId> {
        self.menu_actor.lock().map(|(id, _)| id)
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Equipment of `id` changed. Returns whether it was marked pending.
    pub fn notify_equip_changed(&self, id: CharacterId) -> bool {
        if !self.is_watched(id) {
            return false;
        }
        self.pending.lock().insert(id);
        trace!(character = %id, "Marked pending");
        true
    }

    /// Periodic update of `id` at `now_ms`. Runs `reevaluate` if due.
    pub fn notify_periodic_tick<F>(&self, id: CharacterId, now_ms: u64, reevaluate: F) -> TickOutcome
    where
        F: FnOnce() -> bool,
    {
        let _span = trace_span!(spans::SCHEDULER_TICK, character = %id, now_ms).entered();
        if !self.take_due(id, now_ms) {
            return TickOutcome::Skipped;
        }
        self.run_exclusive(id, reevaluate)
    }

    /// First update of `id` after loading. Watched characters re-evaluate
    /// immediately.
    pub fn notify_first_update<F>(&self, id: CharacterId, now_ms: u64, reevaluate: F) -> TickOutcome
    where
        F: FnOnce() -> bool,
    {
        {
            let mut watchlist = self.watchlist.lock();
            let Some(last) = watchlist.get_mut(&id) else {
                return TickOutcome::Skipped;
            };
            *last = Some(now_ms);
        }
        self.pending.lock().remove(&id);
        self.run_exclusive(id, reevaluate)
    }

    /// Whether `id` should re-evaluate now. Consumes its pending flag and
    /// stamps the evaluation time when it should.
    fn take_due(&self, id: CharacterId, now_ms: u64) -> bool {
        {
            let mut menu = self.menu_actor.lock();
            if let Some((menu_id, last)) = menu.as_mut()
                && *menu_id == id
            {
                if !is_due(*last, now_ms, self.config.menu_actor_interval_ms) {
                    return false;
                }
                *last = Some(now_ms);
                return true;
            }
        }

        if !self.is_watched(id) {
            return false;
        }
        let was_pending = self.pending.lock().remove(&id);

        let mut watchlist = self.watchlist.lock();
        let Some(last) = watchlist.get_mut(&id) else {
            return false;
        };
        if was_pending || is_due(*last, now_ms, self.config.actor_interval_ms) {
            *last = Some(now_ms);
            return true;
        }
        false
    }

    /// Run `reevaluate` unless `id` is already being re-evaluated.
    fn run_exclusive<F>(&self, id: CharacterId, reevaluate: F) -> TickOutcome
    where
        F: FnOnce() -> bool,
    {
        if !self.in_flight.lock().insert(id) {
            // Keep the request alive for the next update.
            if self.is_watched(id) {
                self.pending.lock().insert(id);
            }
            trace!(character = %id, "Re-evaluation already in flight");
            return TickOutcome::Busy;
        }
        let _guard = InFlight { set: &self.in_flight, id };
        let changed = reevaluate();
        trace!(character = %id, changed, "Re-evaluation finished");
        TickOutcome::Evaluated { changed }
    }
}

fn is_due(last: Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    last.is_none_or(|last| now_ms.saturating_sub(last) >= interval_ms)
}

/// Clears the in-flight mark even if re-evaluation panics.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<CharacterId>>,
    id: CharacterId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}
