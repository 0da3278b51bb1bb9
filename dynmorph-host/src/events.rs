//! Host events and the bus that delivers them.
//!
//! The host's detours publish typed [`HostEvent`]s; anything interested
//! registers a closure with [`EventBus::subscribe`]. Delivery is
//! synchronous on the publishing thread, in subscription order.

use std::fmt;
use std::sync::Arc;

use dynmorph_core::types::{CharacterId, KeywordId};
use parking_lot::RwLock;

/// Whether an item went on or came off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipKind {
    /// Item equipped.
    Equip,
    /// Item removed.
    Unequip,
}

/// An event observed in the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A character equipped or removed an armor or apparel item.
    Equip {
        /// Character whose equipment changed.
        actor: CharacterId,
        /// Keywords carried by the item.
        item: Vec<KeywordId>,
        /// Equip or unequip.
        kind: EquipKind,
    },

    /// The host's per-frame update of one character.
    ActorUpdate {
        /// Character being updated.
        actor: CharacterId,
        /// Frame time in seconds.
        delta_time: f32,
        /// Host timestamp in milliseconds.
        when_ms: u64,
    },

    /// The first update of a character after it was loaded.
    ActorFirstUpdate {
        /// Character being updated.
        actor: CharacterId,
        /// Frame time in seconds.
        delta_time: f32,
        /// Host timestamp in milliseconds.
        when_ms: u64,
    },

    /// Game data (forms, plugins) finished loading.
    GameDataLoaded,

    /// A save game finished loading.
    SaveLoaded {
        /// Save name as reported by the host.
        name: String,
    },
}

impl HostEvent {
    /// The character this event concerns, if any.
    #[must_use]
    pub fn actor(&self) -> Option<CharacterId> {
        match self {
            Self::Equip { actor, .. }
            | Self::ActorUpdate { actor, .. }
            | Self::ActorFirstUpdate { actor, .. } => Some(*actor),
            Self::GameDataLoaded | Self::SaveLoaded { .. } => None,
        }
    }

    /// Short name for logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Equip { kind: EquipKind::Equip, .. } => "equip",
            Self::Equip { kind: EquipKind::Unequip, .. } => "unequip",
            Self::ActorUpdate { .. } => "actor_update",
            Self::ActorFirstUpdate { .. } => "actor_first_update",
            Self::GameDataLoaded => "game_data_loaded",
            Self::SaveLoaded { .. } => "save_loaded",
        }
    }
}

// ---------------------------------------------------------------------------
// Event Bus
// ---------------------------------------------------------------------------

type Subscriber = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// Publish/subscribe hub for [`HostEvent`]s.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    /// Bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler called for every published event.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&HostEvent) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(handler));
    }

    /// Deliver `event` to every subscriber registered when it was published.
    ///
    /// Handlers run without the subscriber lock held, so they may subscribe
    /// or publish themselves.
    pub fn publish(&self, event: &HostEvent) {
        let subscribers = self.subscribers.read().clone();
        for subscriber in &subscribers {
            subscriber(event);
        }
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribers_see_every_event_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        bus.subscribe(move |e| log.lock().push(e.kind_name()));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        bus.publish(&HostEvent::GameDataLoaded);
        bus.publish(&HostEvent::Equip {
            actor: CharacterId(7),
            item: vec![],
            kind: EquipKind::Unequip,
        });

        assert_eq!(bus.len(), 2);
        assert_eq!(*seen.lock(), vec!["game_data_loaded", "unequip"]);
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn handlers_may_subscribe_while_handling() {
        let bus = Arc::new(EventBus::new());
        let late = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&bus);
        let counter = Arc::clone(&late);
        bus.subscribe(move |event| {
            if matches!(event, HostEvent::GameDataLoaded)
                && let Some(bus) = weak.upgrade()
            {
                let counter = Arc::clone(&counter);
                bus.subscribe(move |_| {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        });

        bus.publish(&HostEvent::GameDataLoaded);
        assert_eq!(bus.len(), 2);
        assert_eq!(late.load(Ordering::Relaxed), 0);

        bus.publish(&HostEvent::SaveLoaded { name: "quick".into() });
        assert_eq!(late.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn actor_of_event() {
        let update = HostEvent::ActorUpdate {
            actor: CharacterId(3),
            delta_time: 0.016,
            when_ms: 10,
        };
        assert_eq!(update.actor(), Some(CharacterId(3)));
        assert_eq!(HostEvent::GameDataLoaded.actor(), None);
    }
}
