//! Entry points for the host's detours.
//!
//! Each hook builds the matching [`HostEvent`]; the detour then publishes
//! it on the [`crate::events::EventBus`]. Keeping construction here leaves
//! the detours themselves free of engine types.

use dynmorph_core::types::{CharacterId, KeywordId};

use crate::events::{EquipKind, HostEvent};

/// An armor or apparel item was equipped.
#[must_use]
pub fn on_equip(actor: CharacterId, item: Vec<KeywordId>) -> HostEvent {
    HostEvent::Equip {
        actor,
        item,
        kind: EquipKind::Equip,
    }
}

/// An armor or apparel item was removed.
#[must_use]
pub fn on_unequip(actor: CharacterId, item: Vec<KeywordId>) -> HostEvent {
    HostEvent::Equip {
        actor,
        item,
        kind: EquipKind::Unequip,
    }
}

/// The per-frame update detour.
///
/// The first update a character receives after loading is reported as
/// [`HostEvent::ActorFirstUpdate`].
#[must_use]
pub fn on_actor_update(actor: CharacterId, delta_time: f32, when_ms: u64, first: bool) -> HostEvent {
    if first {
        HostEvent::ActorFirstUpdate {
            actor,
            delta_time,
            when_ms,
        }
    } else {
        HostEvent::ActorUpdate {
            actor,
            delta_time,
            when_ms,
        }
    }
}

/// Game data finished loading.
#[must_use]
pub fn on_game_data_loaded() -> HostEvent {
    HostEvent::GameDataLoaded
}

/// A save game finished loading.
#[must_use]
pub fn on_save_loaded(name: impl Into<String>) -> HostEvent {
    HostEvent::SaveLoaded { name: name.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_is_distinguished() {
        let id = CharacterId(0x14);
        assert!(matches!(
            on_actor_update(id, 0.016, 100, true),
            HostEvent::ActorFirstUpdate { when_ms: 100, .. }
        ));
        assert!(matches!(
            on_actor_update(id, 0.016, 100, false),
            HostEvent::ActorUpdate { when_ms: 100, .. }
        ));
    }

    #[test]
    fn equip_hooks_carry_kind() {
        let id = CharacterId(1);
        assert!(matches!(
            on_unequip(id, vec![KeywordId(5)]),
            HostEvent::Equip { kind: EquipKind::Unequip, .. }
        ));
        assert_eq!(on_equip(id, vec![]).kind_name(), "equip");
        assert_eq!(on_save_loaded("quick").kind_name(), "save_loaded");
    }
}
