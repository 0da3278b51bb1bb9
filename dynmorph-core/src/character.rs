//! Interfaces to the host game.
//!
//! The engine never touches host memory directly. Everything it reads or
//! writes goes through these two traits, implemented by the host adapter:
//!
//! - [`CharacterModel`] — one live character: signals in, channel values out
//! - [`FormLookup`] — load-time resolution of editor IDs to host handles

use crate::types::{ArchetypeId, AttributeId, CharacterId, KeywordId, Sex};

/// A live character as seen by the engine.
///
/// Implementations use interior mutability for channel writes; the engine
/// only ever holds a shared reference for the duration of one evaluation.
pub trait CharacterModel {
    /// Stable host identifier.
    fn id(&self) -> CharacterId;

    /// Archetype and sex, or `None` if the model data is unavailable.
    fn archetype_and_sex(&self) -> Option<(ArchetypeId, Sex)>;

    /// Current value of an actor attribute.
    fn attribute(&self, attribute: AttributeId) -> f64;

    /// Whether any worn item carries `keyword`.
    fn has_worn_keyword(&self, keyword: KeywordId) -> bool;

    /// Whether the character's own record carries `keyword`.
    fn has_innate_keyword(&self, keyword: KeywordId) -> bool;

    /// Every keyword carried by worn items.
    fn worn_keywords(&self) -> Vec<KeywordId> {
        Vec::new()
    }

    /// Current value of one channel; `0.0` when absent.
    fn channel(&self, name: &str) -> f32;

    /// All channels (fixed weight slots first, then shape blends), or
    /// `None` when the character has no readable model data.
    fn read_channels(&self) -> Option<Vec<(String, f32)>>;

    /// Write one channel.
    fn set_channel(&self, name: &str, value: f32);

    /// Write several channels in one critical section.
    fn write_channels(&self, batch: &[(String, f32)]) {
        for (name, value) in batch {
            self.set_channel(name, *value);
        }
    }

    /// Ask the host to rebuild the character's visuals. Fire and forget.
    fn request_visual_refresh(&self);
}

/// Load-time lookup of host forms by editor ID.
pub trait FormLookup: Send + Sync {
    /// Resolve an actor-value editor ID.
    fn attribute(&self, editor_id: &str) -> Option<AttributeId>;

    /// Resolve a keyword editor ID.
    fn keyword(&self, editor_id: &str) -> Option<KeywordId>;

    /// Whether `editor_id` names an archetype (race).
    fn archetype_exists(&self, editor_id: &str) -> bool;

    /// Editor ID of a keyword form.
    fn keyword_editor_id(&self, _keyword: KeywordId) -> Option<String> {
        None
    }

    /// Morph script attached to a keyword form.
    fn keyword_script(&self, _keyword: KeywordId) -> Option<String> {
        None
    }
}
