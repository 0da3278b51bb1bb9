//! Core type definitions shared across the engine.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Stable host identifier of a character (the host's form ID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub u32);

impl CharacterId {
    /// The player reference in the host's ID scheme.
    pub const PLAYER: Self = Self(0x14);
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// Resolved handle of an actor attribute (actor value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeId(pub u32);

/// Resolved handle of a keyword form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeywordId(pub u32);

/// Character archetype (race) identified by its editor ID.
///
/// The editor ID doubles as the rule-set folder name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchetypeId(Arc<str>);

impl ArchetypeId {
    /// Wrap an editor ID.
    #[must_use]
    pub fn new(editor_id: &str) -> Self {
        Self(Arc::from(editor_id))
    }

    /// The editor ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArchetypeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Character sex, the second half of a rule-set key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
}

impl Sex {
    /// Both sexes, in load order.
    pub const ALL: [Self; 2] = [Self::Male, Self::Female];

    /// Folder name used by the rule-set directory convention.
    #[must_use]
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// Match a folder name case-insensitively.
    #[must_use]
    pub fn from_folder_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sex| name.eq_ignore_ascii_case(sex.folder_name()))
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Registry key: one rule set per archetype and sex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleSetKey {
    /// Archetype (race).
    pub archetype: ArchetypeId,
    /// Sex.
    pub sex: Sex,
}

impl RuleSetKey {
    /// Build a key.
    #[must_use]
    pub fn new(archetype: ArchetypeId, sex: Sex) -> Self {
        Self { archetype, sex }
    }
}

impl fmt::Display for RuleSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.archetype, self.sex)
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// The three fixed weight slots of a character model.
///
/// Every other channel name lives in the open-ended shape-blend map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightChannel {
    /// `Overweight`, the fat slot.
    Overweight,
    /// `Strong`, the muscular slot.
    Strong,
    /// `Thin`, the thin slot.
    Thin,
}

impl WeightChannel {
    /// All weight slots.
    pub const ALL: [Self; 3] = [Self::Overweight, Self::Strong, Self::Thin];

    /// Channel name of this slot.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Overweight => "Overweight",
            Self::Strong => "Strong",
            Self::Thin => "Thin",
        }
    }

    /// Resolve a channel name to a weight slot (exact match).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.name() == name)
    }
}

/// One evaluated rule-set entry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MorphResult {
    /// The value replaces the channel (setter) rather than offsetting it.
    pub is_setter: bool,
    /// Evaluated value.
    pub value: f32,
}

/// Distance measure used by [`crate::session::MorphSession::diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// Largest absolute change of any channel.
    #[default]
    MaxNorm,
    /// Sum of absolute changes.
    L1Norm,
    /// Euclidean length of the change vector.
    L2Norm,
}
