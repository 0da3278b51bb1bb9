//! Aliases: named readouts of live character signals.
//!
//! An alias binds a name visible to rule expressions to a value slot and a
//! [`AliasSource`] that refreshes the slot from a character. Two aliases
//! that read the same signal share one slot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::character::{CharacterModel, FormLookup};
use crate::symbol::Symbol;
use crate::types::{AttributeId, KeywordId};

// ---------------------------------------------------------------------------
// Alias Kind
// ---------------------------------------------------------------------------

/// Which signal families an alias may resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AliasKind {
    /// An actor attribute (actor value).
    ActorValue,
    /// A keyword carried by a worn item.
    WornKeyword,
    /// A keyword carried by the character record itself.
    NpcKeyword,
    /// Another morph channel.
    Morph,
    /// Try every family in priority order.
    Any,
}

impl AliasKind {
    /// Concrete kinds in resolution priority order.
    pub const PRIORITY: [Self; 4] = [
        Self::ActorValue,
        Self::WornKeyword,
        Self::NpcKeyword,
        Self::Morph,
    ];

    /// Whether a request for `self` permits resolving as `other`.
    #[must_use]
    pub fn includes(self, other: Self) -> bool {
        self == Self::Any || other == Self::Any || self == other
    }

    /// Parse the `Type` field of a rule script. Unknown names yield `None`.
    #[must_use]
    pub fn from_script_name(name: &str) -> Option<Self> {
        match name {
            "actorValue" => Some(Self::ActorValue),
            "wornKeyword" => Some(Self::WornKeyword),
            "npcKeyword" => Some(Self::NpcKeyword),
            "morph" => Some(Self::Morph),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ActorValue => "ActorValue",
            Self::WornKeyword => "WornKeyword",
            Self::NpcKeyword => "Keyword",
            Self::Morph => "Morph",
            Self::Any => "Any",
        }
    }

    /// Human-readable list of the resolutions a request attempts,
    /// e.g. `ActorValue/Keyword`.
    #[must_use]
    pub fn attempted(self) -> String {
        let labels: Vec<&str> = Self::PRIORITY
            .iter()
            .filter(|k| self.includes(**k))
            .map(|k| k.label())
            .collect();
        labels.join("/")
    }
}

impl fmt::Display for AliasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Alias Source
// ---------------------------------------------------------------------------

/// Resolved acquisition function of an alias.
#[derive(Debug, Clone, PartialEq)]
pub enum AliasSource {
    /// Attribute value.
    Attribute(AttributeId),
    /// `1.0` if a worn item carries the keyword, else `0.0`.
    WornKeyword(KeywordId),
    /// `1.0` if the character record carries the keyword, else `0.0`.
    InnateKeyword(KeywordId),
    /// Current value of a morph channel.
    Morph(String),
}

impl AliasSource {
    /// Resolve `reference` against the kinds `requested` permits, in
    /// priority order. The first successful lookup wins.
    #[must_use]
    pub fn resolve(
        reference: &str,
        requested: AliasKind,
        forms: &dyn FormLookup,
    ) -> Option<(AliasKind, Self)> {
        AliasKind::PRIORITY
            .into_iter()
            .filter(|kind| requested.includes(*kind))
            .find_map(|kind| {
                let source = match kind {
                    AliasKind::ActorValue => forms.attribute(reference).map(Self::Attribute),
                    AliasKind::WornKeyword => forms.keyword(reference).map(Self::WornKeyword),
                    AliasKind::NpcKeyword => forms.keyword(reference).map(Self::InnateKeyword),
                    AliasKind::Morph => Some(Self::Morph(reference.to_string())),
                    AliasKind::Any => None,
                }?;
                Some((kind, source))
            })
    }

    /// Read the current value from `character`.
    #[must_use]
    pub fn read<C: CharacterModel + ?Sized>(&self, character: &C) -> f64 {
        let flag = |set: bool| if set { 1.0 } else { 0.0 };
        match self {
            Self::Attribute(id) => character.attribute(*id),
            Self::WornKeyword(id) => flag(character.has_worn_keyword(*id)),
            Self::InnateKeyword(id) => flag(character.has_innate_keyword(*id)),
            Self::Morph(name) => f64::from(character.channel(name)),
        }
    }
}

// ---------------------------------------------------------------------------
// Alias
// ---------------------------------------------------------------------------

/// A registered alias (the primary name of a slot).
#[derive(Debug, Clone)]
pub struct Alias {
    /// Primary name.
    pub symbol: Symbol,
    /// Editor ID or channel name the alias reads.
    pub reference_id: String,
    /// Concrete kind it resolved as.
    pub kind: AliasKind,
    /// Acquisition function.
    pub source: AliasSource,
    /// Value slot in the rule set's snapshot.
    pub slot: usize,
    /// Other names bound to the same slot.
    pub equivalent_symbols: Vec<Symbol>,
}

impl Alias {
    /// Whether this alias reads `reference_id` through a kind `kind`
    /// permits.
    #[must_use]
    pub fn is_same_reference(&self, reference_id: &str, kind: AliasKind) -> bool {
        kind.includes(self.kind) && self.reference_id == reference_id
    }

    /// The morph channel this alias reads, if any.
    #[must_use]
    pub fn morph_channel(&self) -> Option<&str> {
        match &self.source {
            AliasSource::Morph(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::testing::{MockCharacter, MockForms};

    #[test]
    fn resolution_follows_priority() {
        let mut forms = MockForms::standard();
        // A name that is both an attribute and a keyword resolves as attribute.
        forms.keywords.insert("AttrStrength".into(), KeywordId(99));

        let (kind, source) =
            AliasSource::resolve("AttrStrength", AliasKind::Any, &forms).expect("resolves");
        assert_eq!(kind, AliasKind::ActorValue);
        assert_eq!(source, AliasSource::Attribute(AttributeId(1)));

        let (kind, _) = AliasSource::resolve("AttrStrength", AliasKind::WornKeyword, &forms)
            .expect("resolves");
        assert_eq!(kind, AliasKind::WornKeyword);
    }

    #[test]
    fn any_falls_through_to_morph() {
        let forms = MockForms::standard();
        let (kind, source) =
            AliasSource::resolve("Breasts", AliasKind::Any, &forms).expect("resolves");
        assert_eq!(kind, AliasKind::Morph);
        assert_eq!(source, AliasSource::Morph("Breasts".into()));
    }

    #[test]
    fn unresolvable_reference() {
        let forms = MockForms::standard();
        assert!(AliasSource::resolve("Nope", AliasKind::ActorValue, &forms).is_none());
        assert_eq!(AliasKind::ActorValue.attempted(), "ActorValue");
        assert_eq!(
            AliasKind::Any.attempted(),
            "ActorValue/WornKeyword/Keyword/Morph"
        );
    }

    #[test]
    fn sources_read_character_state() {
        let mut character = MockCharacter::new().with_channel("Thin", 0.25);
        character.attributes.insert(AttributeId(1), 80.0);
        character.worn.insert(KeywordId(10));

        assert!((AliasSource::Attribute(AttributeId(1)).read(&character) - 80.0).abs() < 1e-9);
        assert!((AliasSource::WornKeyword(KeywordId(10)).read(&character) - 1.0).abs() < 1e-9);
        assert!(AliasSource::InnateKeyword(KeywordId(10)).read(&character).abs() < 1e-9);
        assert!((AliasSource::Morph("Thin".into()).read(&character) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn script_type_names() {
        assert_eq!(
            AliasKind::from_script_name("wornKeyword"),
            Some(AliasKind::WornKeyword)
        );
        assert_eq!(AliasKind::from_script_name("WornKeyword"), None);
    }
}
