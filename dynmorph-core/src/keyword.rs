//! Keyword morphs: fixed channel offsets attached to keyword forms.
//!
//! A keyword whose editor ID contains the morph marker (by default
//! `ECArmorMorph_`) carries a one-line script in its description:
//!
//! ```text
//! Overweight --add 0.5 --priority 1
//! Strong -s 1.0 -p 2
//! ```
//!
//! For a character, the scripts of every worn morph keyword are ordered by
//! priority (lowest first), then folded into one offset per channel: adds
//! accumulate and a set replaces whatever was accumulated so far. The
//! resulting offsets are committed through their own session prefix, so
//! they retract independently of rule-driven morphs.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, debug_span, error};

use crate::character::{CharacterModel, FormLookup};
use crate::error::{MorphError, Result};
use crate::metrics::{MorphCounters, spans};
use crate::session::MorphSession;
use crate::types::{DiffMode, KeywordId};

/// Default priority when a script does not give one.
pub const DEFAULT_PRIORITY: u32 = 1;

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// How a keyword morph combines with lower-priority ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeywordMode {
    /// Accumulate `add`.
    #[default]
    Add,
    /// Replace the accumulated offset with `set`.
    Set,
}

/// A decoded keyword script.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMorph {
    /// Channel the script drives.
    pub morph_name: String,
    /// Add or set.
    pub mode: KeywordMode,
    /// Value of `--add`.
    pub add: f32,
    /// Value of `--set`.
    pub set: f32,
    /// Ordering key; higher applies later.
    pub priority: u32,
    /// Whether the script decoded. Inactive morphs contribute nothing.
    pub is_active: bool,
}

impl Default for KeywordMorph {
    fn default() -> Self {
        Self {
            morph_name: String::new(),
            mode: KeywordMode::Add,
            add: 0.0,
            set: 0.0,
            priority: DEFAULT_PRIORITY,
            is_active: false,
        }
    }
}

impl KeywordMorph {
    /// Decode `script`.
    ///
    /// Tokens are whitespace separated. The first token names the channel;
    /// `--add`/`-a`, `--set`/`-s` and `--priority`/`-p` each take one value.
    /// Other tokens are ignored. A script with neither an add nor a set is
    /// rejected.
    ///
    /// # Errors
    /// Returns [`MorphError::KeywordScript`] describing the first problem.
    pub fn try_parse(script: &str) -> Result<Self> {
        let fail = |reason: String| MorphError::KeywordScript {
            script: script.to_string(),
            reason,
        };

        let mut tokens = script.split_whitespace();
        let Some(name) = tokens.next().filter(|t| !t.starts_with('-')) else {
            return Err(fail("missing morph name".to_string()));
        };

        let mut morph = Self {
            morph_name: name.to_string(),
            is_active: true,
            ..Self::default()
        };
        let (mut has_add, mut has_set) = (false, false);

        while let Some(flag) = tokens.next() {
            let long = match flag {
                "--add" | "-a" => "--add",
                "--set" | "-s" => "--set",
                "--priority" | "-p" => "--priority",
                _ => continue,
            };
            let Some(value) = tokens.next() else {
                return Err(fail(format!("missing value for {flag}")));
            };
            let invalid = || fail(format!("invalid value for {flag}: '{value}'"));
            match long {
                "--add" => {
                    morph.add = value.parse().map_err(|_| invalid())?;
                    has_add = true;
                }
                "--set" => {
                    morph.set = value.parse().map_err(|_| invalid())?;
                    has_set = true;
                }
                _ => morph.priority = value.parse().map_err(|_| invalid())?,
            }
        }

        if !has_add && !has_set {
            return Err(fail("neither --add nor --set given".to_string()));
        }
        if has_set {
            morph.mode = KeywordMode::Set;
        }
        Ok(morph)
    }

    /// Decode `script`, logging failures and returning an inactive morph.
    #[must_use]
    pub fn parse(script: &str) -> Self {
        Self::try_parse(script).unwrap_or_else(|e| {
            error!("{e}");
            Self::default()
        })
    }
}

/// Fold active morphs into one offset per channel.
///
/// Lower priorities apply first; equal priorities keep their input order.
#[must_use]
pub fn resolve_offsets<'a>(morphs: impl IntoIterator<Item = &'a KeywordMorph>) -> BTreeMap<String, f32> {
    let mut active: Vec<&KeywordMorph> = morphs.into_iter().filter(|m| m.is_active).collect();
    active.sort_by_key(|m| m.priority);

    let mut offsets = BTreeMap::new();
    for morph in active {
        let entry = offsets.entry(morph.morph_name.clone()).or_insert(0.0);
        match morph.mode {
            KeywordMode::Add => *entry += morph.add,
            KeywordMode::Set => *entry = morph.set,
        }
    }
    offsets
}

// ---------------------------------------------------------------------------
// Keyword Morph System
// ---------------------------------------------------------------------------

/// Decodes, caches and applies keyword morphs.
pub struct KeywordMorphs {
    marker: String,
    offset_prefix: String,
    diff_mode: DiffMode,
    /// `None` for keywords that are not morph keywords.
    cache: DashMap<KeywordId, Option<Arc<KeywordMorph>>>,
    counters: Arc<MorphCounters>,
}

impl KeywordMorphs {
    /// System recognising keywords whose editor ID contains `marker`.
    pub fn new(marker: impl Into<String>, offset_prefix: impl Into<String>, diff_mode: DiffMode) -> Self {
        Self {
            marker: marker.into(),
            offset_prefix: offset_prefix.into(),
            diff_mode,
            cache: DashMap::new(),
            counters: Arc::new(MorphCounters::new()),
        }
    }

    /// Report decode statistics into shared counters.
    #[must_use]
    pub fn with_counters(mut self, counters: Arc<MorphCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Whether an editor ID marks a morph keyword.
    #[must_use]
    pub fn is_morph_editor_id(&self, editor_id: &str) -> bool {
        editor_id.contains(&self.marker)
    }

    /// Decoded script of `keyword`, if it is a morph keyword.
    pub fn morph_for(&self, keyword: KeywordId, forms: &dyn FormLookup) -> Option<Arc<KeywordMorph>> {
        if let Some(entry) = self.cache.get(&keyword) {
            return entry.value().clone();
        }
        let morph = forms
            .keyword_editor_id(keyword)
            .filter(|id| self.is_morph_editor_id(id))
            .map(|_| {
                let script = forms.keyword_script(keyword).unwrap_or_default();
                MorphCounters::add(&self.counters.keyword_scripts_parsed, 1);
                Arc::new(KeywordMorph::parse(&script))
            });
        self.cache.insert(keyword, morph.clone());
        morph
    }

    /// Number of keywords inspected so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Forget every decoded script.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Offsets produced by `keywords`.
    pub fn offsets_for(&self, keywords: &[KeywordId], forms: &dyn FormLookup) -> BTreeMap<String, f32> {
        let morphs: Vec<Arc<KeywordMorph>> = keywords
            .iter()
            .filter_map(|kw| self.morph_for(*kw, forms))
            .collect();
        resolve_offsets(morphs.iter().map(AsRef::as_ref))
    }

    /// Replace the character's keyword offsets with those of its worn
    /// keywords. Returns the size of the change.
    ///
    /// # Errors
    /// Returns [`MorphError::NoModelData`] if the character cannot be read.
    pub fn reevaluate<C: CharacterModel + ?Sized>(&self, character: &C, forms: &dyn FormLookup) -> Result<f32> {
        let _span = debug_span!(spans::KEYWORD_MORPHS, character = %character.id()).entered();
        let offsets = self.offsets_for(&character.worn_keywords(), forms);

        let mut session = MorphSession::begin(character, &self.offset_prefix, self.diff_mode)?;
        session.restore();
        for (channel, offset) in &offsets {
            session.commit_offset(channel, *offset);
        }
        MorphCounters::add(&self.counters.commits, offsets.len() as u64);
        let diff = session.push_commits();
        debug!(character = %character.id(), channels = offsets.len(), diff, "Keyword morphs applied");
        Ok(diff)
    }
}
