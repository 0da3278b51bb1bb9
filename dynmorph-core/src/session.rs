//! Morph sessions: one transaction over a character's channels.
//!
//! A session snapshots every channel on creation, lets the caller stage
//! changes, then writes back only what changed in a single batch.
//!
//! The engine's own contribution to a channel `X` is remembered in a shadow
//! channel `<prefix>X` stored on the character alongside the real ones.
//! [`MorphSession::restore`] subtracts every shadow from its base, which
//! retracts the previous pass exactly, so each evaluation can be applied
//! from scratch without drifting.
//!
//! ```text
//! Created ──begin──▶ Snapshotted ──restore?──▶ commits ──push──▶ Committed
//!                         └──────────────── drop ────────────▶ Discarded
//! ```

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::character::CharacterModel;
use crate::error::{MorphError, Result};
use crate::types::DiffMode;

/// Snapshot and staged value of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MorphValue {
    /// Value read from the character (or last pushed).
    pub snapshot: f32,
    /// Value staged by this session.
    pub evaluated: f32,
}

impl MorphValue {
    fn new(value: f32) -> Self {
        Self {
            snapshot: value,
            evaluated: value,
        }
    }

    /// Staged change.
    #[must_use]
    pub fn diff(&self) -> f32 {
        self.evaluated - self.snapshot
    }
}

/// Transaction over one character's channels.
pub struct MorphSession<'a, C: CharacterModel + ?Sized> {
    owner: &'a C,
    prefix: String,
    diff_mode: DiffMode,
    values: BTreeMap<String, MorphValue>,
    /// Base channel to its shadow channel.
    offsets: HashMap<String, String>,
    /// Shadow prefixes of other passes sharing these channels.
    layers: Vec<String>,
}

impl<'a, C: CharacterModel + ?Sized> MorphSession<'a, C> {
    /// Snapshot every channel of `owner`.
    ///
    /// # Errors
    /// Returns [`MorphError::NoModelData`] if the character's model data
    /// cannot be read.
    pub fn begin(owner: &'a C, prefix: &str, diff_mode: DiffMode) -> Result<Self> {
        let channels = owner
            .read_channels()
            .ok_or_else(|| MorphError::NoModelData(owner.id()))?;

        let mut values = BTreeMap::new();
        let mut offsets = HashMap::new();
        for (name, value) in channels {
            if let Some(base) = name.strip_prefix(prefix).filter(|b| !b.is_empty()) {
                offsets.insert(base.to_string(), name.clone());
            }
            values.insert(name, MorphValue::new(value));
        }
        trace!(
            character = %owner.id(),
            channels = values.len(),
            offsets = offsets.len(),
            "Session snapshot"
        );

        Ok(Self {
            owner,
            prefix: prefix.to_string(),
            diff_mode,
            values,
            offsets,
            layers: Vec::new(),
        })
    }

    /// Treat channels under `prefix` as another pass's contributions.
    ///
    /// Targets then land beneath that pass: the other contribution stays on
    /// top of the base value instead of being absorbed into this session's
    /// shadow.
    pub fn layer_under(&mut self, prefix: &str) {
        if !prefix.is_empty() && prefix != self.prefix && !self.layers.iter().any(|p| p == prefix) {
            self.layers.push(prefix.to_string());
        }
    }

    /// Staged contributions of the layered passes to `base`.
    #[must_use]
    pub fn layered(&self, base: &str) -> f32 {
        self.layers
            .iter()
            .map(|prefix| self.evaluated(&format!("{prefix}{base}")))
            .sum()
    }

    /// The character this session edits.
    pub fn owner(&self) -> &'a C {
        self.owner
    }

    /// Shadow-channel prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Norm used by [`Self::diff`].
    #[must_use]
    pub fn diff_mode(&self) -> DiffMode {
        self.diff_mode
    }

    /// Name of the shadow channel of `base`.
    #[must_use]
    pub fn offset_name(&self, base: &str) -> String {
        format!("{}{base}", self.prefix)
    }

    /// Snapshot and staged value of `channel`.
    #[must_use]
    pub fn value(&self, channel: &str) -> Option<MorphValue> {
        self.values.get(channel).copied()
    }

    /// Staged value of `channel`, `0.0` when unknown.
    #[must_use]
    pub fn evaluated(&self, channel: &str) -> f32 {
        self.values.get(channel).map_or(0.0, |v| v.evaluated)
    }

    /// Staged contribution recorded for `base`.
    #[must_use]
    pub fn offset(&self, base: &str) -> f32 {
        self.offsets
            .get(base)
            .map_or(0.0, |shadow| self.evaluated(shadow))
    }

    /// Number of tracked channels, shadows included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the character exposed no channels at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn shadow_of(&mut self, base: &str) -> &mut MorphValue {
        let shadow = self
            .offsets
            .entry(base.to_string())
            .or_insert_with(|| format!("{}{base}", self.prefix))
            .clone();
        self.values.entry(shadow).or_default()
    }

    fn base_of(&mut self, base: &str) -> &mut MorphValue {
        self.values.entry(base.to_string()).or_default()
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    /// Add `delta` to `base` and record it as this engine's contribution.
    pub fn commit_offset(&mut self, base: &str, delta: f32) {
        self.base_of(base).evaluated += delta;
        self.shadow_of(base).evaluated += delta;
    }

    /// Set `base` to `target`, folding the change into the contribution.
    ///
    /// Contributions of layered passes are kept on top of `target`.
    pub fn commit_target(&mut self, base: &str, target: f32) {
        let layered = self.layered(base);
        let entry = self.base_of(base);
        let delta = target - (entry.evaluated - layered);
        entry.evaluated += delta;
        self.shadow_of(base).evaluated += delta;
    }

    /// Retract every recorded contribution from its base channel.
    pub fn restore(&mut self) {
        let pairs: Vec<(String, String)> = self
            .offsets
            .iter()
            .map(|(b, s)| (b.clone(), s.clone()))
            .collect();
        for (base, shadow) in pairs {
            let contribution = self.values.get(&shadow).map_or(0.0, |v| v.evaluated);
            self.base_of(&base).evaluated -= contribution;
            if let Some(entry) = self.values.get_mut(&shadow) {
                entry.evaluated = 0.0;
            }
        }
    }

    /// Discard every staged change.
    pub fn revert(&mut self) {
        for value in self.values.values_mut() {
            value.evaluated = value.snapshot;
        }
    }

    /// Size of the staged change under the session's norm.
    #[must_use]
    pub fn diff(&self) -> f32 {
        let diffs = self.values.values().map(|v| v.diff().abs());
        match self.diff_mode {
            DiffMode::MaxNorm => diffs.fold(0.0, f32::max),
            DiffMode::L1Norm => diffs.sum(),
            DiffMode::L2Norm => diffs.map(|d| d * d).sum::<f32>().sqrt(),
        }
    }

    /// Write every changed channel back in one batch.
    ///
    /// Returns the change measured before the write. Snapshots advance to
    /// the written values, so a second push writes nothing.
    #[allow(clippy::float_cmp)]
    pub fn push_commits(&mut self) -> f32 {
        let diff = self.diff();
        let batch: Vec<(String, f32)> = self
            .values
            .iter()
            .filter(|(_, v)| v.evaluated != v.snapshot)
            .map(|(name, v)| (name.clone(), v.evaluated))
            .collect();

        if !batch.is_empty() {
            self.owner.write_channels(&batch);
        }
        for value in self.values.values_mut() {
            value.snapshot = value.evaluated;
        }
        trace!(character = %self.owner.id(), written = batch.len(), diff, "Session pushed");
        diff
    }
}
