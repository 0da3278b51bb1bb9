//! The evaluation pipeline for one character.
//!
//! ```text
//! registry ─▶ rule set ─┐
//!                        ├─▶ snapshot + evaluate (rule-set lock)
//! character ─▶ session ─┘        │
//!                                ▼
//!              restore ─▶ offset/target commits ─▶ push ─▶ diff > threshold?
//! ```

use std::sync::Arc;

use tracing::{debug, debug_span, trace};

use crate::character::{CharacterModel, FormLookup};
use crate::config::{MorphConfig, SessionConfig};
use crate::error::Result;
use crate::metrics::{EvaluationTimer, MorphCounters, spans};
use crate::registry::RuleSetRegistry;
use crate::ruleset::RuleSet;
use crate::session::MorphSession;

/// Re-evaluates characters against their rule sets.
pub struct MorphEngine {
    registry: Arc<RuleSetRegistry>,
    session: SessionConfig,
    enabled: bool,
    counters: Arc<MorphCounters>,
    timer: EvaluationTimer,
    /// Shadow prefixes of other passes writing the same channels.
    layers: Vec<String>,
}

impl MorphEngine {
    /// Engine with a fresh registry rooted at the configured rule folder.
    pub fn new(config: &MorphConfig, forms: Arc<dyn FormLookup>) -> Self {
        let counters = Arc::new(MorphCounters::new());
        let registry = RuleSetRegistry::new(config.rules.root.clone(), forms)
            .with_counters(Arc::clone(&counters));
        Self {
            registry: Arc::new(registry),
            session: config.session.clone(),
            enabled: config.general.enabled,
            counters,
            timer: EvaluationTimer::new(),
            layers: Vec::new(),
        }
    }

    /// Engine over an existing registry.
    pub fn with_registry(registry: Arc<RuleSetRegistry>, session: SessionConfig) -> Self {
        Self {
            registry,
            session,
            enabled: true,
            counters: Arc::new(MorphCounters::new()),
            timer: EvaluationTimer::new(),
            layers: Vec::new(),
        }
    }

    /// Keep the contributions committed under `prefix` by another pass on
    /// top of this engine's setter targets.
    #[must_use]
    pub fn with_layer(mut self, prefix: impl Into<String>) -> Self {
        self.layers.push(prefix.into());
        self
    }

    /// Rule-set registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RuleSetRegistry> {
        &self.registry
    }

    /// Session settings.
    #[must_use]
    pub fn session_config(&self) -> &SessionConfig {
        &self.session
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<MorphCounters> {
        &self.counters
    }

    /// Recent evaluation timings.
    #[must_use]
    pub fn timer(&self) -> &EvaluationTimer {
        &self.timer
    }

    /// Whether evaluation is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-evaluate `character` and commit the result.
    ///
    /// Returns `true` when the committed change exceeds the refresh
    /// threshold, i.e. the caller should request a visual refresh. A
    /// character without a rule set or model data is skipped.
    pub fn reevaluate<C: CharacterModel + ?Sized>(&self, character: &C) -> bool {
        if !self.enabled {
            return false;
        }
        let _span = debug_span!(spans::REEVALUATE, character = %character.id()).entered();
        let _timing = self.timer.start();
        MorphCounters::add(&self.counters.evaluations, 1);

        let Some(ruleset) = self.registry.get_for(character) else {
            trace!(character = %character.id(), "No rule set");
            MorphCounters::add(&self.counters.sessions_skipped, 1);
            return false;
        };

        match self.apply(&ruleset, character) {
            Ok(diff) => {
                let refresh = diff > self.session.diff_threshold;
                if refresh {
                    MorphCounters::add(&self.counters.refresh_requests, 1);
                }
                debug!(character = %character.id(), diff, refresh, "Re-evaluated");
                refresh
            }
            Err(e) => {
                debug!(character = %character.id(), "Skipped: {e}");
                MorphCounters::add(&self.counters.sessions_skipped, 1);
                false
            }
        }
    }

    /// Run one evaluation of `ruleset` against `character` and push it.
    /// Returns the size of the committed change.
    ///
    /// # Errors
    /// Returns [`crate::MorphError::NoModelData`] if the character cannot be
    /// read; nothing is written in that case.
    pub fn apply<C: CharacterModel + ?Sized>(&self, ruleset: &RuleSet, character: &C) -> Result<f32> {
        let mut session = MorphSession::begin(character, &self.session.offset_prefix, self.session.diff_mode)?;
        for prefix in &self.layers {
            session.layer_under(prefix);
        }
        let results = ruleset.snapshot_and_evaluate(character);

        session.restore();
        for (channel, result) in &results {
            if result.is_setter {
                session.commit_target(channel, result.value);
            } else {
                session.commit_offset(channel, result.value);
            }
        }
        MorphCounters::add(&self.counters.commits, results.len() as u64);
        Ok(session.push_commits())
    }
}
