//! Wires the engine, the scheduler and the actor world to host events.
//!
//! ```text
//! HostEvent ─▶ MorphManager::handle
//!   Equip            ─▶ scheduler: mark pending
//!   ActorUpdate      ─▶ scheduler: due? ─▶ systems::reevaluate_character ─▶ refresh
//!   ActorFirstUpdate ─▶ scheduler: run now ─▶ ...
//!   GameDataLoaded   ─▶ eager rule scan (when lazy loading is off)
//!   SaveLoaded       ─▶ log
//! ```

use std::sync::Arc;

use dynmorph_core::metrics::CounterSnapshot;
use dynmorph_core::types::CharacterId;
use dynmorph_core::{CharacterModel, FormLookup, KeywordMorphs, LoadReport, MorphEngine};
use tracing::{debug, info, trace, warn};

use crate::bridge::ActorWorld;
use crate::config::HostConfig;
use crate::events::{EventBus, HostEvent};
use crate::scheduler::{ReevaluationScheduler, TickOutcome};
use crate::systems;

/// The morph system as the host sees it.
pub struct MorphManager {
    config: HostConfig,
    engine: MorphEngine,
    keywords: Option<KeywordMorphs>,
    forms: Arc<dyn FormLookup>,
    world: Arc<ActorWorld>,
    scheduler: ReevaluationScheduler,
}

impl MorphManager {
    /// Build every component from `config`.
    pub fn new(config: HostConfig, forms: Arc<dyn FormLookup>, world: Arc<ActorWorld>) -> Self {
        let mut engine = MorphEngine::new(&config.engine, Arc::clone(&forms));
        if config.keywords.enabled {
            engine = engine.with_layer(config.keywords.offset_prefix.clone());
        }
        let keywords = config.keywords.enabled.then(|| {
            KeywordMorphs::new(
                config.keywords.editor_id_prefix.clone(),
                config.keywords.offset_prefix.clone(),
                config.engine.session.diff_mode,
            )
            .with_counters(Arc::clone(engine.counters()))
        });
        let scheduler = ReevaluationScheduler::new(config.scheduler.clone());
        info!(
            rules = %config.engine.rules.root.display(),
            lazy_load = config.engine.rules.lazy_load,
            keywords = config.keywords.enabled,
            "Morph manager ready"
        );
        Self {
            config,
            engine,
            keywords,
            forms,
            world,
            scheduler,
        }
    }

    /// Subscribe this manager to `bus`.
    pub fn register(self: &Arc<Self>, bus: &EventBus) {
        let this = Arc::clone(self);
        bus.subscribe(move |event| this.handle(event));
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The rule engine.
    #[must_use]
    pub fn engine(&self) -> &MorphEngine {
        &self.engine
    }

    /// The scheduler (watchlist, menu actor).
    #[must_use]
    pub fn scheduler(&self) -> &ReevaluationScheduler {
        &self.scheduler
    }

    /// Counter values.
    #[must_use]
    pub fn stats(&self) -> CounterSnapshot {
        self.engine.counters().snapshot()
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// React to one host event.
    pub fn handle(&self, event: &HostEvent) {
        trace!(event = event.kind_name(), "Host event");
        match event {
            HostEvent::Equip { actor, .. } => {
                self.scheduler.notify_equip_changed(*actor);
            }
            HostEvent::ActorUpdate { actor, when_ms, .. } => {
                let outcome = self
                    .scheduler
                    .notify_periodic_tick(*actor, *when_ms, || self.reevaluate(*actor));
                self.finish(*actor, outcome);
            }
            HostEvent::ActorFirstUpdate { actor, when_ms, .. } => {
                debug!(character = %actor, "First update");
                let outcome = self
                    .scheduler
                    .notify_first_update(*actor, *when_ms, || self.reevaluate(*actor));
                self.finish(*actor, outcome);
            }
            HostEvent::GameDataLoaded => {
                if self.config.engine.rules.lazy_load {
                    debug!("Game data loaded; rule sets load on demand");
                } else {
                    self.reload();
                }
            }
            HostEvent::SaveLoaded { name } => {
                info!(save = %name, watched = self.scheduler.watched().len(), "Save loaded");
            }
        }
    }

    /// Re-evaluate `id` now, bypassing the scheduler's intervals.
    ///
    /// Returns `false` if the character is gone or nothing changed enough.
    pub fn reevaluate(&self, id: CharacterId) -> bool {
        if !self.engine.is_enabled() {
            return false;
        }
        let Some(actor) = self.world.get(id) else {
            trace!(character = %id, "Character no longer loaded");
            return false;
        };
        systems::reevaluate_character(
            &self.engine,
            self.keywords.as_ref(),
            self.forms.as_ref(),
            actor.as_ref(),
        )
    }

    /// Forget every rule set and keyword script and scan the rule folders.
    pub fn reload(&self) -> LoadReport {
        if let Some(keywords) = &self.keywords {
            keywords.clear();
        }
        let report = self.engine.registry().reload();
        if !report.is_clean() {
            warn!(
                errors = report.error_count(),
                missing_masters = report.missing_masters.len(),
                skipped_folders = report.skipped_folders.len(),
                "Rule sets loaded with problems"
            );
        }
        report
    }

    fn finish(&self, id: CharacterId, outcome: TickOutcome) {
        if !outcome.changed() {
            return;
        }
        if let Some(actor) = self.world.get(id) {
            actor.request_visual_refresh();
        }
    }
}
