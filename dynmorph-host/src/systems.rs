//! Per-actor morph passes.
//!
//! These are the functions the scheduler runs once it decides an actor is
//! due. Each returns whether the committed change warrants a visual
//! refresh; requesting the refresh is left to the caller.
//!
//! | Pass     | Source                          | Shadow prefix        |
//! |----------|---------------------------------|----------------------|
//! | Rules    | archetype/sex rule set          | `[engine.session]`   |
//! | Keywords | morph scripts on worn keywords  | `[keywords]`         |

use dynmorph_core::{CharacterModel, FormLookup, KeywordMorphs, MorphEngine};
use tracing::debug;

/// Run the rule-set pass.
pub fn run_rule_pass<C: CharacterModel + ?Sized>(engine: &MorphEngine, character: &C) -> bool {
    engine.reevaluate(character)
}

/// Run the keyword pass. Changes at or below `threshold` report `false`.
pub fn run_keyword_pass<C: CharacterModel + ?Sized>(
    keywords: &KeywordMorphs,
    forms: &dyn FormLookup,
    character: &C,
    threshold: f32,
) -> bool {
    match keywords.reevaluate(character, forms) {
        Ok(diff) => diff > threshold,
        Err(e) => {
            debug!(character = %character.id(), "Keyword pass skipped: {e}");
            false
        }
    }
}

/// Both passes, rules first.
pub fn reevaluate_character<C: CharacterModel + ?Sized>(
    engine: &MorphEngine,
    keywords: Option<&KeywordMorphs>,
    forms: &dyn FormLookup,
    character: &C,
) -> bool {
    let rules_changed = run_rule_pass(engine, character);
    let keywords_changed = keywords.is_some_and(|keywords| {
        run_keyword_pass(keywords, forms, character, engine.session_config().diff_threshold)
    });
    rules_changed || keywords_changed
}
