//! Property-Based Tests for dynmorph Core
//!
//! Uses `proptest` to check the commit session and the expression engine
//! under random inputs. Float comparisons use tolerances throughout since
//! channels are stored as `f32`.

mod common;

use proptest::prelude::*;

use common::Character;
use dynmorph_core::expr::{SymbolTable, compile};
use dynmorph_core::keyword::{KeywordMorph, resolve_offsets};
use dynmorph_core::types::{DiffMode, Sex};
use dynmorph_core::{CharacterModel, MorphSession};

const PREFIX: &str = "ECOffset_";
const CHANNELS: [&str; 4] = ["Overweight", "Strong", "Thin", "Breasts"];

/// One staged commit: channel index, setter flag, value.
fn arb_commits() -> impl Strategy<Value = Vec<(usize, bool, f32)>> {
    prop::collection::vec((0..CHANNELS.len(), any::<bool>(), -1.0..1.0f32), 0..12)
}

fn apply(character: &Character, commits: &[(usize, bool, f32)]) -> f32 {
    let mut session = MorphSession::begin(character, PREFIX, DiffMode::MaxNorm).expect("begin");
    session.restore();
    for &(idx, is_setter, value) in commits {
        if is_setter {
            session.commit_target(CHANNELS[idx], value);
        } else {
            session.commit_offset(CHANNELS[idx], value);
        }
    }
    session.push_commits()
}

fn character_with(initial: &[f32]) -> Character {
    let character = Character::new(Sex::Female);
    for (name, value) in CHANNELS.iter().zip(initial) {
        character.set_channel(name, *value);
    }
    character
}

// ---------------------------------------------------------------------------
// Property: Re-applying the same commits changes nothing
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn reapplying_commits_is_idempotent(
        initial in prop::collection::vec(-1.0..1.0f32, CHANNELS.len()),
        commits in arb_commits(),
    ) {
        let character = character_with(&initial);
        apply(&character, &commits);
        let first = character.read_all();

        let diff = apply(&character, &commits);
        prop_assert!(diff < 1e-4, "second pass moved channels by {}", diff);
        for (name, value) in character.read_all() {
            let before = first.get(&name).copied().unwrap_or(0.0);
            prop_assert!((before - value).abs() < 1e-4, "{} drifted", name);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: Retracting every contribution restores the original channels
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn empty_pass_retracts_all_contributions(
        initial in prop::collection::vec(-1.0..1.0f32, CHANNELS.len()),
        commits in arb_commits(),
    ) {
        let character = character_with(&initial);
        apply(&character, &commits);
        apply(&character, &[]);

        for (name, value) in CHANNELS.iter().zip(&initial) {
            prop_assert!((character.get(name) - value).abs() < 1e-4, "{} not restored", name);
            let shadow = format!("{PREFIX}{name}");
            prop_assert!(character.get(&shadow).abs() < 1e-4);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: Diff norms are ordered max <= l2 <= l1
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn diff_norms_are_ordered(deltas in prop::collection::vec(-1.0..1.0f32, CHANNELS.len())) {
        let character = character_with(&[0.0; CHANNELS.len()]);
        let diff = |mode| {
            let mut session = MorphSession::begin(&character, PREFIX, mode).expect("begin");
            for (name, delta) in CHANNELS.iter().zip(&deltas) {
                session.commit_target(name, *delta);
            }
            session.diff()
        };
        let (max, l1, l2) = (diff(DiffMode::MaxNorm), diff(DiffMode::L1Norm), diff(DiffMode::L2Norm));
        prop_assert!(max <= l2 + 1e-5);
        prop_assert!(l2 <= l1 + 1e-5);
        prop_assert!(max >= 0.0);
    }
}

// ---------------------------------------------------------------------------
// Property: Expressions agree with direct arithmetic
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn expression_arithmetic_matches(a in -100.0..100.0f64, b in -100.0..100.0f64, c in 0.5..10.0f64) {
        let mut table = SymbolTable::new();
        table.add_variable("a", 0);
        table.add_variable("b", 1);
        table.add_variable("c", 2);
        let slots = [a, b, c];

        let expr = compile("a + b * c - (a - b) / c", &table).expect("compile");
        let expected = a + b * c - (a - b) / c;
        prop_assert!((expr.evaluate(&slots) - expected).abs() < 1e-9);

        let expr = compile("clamp(0, a / 100, 1)", &table).expect("compile");
        let value = expr.evaluate(&slots);
        prop_assert!((0.0..=1.0).contains(&value));

        let expr = compile("max(a, b) >= min(a, b)", &table).expect("compile");
        prop_assert!((expr.evaluate(&slots) - 1.0).abs() < f64::EPSILON);
    }
}

// ---------------------------------------------------------------------------
// Property: A set keyword pins the offset regardless of earlier adds
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn keyword_set_overrides_lower_priority_adds(
        adds in prop::collection::vec(-1.0..1.0f32, 0..6),
        set in -1.0..1.0f32,
    ) {
        let mut morphs: Vec<KeywordMorph> = adds
            .iter()
            .map(|v| KeywordMorph::parse(&format!("Thin --add {v} --priority 1")))
            .collect();
        morphs.push(KeywordMorph::parse(&format!("Thin --set {set} --priority 5")));

        let offsets = resolve_offsets(&morphs);
        prop_assert!((offsets["Thin"] - set).abs() < 1e-6);
    }
}
