//! Integration Tests — End-to-End Morph Flows
//!
//! These tests drive the public API the way a host adapter does: rule
//! folders on disk, a registry, an engine and a live character whose
//! channels are read back after every pass.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{Character, Forms, HEAVY_ARMOR, STRENGTH};
use dynmorph_core::alias::AliasKind;
use dynmorph_core::config::SessionConfig;
use dynmorph_core::keyword::{KeywordMode, KeywordMorph};
use dynmorph_core::types::{ArchetypeId, DiffMode, RuleSetKey, Sex};
use dynmorph_core::{
    CharacterModel, CollisionPolicy, MorphEngine, MorphError, MorphSession, RuleSet, RuleSetRegistry,
};

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, text).expect("write");
}

fn engine_over(root: &Path) -> MorphEngine {
    let registry = RuleSetRegistry::new(root, Arc::new(Forms));
    MorphEngine::with_registry(Arc::new(registry), SessionConfig::default())
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

// ---------------------------------------------------------------------------
// Rule sets
// ---------------------------------------------------------------------------

#[test]
fn aliases_reading_the_same_signal_share_a_value() {
    let mut set = RuleSet::new();
    set.parse_alias("str", "AttrStrength", AliasKind::ActorValue, 0.0, &Forms)
        .expect("str");
    set.parse_alias("might", "AttrStrength", AliasKind::ActorValue, 0.0, &Forms)
        .expect("might");
    set.parse_rule("Strong", "str + might", true, CollisionPolicy::Overwrite)
        .expect("rule");

    let character = Character::new(Sex::Male);
    character.set_attribute(STRENGTH, 0.25);
    let results = set.snapshot_and_evaluate(&character);
    assert!(close(results["Strong"].value, 0.5));
    assert_eq!(set.alias_count(), 1);
}

#[test]
fn a_channel_has_one_setter_or_only_adders() {
    let mut set = RuleSet::new();
    for expr in ["0.1", "0.2"] {
        set.parse_rule("Thin", expr, false, CollisionPolicy::Append)
            .expect("adder");
    }
    set.parse_rule("Thin", "0.9", true, CollisionPolicy::Append)
        .expect("setter");
    set.parse_rule("Thin", "0.4", true, CollisionPolicy::Append)
        .expect("setter");

    let rules = set.rules_for("Thin");
    assert_eq!(rules.len(), 1);
    assert!(rules[0].is_setter);
    assert!(close(set.evaluate()["Thin"].value, 0.4));
}

#[test]
fn self_dependent_rules_are_rejected() {
    let mut set = RuleSet::new();
    set.parse_alias("thin", "Thin", AliasKind::Morph, 0.0, &Forms)
        .expect("alias");
    let err = set
        .parse_rule("Thin", "thin * 2", false, CollisionPolicy::Append)
        .unwrap_err();
    assert!(err.to_string().contains("Circular reference"));
    assert!(matches!(err, MorphError::CircularReference { .. }));
}

#[test]
fn indirect_cycles_in_a_script_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        &dir.path().join("HumanRace/female/master.json"),
        r#"{
            "Aliases": {
                "thin":   { "EditorID": "Thin", "Type": "morph" },
                "strong": { "EditorID": "Strong", "Type": "morph" }
            },
            "Rules": { "Adders": { "Strong": "thin * 0.5", "Thin": "strong * 0.5" } }
        }"#,
    );

    let registry = RuleSetRegistry::new(dir.path(), Arc::new(Forms));
    let report = registry.load_all();
    assert_eq!(report.error_count(), 1);
    assert!(matches!(
        report.files[0].errors[0],
        MorphError::CircularReference { .. }
    ));

    let key = RuleSetKey::new(ArchetypeId::new("HumanRace"), Sex::Female);
    let set = registry.get(&key).expect("set");
    assert_eq!(set.rules_for("Strong").len(), 1);
    assert!(set.rules_for("Thin").is_empty());
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[test]
fn repeated_evaluation_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        &dir.path().join("HumanRace/female/master.json"),
        r#"{
            "Aliases": { "str": { "EditorID": "AttrStrength", "Type": "actorValue" } },
            "Rules": {
                "Adders": { "Thin": "str / 200" },
                "Setters": { "Strong": "str / 100" }
            }
        }"#,
    );
    let engine = engine_over(dir.path());
    let character = Character::new(Sex::Female);
    character.set_attribute(STRENGTH, 60.0);

    assert!(engine.reevaluate(&character));
    let first = character.read_all();
    assert!(!engine.reevaluate(&character));
    assert_eq!(first, character.read_all());
}

#[test]
fn pushing_an_untouched_session_writes_nothing() {
    let character = Character::new(Sex::Male);
    character.set_channel("Thin", 0.4);
    let mut session = MorphSession::begin(&character, "ECOffset_", DiffMode::L2Norm).expect("begin");
    assert!(session.push_commits().abs() < f32::EPSILON);
    assert!(close(character.get("Thin"), 0.4));
    assert_eq!(character.channels.lock().len(), 1);
}

#[test]
fn offset_then_restore_returns_to_the_original_value() {
    let character = Character::new(Sex::Male);
    character.set_channel("Breasts", 0.35);

    let mut session = MorphSession::begin(&character, "ECOffset_", DiffMode::MaxNorm).expect("begin");
    session.commit_offset("Breasts", 0.4);
    session.push_commits();
    assert!(close(character.get("Breasts"), 0.75));

    let mut session = MorphSession::begin(&character, "ECOffset_", DiffMode::MaxNorm).expect("begin");
    session.restore();
    session.push_commits();
    assert!(close(character.get("Breasts"), 0.35));
    assert!(close(character.get("ECOffset_Breasts"), 0.0));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn strength_drives_the_strong_channel() {
    let mut set = RuleSet::new();
    set.parse_alias("str", "AttrStrength", AliasKind::ActorValue, 0.0, &Forms)
        .expect("alias");
    set.parse_rule("Strong", "str / 100", true, CollisionPolicy::Overwrite)
        .expect("rule");

    let character = Character::new(Sex::Male);
    character.set_attribute(STRENGTH, 80.0);
    let results = set.snapshot_and_evaluate(&character);
    let strong = results["Strong"];
    assert!(strong.is_setter);
    assert!(close(strong.value, 0.8));
}

#[test]
fn keyword_scripts_decode_or_deactivate() {
    let morph = KeywordMorph::parse("Overweight --add 0.5 --priority 1");
    assert_eq!(morph.morph_name, "Overweight");
    assert_eq!(morph.mode, KeywordMode::Add);
    assert!(close(morph.add, 0.5));
    assert_eq!(morph.priority, 1);
    assert!(morph.is_active);

    assert!(!KeywordMorph::parse("BadFormat").is_active);
}

#[test]
fn append_overlays_accumulate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let female = dir.path().join("HumanRace/female");
    write(&female.join("master.json"), "{}");
    write(
        &female.join("overlay_a.json"),
        r#"{ "Rules": { "Adders": { "Thin": "0.2" } } }"#,
    );
    write(
        &female.join("overlay_b.json"),
        r#"{ "Rules": { "Adders": { "Thin": "0.1" } } }"#,
    );

    let registry = RuleSetRegistry::new(dir.path(), Arc::new(Forms));
    let key = RuleSetKey::new(ArchetypeId::new("HumanRace"), Sex::Female);
    let set = registry.get_or_load(&key).expect("set");
    let thin = set.evaluate()["Thin"];
    assert!(!thin.is_setter);
    assert!(close(thin.value, 0.3));
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn equipment_change_flows_through_to_channels() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        &dir.path().join("HumanRace/male/master.json"),
        r#"{
            "Aliases": { "heavy": { "EditorID": "ArmorHeavy", "Type": "wornKeyword" } },
            "Rules": { "Adders": { "Overweight": "heavy * 0.25" } }
        }"#,
    );
    let engine = engine_over(dir.path());
    let character = Character::new(Sex::Male);
    character.set_channel("Overweight", 0.5);

    assert!(!engine.reevaluate(&character));
    assert!(close(character.get("Overweight"), 0.5));

    character.worn.lock().insert(HEAVY_ARMOR);
    assert!(engine.reevaluate(&character));
    assert!(close(character.get("Overweight"), 0.75));

    character.worn.lock().remove(&HEAVY_ARMOR);
    assert!(engine.reevaluate(&character));
    assert!(close(character.get("Overweight"), 0.5));

    let snap = engine.counters().snapshot();
    assert_eq!(snap.evaluations, 3);
    assert_eq!(snap.refresh_requests, 2);
}

#[test]
fn characters_without_rules_are_left_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_over(dir.path());
    let character = Character::new(Sex::Female);
    character.set_channel("Thin", 0.2);
    assert!(!engine.reevaluate(&character));
    assert!(close(character.get("Thin"), 0.2));
    assert_eq!(engine.counters().snapshot().sessions_skipped, 1);
}
