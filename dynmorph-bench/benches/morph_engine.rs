//! dynmorph Benchmark Suite
//!
//! Per-frame costs on the host's update thread:
//!   expression_compile ............... one rule expression
//!   ruleset_snapshot_and_evaluate .... 8 aliases, 12 rules
//!   engine_reevaluate_settled ........ full pass, nothing to write
//!   keyword_pass_4_items ............. four worn morph keywords
//!   scheduler_tick_skipped ........... debounced tick (the common case)

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use dynmorph_core::alias::AliasKind;
use dynmorph_core::config::SessionConfig;
use dynmorph_core::expr::{SymbolTable, compile};
use dynmorph_core::types::{ArchetypeId, AttributeId, CharacterId, DiffMode, KeywordId, Sex};
use dynmorph_core::{CharacterModel, CollisionPolicy, KeywordMorphs, MorphEngine, RuleSet, RuleSetRegistry};
use dynmorph_host::config::SchedulerConfig;
use dynmorph_host::{Actor, FormDatabase, ReevaluationScheduler};

const ATTRIBUTES: u32 = 8;
const CHANNELS: [&str; 6] = ["Overweight", "Strong", "Thin", "Breasts", "Hips", "Shoulders"];

fn forms() -> FormDatabase {
    let mut forms = FormDatabase::new().with_archetype("HumanRace");
    for i in 0..ATTRIBUTES {
        forms = forms.with_attribute(&format!("Attr{i}"), AttributeId(i));
    }
    for i in 0..4u32 {
        forms = forms.with_morph_keyword(
            &format!("ECArmorMorph_{i}"),
            KeywordId(100 + i),
            &format!("{} --add 0.1 --priority {i}", CHANNELS[i as usize]),
        );
    }
    forms
}

fn ruleset(forms: &FormDatabase) -> RuleSet {
    let mut set = RuleSet::new();
    for i in 0..ATTRIBUTES {
        set.parse_alias(&format!("a{i}"), &format!("Attr{i}"), AliasKind::ActorValue, 0.0, forms)
            .expect("alias");
    }
    for (n, channel) in CHANNELS.iter().enumerate() {
        if n < 3 {
            set.parse_rule(channel, &format!("clamp(0, a{n} / 100, 1)"), true, CollisionPolicy::Overwrite)
                .expect("setter");
            continue;
        }
        for k in 0..3 {
            let expr = format!("max(a{}, a{}) * 0.001 - {k} * 0.0001", (n + k) % 8, (n + k + 1) % 8);
            set.parse_rule(channel, &expr, false, CollisionPolicy::Append)
                .expect("adder");
        }
    }
    set
}

fn actor() -> Actor {
    let actor = Actor::new(CharacterId::PLAYER, ArchetypeId::new("HumanRace"), Sex::Female);
    for i in 0..ATTRIBUTES {
        actor.set_attribute(AttributeId(i), f64::from(i) * 10.0);
    }
    actor
}

/// Benchmark: compile one rule expression.
fn bench_compile(c: &mut Criterion) {
    let mut table = SymbolTable::new();
    table.add_variable("str", 0);
    table.add_variable("heavy", 1);
    c.bench_function("expression_compile", |b| {
        b.iter(|| {
            let expr = compile(black_box("clamp(0, str / 100 + heavy * 0.25, 1)"), &table);
            black_box(expr.is_ok());
        });
    });
}

/// Benchmark: snapshot aliases and evaluate every rule under the lock.
fn bench_evaluate(c: &mut Criterion) {
    let forms = forms();
    let set = ruleset(&forms);
    let actor = actor();
    c.bench_function("ruleset_snapshot_and_evaluate", |b| {
        b.iter(|| black_box(set.snapshot_and_evaluate(black_box(&actor))));
    });
}

/// Benchmark: a full engine pass once the character has settled.
fn bench_reevaluate(c: &mut Criterion) {
    let forms = Arc::new(forms());
    let registry = RuleSetRegistry::new("unused", Arc::clone(&forms));
    let engine = MorphEngine::with_registry(Arc::new(registry), SessionConfig::default());
    let set = ruleset(&forms);
    let actor = actor();
    engine.apply(&set, &actor).expect("settle");

    c.bench_function("engine_reevaluate_settled", |b| {
        b.iter(|| black_box(engine.apply(&set, black_box(&actor)).expect("apply")));
    });
}

/// Benchmark: keyword morphs for four worn items.
fn bench_keywords(c: &mut Criterion) {
    let forms = forms();
    let keywords = KeywordMorphs::new("ECArmorMorph_", "ECKwOffset_", DiffMode::MaxNorm);
    let actor = actor();
    actor.equip(&[KeywordId(100), KeywordId(101), KeywordId(102), KeywordId(103)]);
    c.bench_function("keyword_pass_4_items", |b| {
        b.iter(|| black_box(keywords.reevaluate(black_box(&actor), &forms).expect("pass")));
    });
    black_box(actor.channel("Overweight"));
}

/// Benchmark: a tick the scheduler debounces away.
fn bench_scheduler(c: &mut Criterion) {
    let scheduler = ReevaluationScheduler::new(SchedulerConfig::default());
    scheduler.notify_periodic_tick(CharacterId::PLAYER, 0, || false);
    c.bench_function("scheduler_tick_skipped", |b| {
        b.iter(|| black_box(scheduler.notify_periodic_tick(CharacterId::PLAYER, black_box(50), || true)));
    });
}

criterion_group!(
    benches,
    bench_compile,
    bench_evaluate,
    bench_reevaluate,
    bench_keywords,
    bench_scheduler,
);
criterion_main!(benches);
