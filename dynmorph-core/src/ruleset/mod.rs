//! Rule sets: the aliases and rules of one archetype/sex pair.
//!
//! A rule set is built single-threaded by the loader (`&mut self`), then
//! shared behind an `Arc`. Evaluation goes through [`RuleSet::lock`], which
//! holds the value snapshot for the whole snapshot + evaluate pass so that
//! concurrent evaluations of the same rule set never interleave.

mod script;

pub use script::FileReport;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::alias::{Alias, AliasKind, AliasSource};
use crate::character::{CharacterModel, FormLookup};
use crate::error::{MorphError, Result};
use crate::expr::{SymbolTable, compile};
use crate::rule::{CollisionPolicy, Rule, insert_rule};
use crate::symbol::Symbol;
use crate::types::MorphResult;

/// Evaluation output: channel name to setter/adder result.
pub type ResultTable = HashMap<Arc<str>, MorphResult>;

/// Aliases and rules for one archetype/sex pair.
#[derive(Debug, Default)]
pub struct RuleSet {
    table: SymbolTable,
    /// Primary alias symbol to alias.
    aliases: HashMap<Symbol, Alias>,
    /// Every alias name (primary or equivalent) to its primary symbol.
    alias_names: HashMap<Symbol, Symbol>,
    rules: HashMap<Symbol, Vec<Rule>>,
    defaults: Vec<f64>,
    values: Mutex<Vec<f64>>,
    loaded: bool,
}

impl RuleSet {
    /// Empty, unloaded rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Register alias `name` reading `reference_id`.
    ///
    /// An alias reading the same signal as an existing one shares its slot.
    /// On failure nothing is left bound.
    pub fn parse_alias(
        &mut self,
        name: &str,
        reference_id: &str,
        kind: AliasKind,
        default_value: f64,
        forms: &dyn FormLookup,
    ) -> Result<()> {
        if let Some(existing) = self
            .aliases
            .values()
            .find(|alias| alias.is_same_reference(reference_id, kind))
        {
            let (primary, slot) = (existing.symbol, existing.slot);
            if self.table.variable(name).is_some_and(|(_, s)| s == slot) {
                return Ok(());
            }
            if !self.table.add_variable(name, slot) {
                return Err(MorphError::SymbolRedefinition(name.to_string()));
            }
            let symbol = self.table.intern(name);
            self.alias_names.insert(symbol, primary);
            if let Some(alias) = self.aliases.get_mut(&primary) {
                alias.equivalent_symbols.push(symbol);
            }
            trace!(alias = name, reference = reference_id, "Alias shares an existing slot");
            return Ok(());
        }

        let slot = self.defaults.len();
        if !self.table.add_variable(name, slot) {
            return Err(MorphError::SymbolRedefinition(name.to_string()));
        }
        let Some((resolved, source)) = AliasSource::resolve(reference_id, kind, forms) else {
            self.table.remove_variable(name);
            return Err(MorphError::UnresolvedAlias {
                alias: name.to_string(),
                reference: reference_id.to_string(),
                attempted: kind.attempted(),
            });
        };

        let symbol = self.table.intern(name);
        self.defaults.push(default_value);
        self.values.get_mut().push(default_value);
        self.alias_names.insert(symbol, symbol);
        self.aliases.insert(
            symbol,
            Alias {
                symbol,
                reference_id: reference_id.to_string(),
                kind: resolved,
                source,
                slot,
                equivalent_symbols: Vec::new(),
            },
        );
        trace!(alias = name, reference = reference_id, kind = %resolved, slot, "Alias registered");
        Ok(())
    }

    /// Compile `expr_text` as a rule for channel `target`.
    ///
    /// Setters always replace the channel's rules. Rules that would make
    /// `target` depend on itself through morph aliases are rejected.
    pub fn parse_rule(
        &mut self,
        target: &str,
        expr_text: &str,
        is_setter: bool,
        policy: CollisionPolicy,
    ) -> Result<()> {
        let expr = compile(expr_text, &self.table).map_err(|source| MorphError::Compile {
            target: target.to_string(),
            source,
        })?;
        let target_symbol = self.table.intern(target);
        let rule = Rule::new(target_symbol, is_setter, expr);

        if let Some(symbol) = self.find_cycle(target, &rule.external_refs) {
            return Err(MorphError::CircularReference {
                target: target.to_string(),
                symbol: self.table.pool().resolve(symbol).to_string(),
            });
        }

        let policy = if is_setter {
            CollisionPolicy::Overwrite
        } else {
            policy
        };
        debug!(channel = target, setter = is_setter, ?policy, "Rule parsed");
        insert_rule(self.rules.entry(target_symbol).or_default(), rule, policy);
        Ok(())
    }

    /// Depth-first walk over morph aliases reachable from `refs`.
    ///
    /// Returns the alias through which `target` is reached.
    fn find_cycle(&self, target: &str, refs: &[Symbol]) -> Option<Symbol> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<Symbol> = refs.to_vec();

        while let Some(symbol) = stack.pop() {
            let Some(alias) = self
                .alias_names
                .get(&symbol)
                .and_then(|primary| self.aliases.get(primary))
            else {
                continue;
            };
            let Some(channel) = alias.morph_channel() else {
                continue;
            };
            if channel == target {
                return Some(symbol);
            }
            if !visited.insert(channel) {
                continue;
            }
            let dependents = self
                .table
                .pool()
                .get(channel)
                .and_then(|c| self.rules.get(&c));
            for rule in dependents.into_iter().flatten() {
                stack.extend(rule.external_refs.iter().copied());
            }
        }
        None
    }

    /// Drop every alias and rule and mark the set unloaded.
    pub fn clear(&mut self) {
        self.table.clear();
        self.aliases.clear();
        self.alias_names.clear();
        self.rules.clear();
        self.defaults.clear();
        self.values.get_mut().clear();
        self.loaded = false;
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether at least one script was parsed into this set.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether `name` is a bound alias.
    #[must_use]
    pub fn has_symbol(&self, name: &str) -> bool {
        self.table.contains(name)
    }

    /// Number of distinct alias slots.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Number of channels with at least one rule.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.rules.values().filter(|r| !r.is_empty()).count()
    }

    /// Rules targeting `channel`, in evaluation order.
    #[must_use]
    pub fn rules_for(&self, channel: &str) -> &[Rule] {
        self.table
            .pool()
            .get(channel)
            .and_then(|symbol| self.rules.get(&symbol))
            .map_or(&[], Vec::as_slice)
    }

    /// The alias bound to `name`, following equivalent names.
    #[must_use]
    pub fn alias(&self, name: &str) -> Option<&Alias> {
        let symbol = self.table.pool().get(name)?;
        self.alias_names
            .get(&symbol)
            .and_then(|primary| self.aliases.get(primary))
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Take the snapshot lock for one evaluation pass.
    pub fn lock(&self) -> EvaluationPass<'_> {
        EvaluationPass {
            set: self,
            values: self.values.lock(),
        }
    }

    /// Refresh every alias from `character` and evaluate, as one unit.
    pub fn snapshot_and_evaluate<C: CharacterModel + ?Sized>(&self, character: &C) -> ResultTable {
        let mut pass = self.lock();
        pass.snapshot(character);
        pass.evaluate()
    }

    /// Evaluate against the current snapshot.
    #[must_use]
    pub fn evaluate(&self) -> ResultTable {
        self.lock().evaluate()
    }

    /// Overwrite one alias slot. Returns `false` for unknown names.
    pub fn set_symbol_value(&self, name: &str, value: f64) -> bool {
        self.lock().set_symbol_value(name, value)
    }

    /// Current snapshot value of every alias name, equivalents included.
    #[must_use]
    pub fn values(&self) -> HashMap<String, f64> {
        self.lock().values()
    }
}

/// Exclusive access to a rule set's value snapshot.
pub struct EvaluationPass<'a> {
    set: &'a RuleSet,
    values: MutexGuard<'a, Vec<f64>>,
}

impl EvaluationPass<'_> {
    /// Refresh every alias slot from `character`.
    pub fn snapshot<C: CharacterModel + ?Sized>(&mut self, character: &C) {
        for alias in self.set.aliases.values() {
            if let Some(slot) = self.values.get_mut(alias.slot) {
                *slot = alias.source.read(character);
            }
        }
    }

    /// Overwrite one alias slot. Returns `false` for unknown names.
    pub fn set_symbol_value(&mut self, name: &str, value: f64) -> bool {
        let Some((_, slot)) = self.set.table.variable(name) else {
            return false;
        };
        match self.values.get_mut(slot) {
            Some(entry) => {
                *entry = value;
                true
            }
            None => false,
        }
    }

    /// Reset every slot to its alias default.
    pub fn reset(&mut self) {
        self.values.clone_from(&self.set.defaults);
    }

    /// Evaluate every channel against the held snapshot.
    ///
    /// A setter decides its channel alone. Adders are summed and a zero sum
    /// is omitted. Non-finite results contribute nothing; a channel whose
    /// setter is non-finite gets no result at all.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn evaluate(&self) -> ResultTable {
        let pool = self.set.table.pool();
        let mut results = ResultTable::with_capacity(self.set.rules.len());

        for (channel, rules) in &self.set.rules {
            let mut sum = 0.0_f64;
            let mut setter = None;
            for rule in rules {
                let value = rule.evaluate(&self.values);
                if rule.is_setter {
                    setter = Some(value);
                    break;
                }
                sum += value.unwrap_or(0.0);
            }

            let result = match setter {
                Some(Some(value)) => MorphResult {
                    is_setter: true,
                    value: value as f32,
                },
                // A setter that failed still owns its channel.
                Some(None) => continue,
                None if sum == 0.0 => continue,
                None => MorphResult {
                    is_setter: false,
                    value: sum as f32,
                },
            };
            results.insert(pool.resolve_shared(*channel), result);
        }
        results
    }

    /// Current value of every alias name.
    #[must_use]
    pub fn values(&self) -> HashMap<String, f64> {
        let pool = self.set.table.pool();
        self.set
            .alias_names
            .iter()
            .filter_map(|(name, primary)| {
                let slot = self.set.aliases.get(primary)?.slot;
                let value = *self.values.get(slot)?;
                Some((pool.resolve(*name).to_string(), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::testing::{MockCharacter, MockForms};
    use crate::types::AttributeId;

    fn set_with_aliases(forms: &MockForms) -> RuleSet {
        let mut set = RuleSet::new();
        set.parse_alias("str", "AttrStrength", AliasKind::ActorValue, 0.0, forms)
            .expect("str");
        set.parse_alias("heavy", "ArmorHeavy", AliasKind::WornKeyword, 0.0, forms)
            .expect("heavy");
        set
    }

    fn value(results: &ResultTable, channel: &str) -> Option<MorphResult> {
        results.get(channel).copied()
    }

    #[test]
    fn equivalent_aliases_share_a_slot() {
        let forms = MockForms::standard();
        let mut set = set_with_aliases(&forms);
        set.parse_alias("strength", "AttrStrength", AliasKind::Any, 5.0, &forms)
            .expect("equivalent");

        assert_eq!(set.alias_count(), 2);
        assert!(set.has_symbol("strength"));
        assert!(set.set_symbol_value("strength", 42.0));
        let values = set.values();
        assert!((values["str"] - 42.0).abs() < 1e-9);
        assert!((values["strength"] - 42.0).abs() < 1e-9);
    }

    #[test]
    fn redefinition_and_illegal_names() {
        let forms = MockForms::standard();
        let mut set = set_with_aliases(&forms);
        let err = set
            .parse_alias("str", "AttrEndurance", AliasKind::ActorValue, 0.0, &forms)
            .unwrap_err();
        assert!(matches!(err, MorphError::SymbolRedefinition(_)));

        let err = set
            .parse_alias("max", "AttrEndurance", AliasKind::ActorValue, 0.0, &forms)
            .unwrap_err();
        assert!(matches!(err, MorphError::SymbolRedefinition(_)));
    }

    #[test]
    fn failed_resolution_leaves_nothing_bound() {
        let forms = MockForms::standard();
        let mut set = RuleSet::new();
        let err = set
            .parse_alias("missing", "NoSuchForm", AliasKind::ActorValue, 0.0, &forms)
            .unwrap_err();
        assert!(err.to_string().contains("Cannot parse as ActorValue"));
        assert!(!set.has_symbol("missing"));
        assert!(set.values().is_empty());
        // The name is free again.
        set.parse_alias("missing", "AttrStrength", AliasKind::ActorValue, 0.0, &forms)
            .expect("rebind");
    }

    #[test]
    fn setter_wins_over_adders() {
        let forms = MockForms::standard();
        let mut set = set_with_aliases(&forms);
        set.parse_rule("Thin", "0.1", false, CollisionPolicy::Append)
            .expect("adder");
        set.parse_rule("Thin", "0.2", false, CollisionPolicy::Append)
            .expect("adder");
        let results = set.evaluate();
        let thin = value(&results, "Thin").expect("thin");
        assert!(!thin.is_setter);
        assert!((thin.value - 0.3).abs() < 1e-6);

        set.parse_rule("Thin", "0.7", true, CollisionPolicy::Append)
            .expect("setter");
        assert_eq!(set.rules_for("Thin").len(), 1);
        let thin = value(&set.evaluate(), "Thin").expect("thin");
        assert!(thin.is_setter);
        assert!((thin.value - 0.7).abs() < 1e-6);
    }

    #[test]
    fn zero_adders_are_omitted_but_zero_setters_are_kept() {
        let forms = MockForms::standard();
        let mut set = set_with_aliases(&forms);
        set.parse_rule("A", "heavy * 0.5", false, CollisionPolicy::Append)
            .expect("adder");
        set.parse_rule("B", "heavy * 0.5", true, CollisionPolicy::Append)
            .expect("setter");
        let results = set.evaluate();
        assert!(value(&results, "A").is_none());
        let b = value(&results, "B").expect("setter kept");
        assert!(b.is_setter);
        assert!(b.value.abs() < 1e-9);
    }

    #[test]
    fn non_finite_results_contribute_nothing() {
        let forms = MockForms::standard();
        let mut set = set_with_aliases(&forms);
        set.parse_rule("A", "0.2", false, CollisionPolicy::Append)
            .expect("adder");
        set.parse_rule("A", "sqrt(0 - 1)", false, CollisionPolicy::Append)
            .expect("adder");
        set.parse_rule("B", "str / 0", true, CollisionPolicy::Append)
            .expect("setter");

        let results = set.evaluate();
        let a = value(&results, "A").expect("finite adders kept");
        assert!((a.value - 0.2).abs() < 1e-6);
        assert!(value(&results, "B").is_none());

        assert!(set.set_symbol_value("str", 1.0));
        assert!(value(&set.evaluate(), "B").is_none());
    }

    #[test]
    fn snapshot_reads_the_character() {
        let forms = MockForms::standard();
        let mut set = set_with_aliases(&forms);
        set.parse_rule("Strong", "str / 100", true, CollisionPolicy::Overwrite)
            .expect("rule");
        set.mark_loaded();

        let mut character = MockCharacter::new();
        character.attributes.insert(AttributeId(1), 80.0);
        let results = set.snapshot_and_evaluate(&character);
        let strong = value(&results, "Strong").expect("strong");
        assert!((strong.value - 0.8).abs() < 1e-6);
        assert!(set.is_loaded());
    }

    #[test]
    fn direct_and_transitive_cycles_are_rejected() {
        let forms = MockForms::standard();
        let mut set = RuleSet::new();
        set.parse_alias("a", "ChanA", AliasKind::Morph, 0.0, &forms)
            .expect("a");
        set.parse_alias("b", "ChanB", AliasKind::Morph, 0.0, &forms)
            .expect("b");

        let err = set
            .parse_rule("ChanA", "a + 1", false, CollisionPolicy::Append)
            .unwrap_err();
        assert!(matches!(err, MorphError::CircularReference { .. }));

        set.parse_rule("ChanB", "a * 2", false, CollisionPolicy::Append)
            .expect("ChanB <- ChanA");
        let err = set
            .parse_rule("ChanA", "b", false, CollisionPolicy::Append)
            .unwrap_err();
        assert!(matches!(err, MorphError::CircularReference { ref symbol, .. } if symbol == "a"));
        assert!(set.rules_for("ChanA").is_empty());
    }

    #[test]
    fn shared_dependencies_are_walked_once() {
        let forms = MockForms::standard();
        let mut set = RuleSet::new();
        for (name, channel) in [("x", "X"), ("y", "Y"), ("z", "Z")] {
            set.parse_alias(name, channel, AliasKind::Morph, 0.0, &forms)
                .expect("alias");
        }
        // Diamond: W <- Y, Z and Y <- X, Z <- X.
        set.parse_rule("Y", "x", false, CollisionPolicy::Append)
            .expect("Y <- X");
        set.parse_rule("Z", "x", false, CollisionPolicy::Append)
            .expect("Z <- X");
        set.parse_rule("W", "y + z", false, CollisionPolicy::Append)
            .expect("W <- Y, Z");
        assert_eq!(set.channel_count(), 3);

        let err = set
            .parse_rule("X", "y * z", false, CollisionPolicy::Append)
            .unwrap_err();
        assert!(matches!(err, MorphError::CircularReference { .. }));
    }

    #[test]
    fn clear_resets_everything() {
        let forms = MockForms::standard();
        let mut set = set_with_aliases(&forms);
        set.parse_rule("Thin", "str", false, CollisionPolicy::Append)
            .expect("rule");
        set.mark_loaded();
        set.clear();
        assert!(!set.is_loaded());
        assert!(!set.has_symbol("str"));
        assert_eq!(set.channel_count(), 0);
    }
}
