//! A single compiled morph rule.

use crate::expr::CompiledExpr;
use crate::symbol::Symbol;

/// How a newly parsed rule merges with the rules already targeting the
/// same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Replace every existing rule for the channel.
    #[default]
    Overwrite,
    /// Add an adder after the existing ones.
    Append,
}

/// One compiled expression targeting one channel.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Target channel.
    pub target: Symbol,
    /// Setters assign the channel; adders accumulate into it.
    pub is_setter: bool,
    /// Compiled expression.
    pub expr: CompiledExpr,
    /// Aliases referenced by the expression.
    pub external_refs: Vec<Symbol>,
    /// Locals declared by the expression.
    pub internal_vars: Vec<String>,
}

impl Rule {
    /// Wrap a compiled expression, taking its reference lists.
    #[must_use]
    pub fn new(target: Symbol, is_setter: bool, expr: CompiledExpr) -> Self {
        let external_refs = expr.variables().to_vec();
        let internal_vars = expr.locals().to_vec();
        Self {
            target,
            is_setter,
            expr,
            external_refs,
            internal_vars,
        }
    }

    /// Evaluate against the snapshot slots. Non-finite results are `None`.
    #[must_use]
    pub fn evaluate(&self, slots: &[f64]) -> Option<f64> {
        let value = self.expr.evaluate(slots);
        value.is_finite().then_some(value)
    }
}

/// Merge `rule` into the channel's rule list under `policy`.
///
/// At most one setter survives per channel. Appending an adder onto a
/// setter replaces the setter.
pub(crate) fn insert_rule(list: &mut Vec<Rule>, rule: Rule, policy: CollisionPolicy) {
    let replace = rule.is_setter
        || policy == CollisionPolicy::Overwrite
        || list.last().is_some_and(|last| last.is_setter);
    if replace {
        list.clear();
    }
    list.push(rule);
}
