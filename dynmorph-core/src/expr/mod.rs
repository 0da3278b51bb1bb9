//! Expression compiler for morph rules.
//!
//! Rules are short arithmetic programs such as `str / 100` or
//! `var w := clamp(0, weight, 1); w * 0.5 + armored * 0.2`. They are
//! compiled once against a [`SymbolTable`] whose variables are bound to
//! value slots, then evaluated many times against a slot array.
//!
//! ## Language
//!
//! - literals: `1`, `0.25`, `1e-3`; constants `pi`, `epsilon`, `inf`,
//!   `true`, `false`
//! - operators (loosest first): `?:`, `or`/`||`, `and`/`&&`,
//!   `==`/`!=`/`<>`, `<`/`<=`/`>`/`>=`, `+`/`-`, `*`/`/`/`%`,
//!   unary `-`/`+`/`!`/`not`, `^` (right associative)
//! - functions: see [`Function`], plus `if(cond, then, else)`
//! - statements separated by `;`; `var name := expr` declares a local.
//!   The value of the program is the value of its last statement.
//!
//! Comparisons and logical operators yield `1.0` or `0.0`; any non-zero
//! value counts as true.

mod lexer;
mod parser;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::symbol::{Symbol, SymbolPool};

/// Numeric constants available in every expression.
pub const CONSTANTS: [(&str, f64); 5] = [
    ("pi", std::f64::consts::PI),
    ("epsilon", 1e-6),
    ("inf", f64::INFINITY),
    ("true", 1.0),
    ("false", 0.0),
];

/// Keywords that can never be used as symbol names.
const KEYWORDS: [&str; 5] = ["var", "and", "or", "not", "if"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What went wrong while compiling an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileErrorKind {
    /// A character that starts no token.
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    /// A malformed numeric literal.
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    /// A token that does not fit the grammar here.
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    /// The source ended mid-expression.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// The source contains no statement at all.
    #[error("empty expression")]
    Empty,
    /// A name that is neither a constant, a local nor a table variable.
    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),
    /// A call to a function that does not exist.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    /// A function called with the wrong number of arguments.
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        /// Function name.
        name: String,
        /// Expected count, human readable.
        expected: String,
        /// Supplied count.
        found: usize,
    },
    /// A local declaration shadows an existing name.
    #[error("local variable '{0}' redefines an existing symbol")]
    Redefinition(String),
    /// Nesting beyond what the compiler accepts.
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Compiler error with the byte offset where it was detected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at position {position}")]
pub struct CompileError {
    /// Error category.
    pub kind: CompileErrorKind,
    /// Byte offset into the source.
    pub position: usize,
}

// ---------------------------------------------------------------------------
// Symbol table
// ---------------------------------------------------------------------------

/// Names visible to expressions, each bound to a value slot.
///
/// Several names may share one slot; that is how equivalent aliases
/// reflect the same value.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    pool: SymbolPool,
    variables: HashMap<Symbol, usize>,
}

impl SymbolTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` can be declared as a variable at all.
    #[must_use]
    pub fn is_legal_name(name: &str) -> bool {
        let mut chars = name.chars();
        let starts_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        starts_ok
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !is_reserved(name)
    }

    /// Bind `name` to `slot`. Returns `false` for taken or illegal names.
    pub fn add_variable(&mut self, name: &str, slot: usize) -> bool {
        if !Self::is_legal_name(name) {
            return false;
        }
        let symbol = self.pool.intern(name);
        if self.variables.contains_key(&symbol) {
            return false;
        }
        self.variables.insert(symbol, slot);
        true
    }

    /// Unbind `name`. Returns whether it was bound.
    pub fn remove_variable(&mut self, name: &str) -> bool {
        self.pool
            .get(name)
            .is_some_and(|symbol| self.variables.remove(&symbol).is_some())
    }

    /// Slot and symbol of a bound variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<(Symbol, usize)> {
        let symbol = self.pool.get(name)?;
        self.variables.get(&symbol).map(|&slot| (symbol, slot))
    }

    /// Slot of a bound symbol.
    #[must_use]
    pub fn slot_of(&self, symbol: Symbol) -> Option<usize> {
        self.variables.get(&symbol).copied()
    }

    /// Whether `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether no variable is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Interner shared by variables and anything else the owner names.
    #[must_use]
    pub fn pool(&self) -> &SymbolPool {
        &self.pool
    }

    /// Intern a name without binding it.
    pub fn intern(&mut self, name: &str) -> Symbol {
        self.pool.intern(name)
    }

    /// Drop every binding and interned name.
    pub fn clear(&mut self) {
        self.variables.clear();
        self.pool.clear();
    }
}

fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name)
        || CONSTANTS.iter().any(|(c, _)| *c == name)
        || Function::from_name(name).is_some()
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `abs(x)`
    Abs,
    /// `min(x, ...)`
    Min,
    /// `max(x, ...)`
    Max,
    /// `sum(x, ...)`
    Sum,
    /// `avg(x, ...)`
    Avg,
    /// `clamp(lo, x, hi)`
    Clamp,
    /// `sqrt(x)`
    Sqrt,
    /// `pow(x, y)`
    Pow,
    /// `exp(x)`
    Exp,
    /// `log(x)` (natural)
    Log,
    /// `floor(x)`
    Floor,
    /// `ceil(x)`
    Ceil,
    /// `round(x)`
    Round,
    /// `sgn(x)`
    Sgn,
    /// `sin(x)`
    Sin,
    /// `cos(x)`
    Cos,
    /// `tan(x)`
    Tan,
}

/// Accepted argument counts.
#[derive(Debug, Clone, Copy)]
enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Function {
    const TABLE: [(&'static str, Self); 17] = [
        ("abs", Self::Abs),
        ("min", Self::Min),
        ("max", Self::Max),
        ("sum", Self::Sum),
        ("avg", Self::Avg),
        ("clamp", Self::Clamp),
        ("sqrt", Self::Sqrt),
        ("pow", Self::Pow),
        ("exp", Self::Exp),
        ("log", Self::Log),
        ("floor", Self::Floor),
        ("ceil", Self::Ceil),
        ("round", Self::Round),
        ("sgn", Self::Sgn),
        ("sin", Self::Sin),
        ("cos", Self::Cos),
        ("tan", Self::Tan),
    ];

    /// Look a function up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    /// Function name as written in expressions.
    #[must_use]
    pub fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, f)| *f == self)
            .map_or("?", |(n, _)| *n)
    }

    fn arity(self) -> Arity {
        match self {
            Self::Min | Self::Max | Self::Sum | Self::Avg => Arity::AtLeast(1),
            Self::Clamp => Arity::Exactly(3),
            Self::Pow => Arity::Exactly(2),
            _ => Arity::Exactly(1),
        }
    }

    fn check_arity(self, found: usize) -> Result<(), CompileErrorKind> {
        let (ok, expected) = match self.arity() {
            Arity::Exactly(n) => (found == n, n.to_string()),
            Arity::AtLeast(n) => (found >= n, format!("at least {n}")),
        };
        if ok {
            Ok(())
        } else {
            Err(CompileErrorKind::Arity {
                name: self.name().to_string(),
                expected,
                found,
            })
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply(self, args: &[f64]) -> f64 {
        let first = args.first().copied().unwrap_or(0.0);
        let arg = |i: usize| args.get(i).copied().unwrap_or(0.0);
        match self {
            Self::Abs => first.abs(),
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Sum => args.iter().sum(),
            Self::Avg => args.iter().sum::<f64>() / args.len().max(1) as f64,
            Self::Clamp => {
                let (lo, x, hi) = (arg(0), arg(1), arg(2));
                if x < lo {
                    lo
                } else if x > hi {
                    hi
                } else {
                    x
                }
            }
            Self::Sqrt => first.sqrt(),
            Self::Pow => first.powf(arg(1)),
            Self::Exp => first.exp(),
            Self::Log => first.ln(),
            Self::Floor => first.floor(),
            Self::Ceil => first.ceil(),
            Self::Round => first.round(),
            Self::Sgn => {
                if first > 0.0 {
                    1.0
                } else if first < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Self::Sin => first.sin(),
            Self::Cos => first.cos(),
            Self::Tan => first.tan(),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Number(f64),
    Variable(usize),
    Local(usize),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Conditional(Box<Node>, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Declare(usize, Node),
    Expr(Node),
}

fn truth(value: f64) -> bool {
    value != 0.0
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

impl Node {
    #[allow(clippy::float_cmp)]
    fn eval(&self, slots: &[f64], locals: &[f64]) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Variable(slot) => slots.get(*slot).copied().unwrap_or(0.0),
            Self::Local(index) => locals.get(*index).copied().unwrap_or(0.0),
            Self::Unary(op, operand) => {
                let v = operand.eval(slots, locals);
                match op {
                    UnaryOp::Neg => -v,
                    UnaryOp::Not => flag(!truth(v)),
                }
            }
            Self::Binary(op, lhs, rhs) => {
                let a = lhs.eval(slots, locals);
                match op {
                    BinaryOp::And => {
                        return flag(truth(a) && truth(rhs.eval(slots, locals)));
                    }
                    BinaryOp::Or => {
                        return flag(truth(a) || truth(rhs.eval(slots, locals)));
                    }
                    _ => {}
                }
                let b = rhs.eval(slots, locals);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Rem => a % b,
                    BinaryOp::Pow => a.powf(b),
                    BinaryOp::Lt => flag(a < b),
                    BinaryOp::Le => flag(a <= b),
                    BinaryOp::Gt => flag(a > b),
                    BinaryOp::Ge => flag(a >= b),
                    BinaryOp::Eq => flag(a == b),
                    BinaryOp::Ne => flag(a != b),
                    BinaryOp::And | BinaryOp::Or => 0.0,
                }
            }
            Self::Conditional(cond, then, otherwise) => {
                if truth(cond.eval(slots, locals)) {
                    then.eval(slots, locals)
                } else {
                    otherwise.eval(slots, locals)
                }
            }
            Self::Call(function, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(slots, locals)).collect();
                function.apply(&values)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Compiled expression
// ---------------------------------------------------------------------------

/// A compiled rule expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    statements: Vec<Statement>,
    variables: Vec<Symbol>,
    locals: Vec<String>,
}

impl CompiledExpr {
    /// Evaluate against slot values (indexed as bound in the symbol table).
    #[must_use]
    pub fn evaluate(&self, slots: &[f64]) -> f64 {
        let mut locals = vec![0.0; self.locals.len()];
        let mut last = 0.0;
        for statement in &self.statements {
            last = match statement {
                Statement::Declare(index, node) => {
                    let value = node.eval(slots, &locals);
                    if let Some(local) = locals.get_mut(*index) {
                        *local = value;
                    }
                    value
                }
                Statement::Expr(node) => node.eval(slots, &locals),
            };
        }
        last
    }

    /// Table variables referenced, in first-use order without duplicates.
    #[must_use]
    pub fn variables(&self) -> &[Symbol] {
        &self.variables
    }

    /// Locals declared with `var`, in declaration order.
    #[must_use]
    pub fn locals(&self) -> &[String] {
        &self.locals
    }

    /// Original source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Compile `source` against `table`.
///
/// # Errors
/// Returns a [`CompileError`] for syntax errors, undefined symbols,
/// unknown functions, wrong arities and runaway nesting.
pub fn compile(source: &str, table: &SymbolTable) -> Result<CompiledExpr, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::Parser::new(&tokens, table, source.len()).parse_program()?;
    Ok(CompiledExpr {
        source: source.to_string(),
        statements: program.statements,
        variables: program.variables,
        locals: program.locals,
    })
}
