//! # Typed Expression Algebra
//!
//! Internal, schema-typed form of the surface patterns. Each operation
//! is a single `match` over the closed variant set:
//!
//! - `variable_types` collects the name → type obligations;
//! - `substitute` narrows an expression under a batch of candidate
//!   bindings (set-at-a-time, driven by [`pluck_values`]);
//! - `matches` yields every micro-binding that makes a candidate value
//!   satisfy the expression.
//!
//! Comparisons keep a variable operand until it is bound; substituting
//! an operand with several candidate values replaces it by the extreme
//! bound that over-approximates the membership test, and the evaluator
//! re-applies the exact constraint when solutions merge.

use crate::error::TypeConflicts;
use crate::pattern::{CmpOp, Operand, Pattern};
use crate::value::{Ordinal, OrdinalType};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A variable binding: name → value.
pub type Context = BTreeMap<String, Ordinal>;

/// A variable-type environment: name → ordinal type.
pub type VarTypes = BTreeMap<String, OrdinalType>;

/// Read `name` from every context. `None` means the variable is not yet
/// bound everywhere; otherwise the set of bound values. This is what
/// makes substitution set-at-a-time instead of per-solution.
pub fn pluck_values(contexts: &[Context], name: &str) -> Option<BTreeSet<Ordinal>> {
    if contexts.is_empty() {
        return None;
    }
    let mut values = BTreeSet::new();
    for ctx in contexts {
        match ctx.get(name) {
            Some(value) => {
                values.insert(value.clone());
            }
            None => return None,
        }
    }
    Some(values)
}

/// Merge two contexts; `None` when they disagree on a shared name.
pub fn merge_contexts(left: &Context, right: &Context) -> Option<Context> {
    let mut merged = left.clone();
    for (name, value) in right {
        match merged.get(name) {
            Some(existing) if existing != value => return None,
            _ => {
                merged.insert(name.clone(), value.clone());
            }
        }
    }
    Some(merged)
}

/// Typed operand of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmpSide {
    Var { name: String, data_type: OrdinalType },
    Const(Ordinal),
}

impl CmpSide {
    fn data_type(&self) -> OrdinalType {
        match self {
            CmpSide::Var { data_type, .. } => *data_type,
            CmpSide::Const(value) => value.ordinal_type(),
        }
    }
}

impl fmt::Display for CmpSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpSide::Var { name, data_type } => write!(f, "?{name}: {data_type}"),
            CmpSide::Const(value) => write!(f, "{value}"),
        }
    }
}

/// A typed expression over one position of a triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A literal ordinal.
    Const(Ordinal),
    /// A named, typed variable.
    Var { name: String, data_type: OrdinalType },
    /// A variable constrained to a finite value set. An empty set can
    /// never match and marks the enclosing clause dead.
    In {
        name: String,
        values: BTreeSet<Ordinal>,
        data_type: OrdinalType,
    },
    /// An anonymous wildcard.
    Any { data_type: OrdinalType },
    /// A comparison; unbound variable operands bind to the candidate
    /// value at match time.
    Cmp {
        op: CmpOp,
        left: CmpSide,
        right: CmpSide,
    },
    /// Conjunction of two constraints over the same position.
    And(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Type a surface pattern against the expected ordinal type.
    /// Mistyped literals are recorded under `position` (the attribute
    /// name for value positions, the entity marker otherwise); the
    /// caller rejects the result if any conflict was recorded.
    pub fn from_pattern(
        pattern: &Pattern,
        position: &str,
        expected: OrdinalType,
        conflicts: &mut TypeConflicts,
    ) -> Expr {
        match pattern {
            Pattern::Is(value) => {
                record_conflict(conflicts, position, expected, value.ordinal_type());
                Expr::Const(value.clone())
            }
            Pattern::Var(name) => Expr::Var {
                name: name.clone(),
                data_type: expected,
            },
            Pattern::In(name, values) => {
                for value in values {
                    record_conflict(conflicts, name, expected, value.ordinal_type());
                }
                Expr::In {
                    name: name.clone(),
                    values: values.clone(),
                    data_type: expected,
                }
            }
            Pattern::Any => Expr::Any {
                data_type: expected,
            },
            Pattern::Cmp(op, left, right) => {
                let side = |operand: &Operand, conflicts: &mut TypeConflicts| {
                    match operand {
                        Operand::Var(name) => CmpSide::Var {
                            name: name.clone(),
                            data_type: expected,
                        },
                        Operand::Const(value) => {
                            record_conflict(
                                conflicts,
                                position,
                                expected,
                                value.ordinal_type(),
                            );
                            CmpSide::Const(value.clone())
                        }
                    }
                };
                Expr::Cmp {
                    op: *op,
                    left: side(left, conflicts),
                    right: side(right, conflicts),
                }
            }
            Pattern::And(left, right) => Expr::And(
                Box::new(Expr::from_pattern(left, position, expected, conflicts)),
                Box::new(Expr::from_pattern(right, position, expected, conflicts)),
            ),
        }
    }

    /// The ordinal type this expression ranges over.
    pub fn data_type(&self) -> OrdinalType {
        match self {
            Expr::Const(value) => value.ordinal_type(),
            Expr::Var { data_type, .. }
            | Expr::In { data_type, .. }
            | Expr::Any { data_type } => *data_type,
            Expr::Cmp { left, .. } => left.data_type(),
            Expr::And(left, _) => left.data_type(),
        }
    }

    /// Name → type obligations this expression contributes.
    pub fn variable_types(&self) -> VarTypes {
        let mut types = VarTypes::new();
        self.collect_variable_types(&mut types);
        types
    }

    fn collect_variable_types(&self, out: &mut VarTypes) {
        match self {
            Expr::Const(_) | Expr::Any { .. } => {}
            Expr::Var { name, data_type } | Expr::In { name, data_type, .. } => {
                out.insert(name.clone(), *data_type);
            }
            Expr::Cmp { left, right, .. } => {
                for side in [left, right] {
                    if let CmpSide::Var { name, data_type } = side {
                        out.insert(name.clone(), *data_type);
                    }
                }
            }
            Expr::And(left, right) => {
                left.collect_variable_types(out);
                right.collect_variable_types(out);
            }
        }
    }

    /// Names of the free variables in this expression.
    pub fn var_names(&self) -> BTreeSet<String> {
        self.variable_types().into_keys().collect()
    }

    /// Number of anonymous wildcards in this expression.
    pub fn wildcards(&self) -> u32 {
        match self {
            Expr::Any { .. } => 1,
            Expr::And(left, right) => left.wildcards() + right.wildcards(),
            _ => 0,
        }
    }

    /// The literal value, when the expression is fully ground.
    pub fn as_const(&self) -> Option<&Ordinal> {
        match self {
            Expr::Const(value) => Some(value),
            _ => None,
        }
    }

    /// True when no value can ever satisfy this expression: an empty
    /// membership set, a false constant comparison, or a conjunction
    /// with a dead arm.
    pub fn is_unsatisfiable(&self) -> bool {
        match self {
            Expr::In { values, .. } => values.is_empty(),
            Expr::Cmp {
                op,
                left: CmpSide::Const(a),
                right: CmpSide::Const(b),
            } => !op.eval(a, b),
            Expr::And(left, right) => {
                left.is_unsatisfiable() || right.is_unsatisfiable()
            }
            _ => false,
        }
    }

    /// Narrow this expression under a batch of candidate bindings.
    pub fn substitute(&self, contexts: &[Context]) -> Expr {
        match self {
            Expr::Const(_) | Expr::Any { .. } => self.clone(),
            Expr::Var { name, data_type } => match pluck_values(contexts, name) {
                None => self.clone(),
                Some(values) if values.len() == 1 => {
                    Expr::Const(values.into_iter().next().unwrap_or_else(|| {
                        unreachable!("singleton set has a first element")
                    }))
                }
                Some(values) => Expr::In {
                    name: name.clone(),
                    values,
                    data_type: *data_type,
                },
            },
            Expr::In {
                name,
                values,
                data_type,
            } => match pluck_values(contexts, name) {
                None => self.clone(),
                Some(bound) => {
                    let narrowed: BTreeSet<Ordinal> =
                        values.intersection(&bound).cloned().collect();
                    if narrowed.len() == 1 {
                        Expr::Const(narrowed.into_iter().next().unwrap_or_else(
                            || unreachable!("singleton set has a first element"),
                        ))
                    } else {
                        Expr::In {
                            name: name.clone(),
                            values: narrowed,
                            data_type: *data_type,
                        }
                    }
                }
            },
            Expr::Cmp { op, left, right } => Expr::Cmp {
                op: *op,
                left: substitute_cmp_side(left, contexts, *op, true),
                right: substitute_cmp_side(right, contexts, *op, false),
            },
            Expr::And(left, right) => Expr::And(
                Box::new(left.substitute(contexts)),
                Box::new(right.substitute(contexts)),
            ),
        }
    }

    /// Every micro-binding that makes `value` satisfy this expression.
    /// An empty result means no match. A comparison with two distinct
    /// unbound variables yields one candidate binding per side; the
    /// deferred relation is re-applied when solutions merge.
    pub fn matches(&self, value: &Ordinal) -> Vec<Context> {
        match self {
            Expr::Const(literal) => {
                if literal == value {
                    vec![Context::new()]
                } else {
                    vec![]
                }
            }
            Expr::Var { name, data_type } => {
                if value.ordinal_type() == *data_type {
                    vec![single_binding(name, value)]
                } else {
                    vec![]
                }
            }
            Expr::In { name, values, .. } => {
                if values.contains(value) {
                    vec![single_binding(name, value)]
                } else {
                    vec![]
                }
            }
            Expr::Any { data_type } => {
                if value.ordinal_type() == *data_type {
                    vec![Context::new()]
                } else {
                    vec![]
                }
            }
            Expr::Cmp { op, left, right } => match (left, right) {
                (CmpSide::Const(a), CmpSide::Const(b)) => {
                    if op.eval(a, b) {
                        vec![Context::new()]
                    } else {
                        vec![]
                    }
                }
                (CmpSide::Var { name, data_type }, CmpSide::Const(bound)) => {
                    if value.ordinal_type() == *data_type && op.eval(value, bound) {
                        vec![single_binding(name, value)]
                    } else {
                        vec![]
                    }
                }
                (CmpSide::Const(bound), CmpSide::Var { name, data_type }) => {
                    if value.ordinal_type() == *data_type && op.eval(bound, value) {
                        vec![single_binding(name, value)]
                    } else {
                        vec![]
                    }
                }
                (
                    CmpSide::Var {
                        name: left_name,
                        data_type,
                    },
                    CmpSide::Var {
                        name: right_name, ..
                    },
                ) => {
                    if value.ordinal_type() != *data_type {
                        return vec![];
                    }
                    if left_name == right_name {
                        if op.eval(value, value) {
                            vec![single_binding(left_name, value)]
                        } else {
                            vec![]
                        }
                    } else {
                        vec![
                            single_binding(left_name, value),
                            single_binding(right_name, value),
                        ]
                    }
                }
            },
            Expr::And(left, right) => {
                let mut merged = Vec::new();
                for a in left.matches(value) {
                    for b in right.matches(value) {
                        if let Some(ctx) = merge_contexts(&a, &b) {
                            merged.push(ctx);
                        }
                    }
                }
                merged
            }
        }
    }
}

/// Substitute one comparison operand. A single bound value becomes a
/// literal; several bound values collapse to the extreme that keeps
/// every satisfiable pairing (`x < ?v in S` relaxes to `x < max S`).
fn substitute_cmp_side(
    side: &CmpSide,
    contexts: &[Context],
    op: CmpOp,
    is_left: bool,
) -> CmpSide {
    let CmpSide::Var { name, .. } = side else {
        return side.clone();
    };
    let Some(values) = pluck_values(contexts, name) else {
        return side.clone();
    };
    let extreme = match (op, is_left) {
        // left side: smallest value is the weakest lower operand
        (CmpOp::Lt | CmpOp::Le, true) | (CmpOp::Gt | CmpOp::Ge, false) => {
            values.iter().next()
        }
        // right side: largest value is the weakest upper operand
        (CmpOp::Lt | CmpOp::Le, false) | (CmpOp::Gt | CmpOp::Ge, true) => {
            values.iter().next_back()
        }
    };
    match extreme {
        Some(value) => CmpSide::Const(value.clone()),
        None => side.clone(),
    }
}

fn record_conflict(
    conflicts: &mut TypeConflicts,
    key: &str,
    expected: OrdinalType,
    found: OrdinalType,
) {
    if found != expected {
        let entry = conflicts.entry(key.to_string()).or_default();
        entry.insert(expected);
        entry.insert(found);
    }
}

fn single_binding(name: &str, value: &Ordinal) -> Context {
    let mut ctx = Context::new();
    ctx.insert(name.to_string(), value.clone());
    ctx
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(value) => write!(f, "{value}"),
            Expr::Var { name, data_type } => write!(f, "?{name}: {data_type}"),
            Expr::In {
                name,
                values,
                data_type,
            } => {
                let rendered: Vec<String> =
                    values.iter().map(Ordinal::to_string).collect();
                write!(f, "?{name}: {data_type} in {{{}}}", rendered.join(", "))
            }
            Expr::Any { data_type } => write!(f, "?: {data_type}"),
            Expr::Cmp { op, left, right } => write!(f, "{left} {op} {right}"),
            Expr::And(left, right) => write!(f, "({left} and {right})"),
        }
    }
}
