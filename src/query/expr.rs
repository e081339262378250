//! Filter expression trees.
//!
//! [`Expr`] is what a statement compiles to: fields, operators, literals and
//! positional parameters. Binding it against a snapshot of the parameter
//! values yields a [`Predicate`], which is evaluated row by row and renders
//! to the canonical filter text handed to connectors.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::error::StatementError;
use crate::geo::{self, GeoPoint};
use crate::types::{AccessMap, GEOHASH_KEY, LATITUDE_KEY, LONGITUDE_KEY};

use super::operators::{
    compare_comparable, get_field_value, like_regex, like_subject, values_equal,
};

// ============================================================================
// Unbound expression
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Value),
    /// Zero-based position in the statement's parameter list.
    Param(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Like {
        operand: Operand,
        pattern: Operand,
        negated: bool,
    },
    In {
        operand: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    Const(bool),
}

impl Expr {
    /// Highest parameter position referenced, if any.
    pub fn max_param(&self) -> Option<usize> {
        fn operand(o: &Operand) -> Option<usize> {
            match o {
                Operand::Param(i) => Some(*i),
                _ => None,
            }
        }
        match self {
            Self::And(items) | Self::Or(items) => items.iter().filter_map(Expr::max_param).max(),
            Self::Not(inner) => inner.max_param(),
            Self::Compare { left, right, .. } => operand(left).max(operand(right)),
            Self::Like {
                operand: o,
                pattern,
                ..
            } => operand(o).max(operand(pattern)),
            Self::In { operand: o, list, .. } => list.iter().filter_map(operand).max().max(operand(o)),
            Self::IsNull { operand: o, .. } => operand(o),
            Self::Between {
                operand: o,
                low,
                high,
                ..
            } => operand(o).max(operand(low)).max(operand(high)),
            Self::Const(_) => None,
        }
    }

    /// Substitute parameter snapshots and compile LIKE patterns.
    pub fn bind(&self, params: &[Value]) -> Result<Predicate, StatementError> {
        Ok(match self {
            Self::And(items) => Predicate::And(
                items
                    .iter()
                    .map(|e| e.bind(params))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Or(items) => Predicate::Or(
                items
                    .iter()
                    .map(|e| e.bind(params))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Not(inner) => Predicate::Not(Box::new(inner.bind(params)?)),
            Self::Compare { left, op, right } => Predicate::Compare {
                left: bind_operand(left, params)?,
                op: *op,
                right: bind_operand(right, params)?,
            },
            Self::Like {
                operand,
                pattern,
                negated,
            } => {
                let term = bind_operand(operand, params)?;
                let pattern = match bind_operand(pattern, params)? {
                    Term::Literal(Value::String(s)) => s,
                    Term::Literal(other) => like_subject(&other).unwrap_or_default(),
                    Term::Field(f) => {
                        return Err(StatementError::Unsupported(format!(
                            "LIKE pattern must be a literal, found field {f}"
                        )))
                    }
                };
                let regex = like_regex(&pattern)?;
                Predicate::Like {
                    term,
                    pattern,
                    regex,
                    negated: *negated,
                }
            }
            Self::In {
                operand,
                list,
                negated,
            } => {
                let mut terms = Vec::with_capacity(list.len());
                for item in list {
                    match bind_operand(item, params)? {
                        Term::Literal(Value::Array(values)) => {
                            terms.extend(values.into_iter().map(Term::Literal))
                        }
                        term => terms.push(term),
                    }
                }
                Predicate::In {
                    term: bind_operand(operand, params)?,
                    list: terms,
                    negated: *negated,
                }
            }
            Self::IsNull { operand, negated } => Predicate::IsNull {
                term: bind_operand(operand, params)?,
                negated: *negated,
            },
            Self::Between {
                operand,
                low,
                high,
                negated,
            } => Predicate::Between {
                term: bind_operand(operand, params)?,
                low: bind_operand(low, params)?,
                high: bind_operand(high, params)?,
                negated: *negated,
            },
            Self::Const(b) => Predicate::Const(*b),
        })
    }
}

fn bind_operand(operand: &Operand, params: &[Value]) -> Result<Term, StatementError> {
    Ok(match operand {
        Operand::Field(f) => Term::Field(f.clone()),
        Operand::Literal(v) => Term::Literal(v.clone()),
        Operand::Param(i) => Term::Literal(params.get(*i).cloned().ok_or(
            StatementError::MissingParameter {
                index: *i,
                provided: params.len(),
            },
        )?),
    })
}

// ============================================================================
// Bound predicate
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Field(String),
    Literal(Value),
}

impl Term {
    fn resolve<'a>(&'a self, doc: &'a Value) -> &'a Value {
        match self {
            Self::Field(path) => get_field_value(doc, path).unwrap_or(&Value::Null),
            Self::Literal(v) => v,
        }
    }
}

/// Proximity filter: geohash-cell pre-filter, then exact distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Near {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub cells: Arc<Vec<String>>,
}

#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        left: Term,
        op: CompareOp,
        right: Term,
    },
    Like {
        term: Term,
        pattern: String,
        regex: Regex,
        negated: bool,
    },
    In {
        term: Term,
        list: Vec<Term>,
        negated: bool,
    },
    IsNull {
        term: Term,
        negated: bool,
    },
    Between {
        term: Term,
        low: Term,
        high: Term,
        negated: bool,
    },
    /// `map[subject] = true` on the record's ownership or viewer map.
    Access {
        map: AccessMap,
        subject: String,
    },
    Near(Near),
    Const(bool),
}

impl Predicate {
    /// Conjunction that drops `TRUE` members and collapses singletons.
    pub fn all(items: Vec<Predicate>) -> Predicate {
        let mut items: Vec<Predicate> = items
            .into_iter()
            .filter(|p| !matches!(p, Predicate::Const(true)))
            .collect();
        match items.len() {
            0 => Predicate::Const(true),
            1 => items.remove(0),
            _ => Predicate::And(items),
        }
    }

    /// Disjunction that collapses singletons.
    pub fn any(mut items: Vec<Predicate>) -> Predicate {
        match items.len() {
            0 => Predicate::Const(false),
            1 => items.remove(0),
            _ => Predicate::Or(items),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::And(items) => items.iter().all(|p| p.matches(doc)),
            Self::Or(items) => items.iter().any(|p| p.matches(doc)),
            Self::Not(inner) => !inner.matches(doc),
            Self::Compare { left, op, right } => {
                let a = left.resolve(doc);
                let b = right.resolve(doc);
                match op {
                    CompareOp::Eq => values_equal(a, b),
                    CompareOp::NotEq => !a.is_null() && !b.is_null() && !values_equal(a, b),
                    CompareOp::Lt => compare_comparable(a, b).is_some_and(|o| o.is_lt()),
                    CompareOp::LtEq => compare_comparable(a, b).is_some_and(|o| o.is_le()),
                    CompareOp::Gt => compare_comparable(a, b).is_some_and(|o| o.is_gt()),
                    CompareOp::GtEq => compare_comparable(a, b).is_some_and(|o| o.is_ge()),
                }
            }
            Self::Like {
                term,
                regex,
                negated,
                ..
            } => match like_subject(term.resolve(doc)) {
                Some(text) => regex.is_match(&text) != *negated,
                None => false,
            },
            Self::In {
                term,
                list,
                negated,
            } => {
                let value = term.resolve(doc);
                if value.is_null() {
                    return false;
                }
                list.iter().any(|t| values_equal(value, t.resolve(doc))) != *negated
            }
            Self::IsNull { term, negated } => term.resolve(doc).is_null() != *negated,
            Self::Between {
                term,
                low,
                high,
                negated,
            } => {
                let value = term.resolve(doc);
                let inside = compare_comparable(value, low.resolve(doc)).is_some_and(|o| o.is_ge())
                    && compare_comparable(value, high.resolve(doc)).is_some_and(|o| o.is_le());
                if value.is_null() {
                    false
                } else {
                    inside != *negated
                }
            }
            Self::Access { map, subject } => doc
                .get(map.key())
                .and_then(|m| m.get(subject))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Self::Near(near) => near_matches(near, doc),
            Self::Const(b) => *b,
        }
    }
}

fn near_matches(near: &Near, doc: &Value) -> bool {
    let hash = match doc.get(GEOHASH_KEY).and_then(Value::as_str) {
        Some(h) => h,
        None => return false,
    };
    if !near.cells.iter().any(|cell| hash.starts_with(cell.as_str())) {
        return false;
    }
    let lat = doc.get(LATITUDE_KEY).and_then(Value::as_f64);
    let lon = doc.get(LONGITUDE_KEY).and_then(Value::as_f64);
    match (lat, lon) {
        (Some(latitude), Some(longitude)) => {
            geo::distance_km(near.center, GeoPoint::new(latitude, longitude)) <= near.radius_km
        }
        _ => false,
    }
}

// ============================================================================
// Canonical text
// ============================================================================

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("NULL"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write!(f, "{n}"),
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        other => write!(f, "'{}'", other.to_string().replace('\'', "''")),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Literal(v) => write_literal(f, v),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Predicate], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match item {
            Predicate::And(_) | Predicate::Or(_) => write!(f, "({item})")?,
            _ => write!(f, "{item}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(items) => write_joined(f, items, " AND "),
            Self::Or(items) => write_joined(f, items, " OR "),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
            Self::Compare { left, op, right } => write!(f, "{left} {} {right}", op.symbol()),
            Self::Like {
                term,
                pattern,
                negated,
                ..
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{term} {not}LIKE '{}'", pattern.replace('\'', "''"))
            }
            Self::In {
                term,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{term} {not}IN (")?;
                for (i, t) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{t}")?;
                }
                f.write_str(")")
            }
            Self::IsNull { term, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{term} IS {not}NULL")
            }
            Self::Between {
                term,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{term} {not}BETWEEN {low} AND {high}")
            }
            Self::Access { map, subject } => {
                write!(f, "{}['{}'] = true", map.key(), subject.replace('\'', "''"))
            }
            Self::Near(near) => write!(
                f,
                "NEAR({}, {}, {})",
                near.center.latitude, near.center.longitude, near.radius_km
            ),
            Self::Const(true) => f.write_str("TRUE"),
            Self::Const(false) => f.write_str("FALSE"),
        }
    }
}
