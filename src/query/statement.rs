//! Statements describing one live query, and their compiled form.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::StatementError;
use crate::geo::GeoPoint;
use crate::reactive::value::JsonReactive;
use crate::reactive::{Constant, LiveValue, Reactive};
use crate::types::Direction;

use super::expr::{CompareOp, Expr, Operand, Predicate};
use super::parse::parse_where;

// ============================================================================
// Param
// ============================================================================

/// A statement value: a literal, or a reactive value re-read on every
/// evaluation.
#[derive(Clone)]
pub enum Param {
    Value(Value),
    Reactive(Arc<dyn Reactive<Value>>),
}

impl Param {
    /// Wrap any typed reactive value. Its snapshots are serialized to JSON.
    pub fn live<T: Serialize + 'static>(source: Arc<dyn Reactive<T>>) -> Self {
        Self::Reactive(Arc::new(JsonReactive::new(source)))
    }

    pub fn snapshot(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Reactive(r) => r.snapshot(),
        }
    }

    pub fn as_reactive(&self) -> Option<&Arc<dyn Reactive<Value>>> {
        match self {
            Self::Value(_) => None,
            Self::Reactive(r) => Some(r),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Reactive(r) => f.debug_tuple("Reactive").field(&r.snapshot()).finish(),
        }
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

macro_rules! param_from_literal {
    ($($t:ty),*) => {
        $(impl From<$t> for Param {
            fn from(v: $t) -> Self {
                Self::Value(Value::from(v))
            }
        })*
    };
}

param_from_literal!(&str, String, bool, i32, i64, u32, u64, usize, f64);

impl<T> From<LiveValue<T>> for Param
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    fn from(v: LiveValue<T>) -> Self {
        Self::live(Arc::new(v) as Arc<dyn Reactive<T>>)
    }
}

impl<T> From<Constant<T>> for Param
where
    T: Serialize,
{
    fn from(v: Constant<T>) -> Self {
        Self::Value(serde_json::to_value(&v.0).unwrap_or(Value::Null))
    }
}

// ============================================================================
// Structured conditions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    /// Value must be an array (or a reactive array).
    In,
    NotIn,
}

/// `field <operator> value`, built by the caller instead of written as text.
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Param,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Param>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    fn to_expr(&self, param: usize) -> Expr {
        let operand = Operand::Field(self.field.clone());
        let value = Operand::Param(param);
        let compare = |op| Expr::Compare {
            left: operand.clone(),
            op,
            right: value.clone(),
        };
        match self.operator {
            Operator::Eq => compare(CompareOp::Eq),
            Operator::NotEq => compare(CompareOp::NotEq),
            Operator::Lt => compare(CompareOp::Lt),
            Operator::LtEq => compare(CompareOp::LtEq),
            Operator::Gt => compare(CompareOp::Gt),
            Operator::GtEq => compare(CompareOp::GtEq),
            Operator::Like | Operator::NotLike => Expr::Like {
                operand: operand.clone(),
                pattern: value.clone(),
                negated: self.operator == Operator::NotLike,
            },
            Operator::In | Operator::NotIn => Expr::In {
                operand: operand.clone(),
                list: vec![value.clone()],
                negated: self.operator == Operator::NotIn,
            },
        }
    }
}

// ============================================================================
// Statement
// ============================================================================

/// Filter, ordering, window and ownership modifiers for one query.
///
/// ```ignore
/// let age = LiveValue::new(2);
/// let stmt = Statement::new()
///     .filter("age = ? AND name LIKE ?")
///     .param(age.clone())
///     .param("A%")
///     .order_by("name DESC")
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Statement {
    pub filter: Option<String>,
    pub params: Vec<Param>,
    pub conditions: Vec<Condition>,
    pub order_by: Option<String>,
    pub limit: Option<Param>,
    pub offset: Option<Param>,
    pub exclude_where_iam_owner: bool,
    pub include_where_iam_owner: bool,
    pub include_where_iam_viewer: bool,
    /// Proximity filter: center and radius in kilometres.
    pub near: Option<(GeoPoint, f64)>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, text: impl Into<String>) -> Self {
        self.filter = Some(text.into());
        self
    }

    pub fn param(mut self, value: impl Into<Param>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn condition(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Param>,
    ) -> Self {
        self.conditions.push(Condition::new(field, operator, value));
        self
    }

    pub fn order_by(mut self, text: impl Into<String>) -> Self {
        self.order_by = Some(text.into());
        self
    }

    pub fn limit(mut self, value: impl Into<Param>) -> Self {
        self.limit = Some(value.into());
        self
    }

    pub fn offset(mut self, value: impl Into<Param>) -> Self {
        self.offset = Some(value.into());
        self
    }

    pub fn exclude_where_iam_owner(mut self) -> Self {
        self.exclude_where_iam_owner = true;
        self
    }

    pub fn include_where_iam_owner(mut self) -> Self {
        self.include_where_iam_owner = true;
        self
    }

    pub fn include_where_iam_viewer(mut self) -> Self {
        self.include_where_iam_viewer = true;
        self
    }

    pub fn near(mut self, center: GeoPoint, radius_km: f64) -> Self {
        self.near = Some((center, radius_km));
        self
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEntry {
    pub field: String,
    pub direction: Direction,
}

impl SortEntry {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Parse `field [ASC|DESC], ...`.
pub fn parse_order_by(text: &str) -> Result<Vec<SortEntry>, StatementError> {
    let mut entries = Vec::new();
    for part in text.split(',') {
        let tokens: Vec<&str> = part.split_whitespace().collect();
        let entry = match tokens.as_slice() {
            [] if text.trim().is_empty() => continue,
            [field] => SortEntry::new(*field, Direction::Asc),
            [field, direction] => SortEntry::new(
                *field,
                direction
                    .parse()
                    .map_err(|_| StatementError::InvalidOrderBy(text.to_string()))?,
            ),
            _ => return Err(StatementError::InvalidOrderBy(text.to_string())),
        };
        entries.push(entry);
    }
    Ok(entries)
}

// ============================================================================
// Compiled statement
// ============================================================================

/// Ownership modifiers carried from the statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipFlags {
    pub exclude_owner: bool,
    pub include_owner: bool,
    pub include_viewer: bool,
}

/// A statement parsed once: expression tree, sort keys and window params.
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    expr: Expr,
    params: Vec<Param>,
    order: Vec<SortEntry>,
    limit: Option<Param>,
    offset: Option<Param>,
    pub flags: OwnershipFlags,
    pub near: Option<(GeoPoint, f64)>,
}

/// A compiled statement bound to one snapshot of its parameters.
#[derive(Debug, Clone)]
pub struct ResolvedStatement {
    pub predicate: Predicate,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl CompiledStatement {
    pub fn compile(statement: &Statement) -> Result<Self, StatementError> {
        let text_expr = match statement.filter.as_deref() {
            Some(text) => parse_where(text)?,
            None => Expr::Const(true),
        };
        if let Some(max) = text_expr.max_param() {
            if max >= statement.params.len() {
                return Err(StatementError::MissingParameter {
                    index: max,
                    provided: statement.params.len(),
                });
            }
        }

        let mut params = statement.params.clone();
        let mut conjuncts = match text_expr {
            Expr::Const(true) => Vec::new(),
            Expr::And(items) => items,
            other => vec![other],
        };
        for condition in &statement.conditions {
            conjuncts.push(condition.to_expr(params.len()));
            params.push(condition.value.clone());
        }
        let expr = match conjuncts.len() {
            0 => Expr::Const(true),
            1 => conjuncts.remove(0),
            _ => Expr::And(conjuncts),
        };

        let order = match statement.order_by.as_deref() {
            Some(text) => parse_order_by(text)?,
            None => Vec::new(),
        };

        Ok(Self {
            expr,
            params,
            order,
            limit: statement.limit.clone(),
            offset: statement.offset.clone(),
            flags: OwnershipFlags {
                exclude_owner: statement.exclude_where_iam_owner,
                include_owner: statement.include_where_iam_owner,
                include_viewer: statement.include_where_iam_viewer,
            },
            near: statement.near,
        })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn order(&self) -> &[SortEntry] {
        &self.order
    }

    /// Every reactive value the statement reads, in parameter order, then
    /// limit and offset.
    pub fn reactive_sources(&self) -> Vec<Arc<dyn Reactive<Value>>> {
        self.params
            .iter()
            .chain(self.limit.iter())
            .chain(self.offset.iter())
            .filter_map(|p| p.as_reactive().cloned())
            .collect()
    }

    /// Snapshot every parameter and bind the expression.
    pub fn resolve(&self) -> Result<ResolvedStatement, StatementError> {
        let snapshot: Vec<Value> = self.params.iter().map(Param::snapshot).collect();
        Ok(ResolvedStatement {
            predicate: self.expr.bind(&snapshot)?,
            limit: resolve_window("limit", self.limit.as_ref())?,
            offset: resolve_window("offset", self.offset.as_ref())?,
        })
    }
}

fn resolve_window(name: &'static str, param: Option<&Param>) -> Result<Option<usize>, StatementError> {
    let value = match param {
        Some(p) => p.snapshot(),
        None => return Ok(None),
    };
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or(StatementError::InvalidWindow { name, value })
}
