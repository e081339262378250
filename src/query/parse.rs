//! `where` text → [`Expr`] via sqlparser.
//!
//! The clause is wrapped as `SELECT * FROM t WHERE ...` and the selection of
//! the parsed query is converted node by node. Placeholders (`?`) are
//! numbered in the order they appear in the text.

use serde_json::{Number, Value};
use sqlparser::ast::{
    BinaryOperator, Expr as SqlExpr, Ident, SetExpr, Statement as SqlStatement, UnaryOperator,
    Value as SqlValue, ValueWithSpan,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::StatementError;

use super::expr::{CompareOp, Expr, Operand};

/// Parse a `where` clause. Blank text matches everything.
pub fn parse_where(text: &str) -> Result<Expr, StatementError> {
    if text.trim().is_empty() {
        return Ok(Expr::Const(true));
    }
    let sql = format!("SELECT * FROM t WHERE {text}");
    let statements = Parser::parse_sql(&GenericDialect {}, &sql).map_err(|e| parse_error(text, e))?;

    let selection = match statements.as_slice() {
        [SqlStatement::Query(query)] => match query.body.as_ref() {
            SetExpr::Select(select) => select.selection.clone(),
            _ => None,
        },
        _ => None,
    };
    let selection = selection.ok_or_else(|| StatementError::Parse {
        text: text.to_string(),
        message: "expected a single boolean expression".to_string(),
    })?;

    let mut converter = Converter { next_param: 0 };
    converter.predicate(&selection)
}

fn parse_error(text: &str, err: impl std::fmt::Display) -> StatementError {
    StatementError::Parse {
        text: text.to_string(),
        message: err.to_string(),
    }
}

struct Converter {
    next_param: usize,
}

impl Converter {
    fn predicate(&mut self, expr: &SqlExpr) -> Result<Expr, StatementError> {
        match expr {
            SqlExpr::Nested(inner) => self.predicate(inner),
            SqlExpr::BinaryOp { left, op, right } => match op {
                BinaryOperator::And => Ok(flatten_and(self.predicate(left)?, self.predicate(right)?)),
                BinaryOperator::Or => Ok(flatten_or(self.predicate(left)?, self.predicate(right)?)),
                other => {
                    let op = compare_op(other)
                        .ok_or_else(|| StatementError::Unsupported(format!("operator {other}")))?;
                    Ok(Expr::Compare {
                        left: self.operand(left)?,
                        op,
                        right: self.operand(right)?,
                    })
                }
            },
            SqlExpr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Ok(Expr::Not(Box::new(self.predicate(expr)?))),
            SqlExpr::Like {
                negated,
                expr,
                pattern,
                ..
            }
            | SqlExpr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => Ok(Expr::Like {
                operand: self.operand(expr)?,
                pattern: self.operand(pattern)?,
                negated: *negated,
            }),
            SqlExpr::InList {
                expr,
                list,
                negated,
            } => {
                let operand = self.operand(expr)?;
                let list = list
                    .iter()
                    .map(|item| self.operand(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::In {
                    operand,
                    list,
                    negated: *negated,
                })
            }
            SqlExpr::IsNull(inner) => Ok(Expr::IsNull {
                operand: self.operand(inner)?,
                negated: false,
            }),
            SqlExpr::IsNotNull(inner) => Ok(Expr::IsNull {
                operand: self.operand(inner)?,
                negated: true,
            }),
            SqlExpr::IsTrue(inner) => Ok(Expr::Compare {
                left: self.operand(inner)?,
                op: CompareOp::Eq,
                right: Operand::Literal(Value::Bool(true)),
            }),
            SqlExpr::IsFalse(inner) => Ok(Expr::Compare {
                left: self.operand(inner)?,
                op: CompareOp::Eq,
                right: Operand::Literal(Value::Bool(false)),
            }),
            SqlExpr::Between {
                expr,
                negated,
                low,
                high,
            } => Ok(Expr::Between {
                operand: self.operand(expr)?,
                low: self.operand(low)?,
                high: self.operand(high)?,
                negated: *negated,
            }),
            SqlExpr::Value(ValueWithSpan {
                value: SqlValue::Boolean(b),
                ..
            }) => Ok(Expr::Const(*b)),
            // A bare field is truthy when it holds `true`.
            SqlExpr::Identifier(_) | SqlExpr::CompoundIdentifier(_) => Ok(Expr::Compare {
                left: self.operand(expr)?,
                op: CompareOp::Eq,
                right: Operand::Literal(Value::Bool(true)),
            }),
            other => Err(StatementError::Unsupported(other.to_string())),
        }
    }

    fn operand(&mut self, expr: &SqlExpr) -> Result<Operand, StatementError> {
        match expr {
            SqlExpr::Nested(inner) => self.operand(inner),
            SqlExpr::Identifier(ident) => Ok(identifier(ident)),
            SqlExpr::CompoundIdentifier(parts) => Ok(Operand::Field(
                parts
                    .iter()
                    .map(|p| p.value.as_str())
                    .collect::<Vec<_>>()
                    .join("."),
            )),
            SqlExpr::Value(ValueWithSpan { value, .. }) => self.value(value),
            SqlExpr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match self.operand(expr)? {
                Operand::Literal(Value::Number(n)) => Ok(Operand::Literal(negate(&n))),
                _ => Err(StatementError::Unsupported(format!("-{expr}"))),
            },
            SqlExpr::UnaryOp {
                op: UnaryOperator::Plus,
                expr,
            } => self.operand(expr),
            other => Err(StatementError::Unsupported(other.to_string())),
        }
    }

    fn value(&mut self, value: &SqlValue) -> Result<Operand, StatementError> {
        Ok(Operand::Literal(match value {
            SqlValue::Placeholder(_) => {
                let index = self.next_param;
                self.next_param += 1;
                return Ok(Operand::Param(index));
            }
            SqlValue::Number(text, _) => number(text)?,
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
                Value::String(s.clone())
            }
            SqlValue::Boolean(b) => Value::Bool(*b),
            SqlValue::Null => Value::Null,
            other => return Err(StatementError::Unsupported(other.to_string())),
        }))
    }
}

/// Double-quoted identifiers are string literals; bare and backticked ones
/// name fields.
fn identifier(ident: &Ident) -> Operand {
    match ident.quote_style {
        Some('"') => Operand::Literal(Value::String(ident.value.clone())),
        _ => Operand::Field(ident.value.clone()),
    }
}

fn number(text: &str) -> Result<Value, StatementError> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StatementError::Unsupported(format!("number {text}")))
}

fn negate(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        return Value::from(-i);
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(-f))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn compare_op(op: &BinaryOperator) -> Option<CompareOp> {
    Some(match op {
        BinaryOperator::Eq => CompareOp::Eq,
        BinaryOperator::NotEq => CompareOp::NotEq,
        BinaryOperator::Lt => CompareOp::Lt,
        BinaryOperator::LtEq => CompareOp::LtEq,
        BinaryOperator::Gt => CompareOp::Gt,
        BinaryOperator::GtEq => CompareOp::GtEq,
        _ => return None,
    })
}

fn flatten_and(left: Expr, right: Expr) -> Expr {
    let mut items = match left {
        Expr::And(items) => items,
        other => vec![other],
    };
    match right {
        Expr::And(more) => items.extend(more),
        other => items.push(other),
    }
    Expr::And(items)
}

fn flatten_or(left: Expr, right: Expr) -> Expr {
    let mut items = match left {
        Expr::Or(items) => items,
        other => vec![other],
    };
    match right {
        Expr::Or(more) => items.extend(more),
        other => items.push(other),
    }
    Expr::Or(items)
}
