//! Query layer: statements, compiled filters and in-memory evaluation.
//!
//! A [`Statement`] is compiled once per live query into an [`expr::Expr`]
//! tree. Every evaluation binds the current parameter snapshots into an
//! [`expr::Predicate`], which filters stored-record docs and renders the
//! canonical filter text forwarded to connectors.
//!
//! # Modules
//!
//! - [`statement`]: [`Statement`], [`Param`], [`Condition`] and compilation.
//! - [`parse`]: `where` text → expression tree.
//! - [`expr`]: expression and predicate trees, evaluation, canonical text.
//! - [`operators`]: value comparison, field paths, LIKE.
//! - [`access`]: ownership and visibility terms.
//! - [`execute`]: ordering and windowing.
//! - [`prefill`]: seed values for records created under a filter.

pub mod access;
pub mod execute;
pub mod expr;
pub mod operators;
pub mod parse;
pub mod prefill;
pub mod statement;

pub use access::AccessScope;
pub use expr::Predicate;
pub use statement::{
    parse_order_by, CompiledStatement, Condition, Operator, OwnershipFlags, Param,
    ResolvedStatement, SortEntry, Statement,
};
