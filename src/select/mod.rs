//! Live queries.
//!
//! - [`subject`]: [`QuerySubject`], the evaluation loop, and its
//!   [`QueryState`]/[`ResultSet`] output.
//! - [`paginator`]: [`QueryPaginator`], window and selection controls.
//! - [`handle`]: [`Select`] and [`SelectOne`], the handles callers hold.

pub mod handle;
pub mod paginator;
pub mod subject;

pub use handle::{Select, SelectOne};
pub use paginator::QueryPaginator;
pub use subject::{QueryState, QuerySubject, ResultSet};
