//! Query-string syntaxes for ad-hoc filters and sorts.
//!
//! - `where`: `(field,op,value)~and(field,op)~or((a,eq,1)~and(b,eq,2))`
//! - `sort`: `-amount,title`
//!
//! Field references resolve by column title, then column name, then id.

mod sort_string;
mod where_clause;

pub use sort_string::parse_sort;
pub use where_clause::parse_where;
