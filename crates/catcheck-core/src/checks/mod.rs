//! Shipped catalog checks.
//!
//! | check | shape |
//! |---|---|
//! | [`UniqueIndexCheck`] | single connection (coordinator) |
//! | [`MissingExtraCheck`] | segment-fanned, compared against the coordinator |
//! | [`PersistentCheck`] | segment-fanned |

mod missing_extra;
mod persistent;
mod unique_index;

pub use missing_extra::MissingExtraCheck;
pub use persistent::PersistentCheck;
pub use unique_index::UniqueIndexCheck;

/// Double-quote an SQL identifier.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quote an SQL string literal.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
