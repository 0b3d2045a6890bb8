//! Closed set of check identifiers.
//!
//! Dispatch inside the workspace goes through [`CheckId`]; the string form
//! only exists at the command-line boundary, where an unknown name turns
//! into [`CatcheckError::UnknownCheck`].

use std::fmt;
use std::str::FromStr;

use catcheck_error::CatcheckError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckId {
    /// Duplicate keys under a unique catalog index.
    UniqueIndexViolation,
    /// Catalog rows present on some members but not on others.
    MissingExtra,
    /// Persistent-table entries with no matching relation.
    Persistent,
}

impl CheckId {
    /// Every check in registration order. Later checks may rely on earlier
    /// ones having run, so this order is preserved by the registry.
    pub const ALL: [Self; 3] = [Self::UniqueIndexViolation, Self::MissingExtra, Self::Persistent];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UniqueIndexViolation => "unique_index_violation",
            Self::MissingExtra => "missing_extra",
            Self::Persistent => "persistent",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UniqueIndexViolation => "duplicate entries under unique catalog indexes",
            Self::MissingExtra => "catalog rows missing from or extra on segments",
            Self::Persistent => "persistent entries without a pg_class relation",
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckId {
    type Err = CatcheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| CatcheckError::UnknownCheck { name: s.to_owned() })
    }
}
