//! Entity lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The tracking state of an entity.
///
/// ```text
///  Detached --apply--> Unmodified <--write--> Modified
///                          |                      |
///                          +--removed--> Deleted <+
///  (inserted into a tracked collection) --> New --removed--> Detached
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Not registered with any monitor.
    #[default]
    Detached,
    /// Tracked and equal to its snapshot.
    Unmodified,
    /// Tracked and at least one property differs from its snapshot.
    Modified,
    /// Inserted into a tracked collection since the last accept.
    New,
    /// Removed from a tracked collection since the last accept.
    Deleted,
}

impl EntityState {
    /// Returns true for the states that make a monitor report changes.
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Modified | Self::New | Self::Deleted)
    }

    /// Returns true if the entity is registered with a monitor.
    #[must_use]
    pub const fn is_tracked(self) -> bool {
        !matches!(self, Self::Detached)
    }

    /// Stable lowercase name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Unmodified => "unmodified",
            Self::Modified => "modified",
            Self::New => "new",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityState {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "detached" => Ok(Self::Detached),
            "unmodified" => Ok(Self::Unmodified),
            "modified" => Ok(Self::Modified),
            "new" => Ok(Self::New),
            "deleted" => Ok(Self::Deleted),
            other => Err(crate::Error::InvalidState(other.to_string())),
        }
    }
}
