//! Operation permission levels.

use crate::identity::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access level an operation requires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Does not mutate shared state. Any caller may invoke it.
    #[default]
    Read,
    /// Mutates shared state. Requires an authenticated caller.
    Write,
}

impl Permission {
    /// Whether a caller with `role` may invoke an operation at this level.
    pub fn allows(self, role: Role) -> bool {
        match self {
            Self::Read => true,
            Self::Write => role.is_authenticated(),
        }
    }

    /// Wire name of the permission level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
