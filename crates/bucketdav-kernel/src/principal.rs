//! Principals and capabilities.
//!
//! A `Principal` is whoever issues a request. What it may do on a mount is
//! decided by an [`AccessPolicy`](crate::access::AccessPolicy) in terms of a
//! closed set of [`Capability`] kinds.

use serde::{Deserialize, Serialize};

/// An entity acting on the filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Short handle matched against grants: "amy", "backup-bot".
    pub username: String,
    /// Full display name.
    pub display_name: String,
}

impl Principal {
    pub fn new(username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
        }
    }

    /// Principal whose display name is its username.
    pub fn named(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            display_name: username.clone(),
            username,
        }
    }

    /// The well-known system principal.
    pub fn system() -> Self {
        Self::new("system", "System")
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.username, self.display_name)
    }
}

/// Access level a request needs on a mount.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Listing and metadata.
    Read,
    /// Any mutation (copy, move, mkcol, delete). Implies `Read`.
    Operate,
}

impl Capability {
    /// Returns true if holding `self` is enough for `required`.
    pub fn satisfies(self, required: Capability) -> bool {
        match self {
            Capability::Operate => true,
            Capability::Read => required == Capability::Read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_principal_display() {
        let p = Principal::new("amy", "Amy Tobey");
        assert_eq!(p.to_string(), "amy (Amy Tobey)");
        assert_eq!(Principal::named("bot").display_name, "bot");
        assert_eq!(Principal::system().username, "system");
    }

    #[test]
    fn test_capability_ordering() {
        assert!(Capability::Operate.satisfies(Capability::Read));
        assert!(Capability::Operate.satisfies(Capability::Operate));
        assert!(Capability::Read.satisfies(Capability::Read));
        assert!(!Capability::Read.satisfies(Capability::Operate));
    }

    #[test]
    fn test_capability_strings() {
        assert_eq!(Capability::Operate.to_string(), "operate");
        assert_eq!(Capability::from_str("read").unwrap(), Capability::Read);
        assert!(Capability::from_str("admin").is_err());
    }
}
