//! The two fixed agent roles and the broker names derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shared queue both agents announce readiness on.
pub const READY_QUEUE: &str = "rpc_queue_ready";

/// One of the two competing sides of a Match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pelican,
    Panther,
}

impl Role {
    /// Both roles in phase order.
    pub const ALL: [Role; 2] = [Role::Pelican, Role::Panther];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Pelican => "pelican",
            Role::Panther => "panther",
        }
    }

    /// Durable request queue the role's agent consumes from.
    pub fn request_queue(self) -> &'static str {
        match self {
            Role::Pelican => "rpc_queue_pelican",
            Role::Panther => "rpc_queue_panther",
        }
    }

    /// Sentinel body published on [`READY_QUEUE`] once the agent is up.
    pub fn ready_sentinel(self) -> &'static str {
        match self {
            Role::Pelican => "PELICAN_READY",
            Role::Panther => "PANTHER_READY",
        }
    }

    pub fn from_ready_sentinel(body: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| role.ready_sentinel() == body)
    }

    pub fn opponent(self) -> Role {
        match self {
            Role::Pelican => Role::Panther,
            Role::Panther => Role::Pelican,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role token {0:?} (expected \"pelican\" or \"panther\")")]
pub struct UnknownRole(pub String);

/// Role tokens are matched case-insensitively ("PELICAN" and "pelican" both parse).
impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pelican" => Ok(Role::Pelican),
            "panther" => Ok(Role::Panther),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Role::Pelican, "rpc_queue_pelican", "PELICAN_READY")]
    #[case(Role::Panther, "rpc_queue_panther", "PANTHER_READY")]
    fn broker_names(#[case] role: Role, #[case] queue: &str, #[case] sentinel: &str) {
        assert_eq!(role.request_queue(), queue);
        assert_eq!(role.ready_sentinel(), sentinel);
        assert_eq!(Role::from_ready_sentinel(sentinel), Some(role));
    }

    #[rstest]
    #[case("pelican", Role::Pelican)]
    #[case("PANTHER", Role::Panther)]
    fn parses_tokens(#[case] token: &str, #[case] expected: Role) {
        assert_eq!(token.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn unknown_token_is_an_error() {
        assert_eq!(
            "walrus".parse::<Role>(),
            Err(UnknownRole("walrus".to_string()))
        );
        assert_eq!(Role::from_ready_sentinel("WALRUS_READY"), None);
    }
}
