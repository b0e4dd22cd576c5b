//! Domain identifiers (strongly-typed IDs).
//!
//! All records use ULIDs wrapped in a generic `Id<T>`. The marker type `T`
//! only exists at compile time, so a `MatchId` can never be passed where a
//! `GameId` is expected, while every id shares one implementation.
//!
//! ULIDs start with a millisecond timestamp, so ids generated one after the
//! other sort in creation order. The coordinator relies on that to keep
//! Games of a Match in a strictly increasing order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait for every id kind.
///
/// Provides the prefix used by `Display` ("match-", "game-", ...).
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed id.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when a string is not a valid id of the expected kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}id: {value:?}")]
pub struct ParseIdError {
    kind: &'static str,
    value: String,
}

/// Accepts both the display form (`match-01H...`) and a bare ULID.
impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError {
                kind: T::prefix(),
                value: s.to_string(),
            })
    }
}

// ========================================
// Markers
// ========================================

macro_rules! id_marker {
    ($marker:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(MatchMarker, "match-");
id_marker!(GameMarker, "game-");
id_marker!(AgentMarker, "agent-");
id_marker!(TeamMarker, "team-");
id_marker!(TournamentMarker, "tournament-");
id_marker!(CorrelationMarker, "corr-");

// ========================================
// Aliases
// ========================================

/// Identifier of a Match (one scheduled contest of `num_games` Games).
pub type MatchId = Id<MatchMarker>;

/// Identifier of a Game (one play-through owned by a Match).
pub type GameId = Id<GameMarker>;

pub type AgentId = Id<AgentMarker>;

pub type TeamId = Id<TeamMarker>;

pub type TournamentId = Id<TournamentMarker>;

/// Per-call token matching an RPC reply to its request.
pub type CorrelationId = Id<CorrelationMarker>;
