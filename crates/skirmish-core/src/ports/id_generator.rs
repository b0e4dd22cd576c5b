//! IdGenerator port: ULID-based ids for records and RPC correlation.

use crate::domain::ids::{Id, IdMarker};
use crate::domain::{AgentId, CorrelationId, GameId, MatchId, TeamId, TournamentId};
use std::sync::{Mutex, PoisonError};

use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator produces fresh ULIDs.
///
/// # Thread Safety
/// - Requires `Send + Sync` so one generator can be shared by the store,
///   the coordinator and every RPC client.
pub trait IdGenerator: Send + Sync {
    fn next_ulid(&self) -> Ulid;
}

/// Typed helpers over [`IdGenerator::next_ulid`].
pub trait IdGeneratorExt: IdGenerator {
    fn generate<T: IdMarker>(&self) -> Id<T> {
        Id::from_ulid(self.next_ulid())
    }

    fn match_id(&self) -> MatchId {
        self.generate()
    }

    fn game_id(&self) -> GameId {
        self.generate()
    }

    fn agent_id(&self) -> AgentId {
        self.generate()
    }

    fn team_id(&self) -> TeamId {
        self.generate()
    }

    fn tournament_id(&self) -> TournamentId {
        self.generate()
    }

    fn correlation_id(&self) -> CorrelationId {
        self.generate()
    }
}

impl<G: IdGenerator + ?Sized> IdGeneratorExt for G {}

/// ULID generator driven by a [`Clock`].
///
/// Ids from one generator are strictly increasing: within the same
/// millisecond (or under a `FixedClock`) the previous id is incremented
/// instead of drawing a new random part.
pub struct UlidGenerator<C> {
    clock: C,
    last: Mutex<Option<Ulid>>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: Mutex::new(None),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let fresh = Ulid::from_parts(timestamp_ms, rand::random());
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let next = match *last {
            Some(prev) if fresh <= prev => prev.increment().unwrap_or(fresh),
            _ => fresh,
        };
        *last = Some(next);
        next
    }
}
