//! MoveSource implementations.

use std::time::Duration;

use async_trait::async_trait;

use crate::codec::StateValue;
use crate::domain::{ActionToken, Role};
use crate::ports::{Decider, MoveSource};
use crate::rpc::{RpcClient, RpcError};

/// Both roles decided in-process.
pub struct LocalMoveSource<P, Q> {
    pelican: P,
    panther: Q,
}

impl<P: Decider, Q: Decider> LocalMoveSource<P, Q> {
    pub fn new(pelican: P, panther: Q) -> Self {
        Self { pelican, panther }
    }
}

#[async_trait]
impl<P: Decider, Q: Decider> MoveSource for LocalMoveSource<P, Q> {
    async fn next_action(
        &mut self,
        role: Role,
        observation: &StateValue,
    ) -> Result<ActionToken, RpcError> {
        Ok(match role {
            Role::Pelican => self.pelican.decide(observation),
            Role::Panther => self.panther.decide(observation),
        })
    }
}

/// Both roles asked over the broker, one call per decision.
pub struct RpcMoveSource {
    client: RpcClient,
    deadline: Option<Duration>,
}

impl RpcMoveSource {
    pub fn new(client: RpcClient, deadline: Option<Duration>) -> Self {
        Self { client, deadline }
    }
}

#[async_trait]
impl MoveSource for RpcMoveSource {
    async fn next_action(
        &mut self,
        role: Role,
        observation: &StateValue,
    ) -> Result<ActionToken, RpcError> {
        self.client.call(role, observation, self.deadline).await
    }
}
