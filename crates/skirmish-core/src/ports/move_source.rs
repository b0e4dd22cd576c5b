//! MoveSource port: where the game loop gets the next action of a phase.
//!
//! The loop is written once against this trait; whether decisions come from
//! in-process deciders or from agent processes over the broker is decided by
//! which implementation is injected.

use async_trait::async_trait;

use crate::codec::StateValue;
use crate::domain::{ActionToken, Role};
use crate::rpc::RpcError;

#[async_trait]
pub trait MoveSource: Send {
    async fn next_action(
        &mut self,
        role: Role,
        observation: &StateValue,
    ) -> Result<ActionToken, RpcError>;
}
