//! Decider port: the agent's decision function.
//!
//! Supplied by the agent author; this crate only transports its input and
//! output. It runs either inside an agent worker process (behind
//! `rpc::AgentServer`) or in-process through `app::LocalMoveSource`.

use crate::codec::StateValue;
use crate::domain::ActionToken;

pub trait Decider: Send {
    fn decide(&mut self, observation: &StateValue) -> ActionToken;
}

/// Any `FnMut(&StateValue) -> ActionToken` closure is a decider.
impl<F> Decider for F
where
    F: FnMut(&StateValue) -> ActionToken + Send,
{
    fn decide(&mut self, observation: &StateValue) -> ActionToken {
        self(observation)
    }
}
