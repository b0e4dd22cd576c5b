//! Startup handshake: no game starts before both agents are listening.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{RpcError, within};
use crate::domain::{READY_QUEUE, Role};
use crate::ports::{Broker, BrokerError, Message, QueueOptions};

/// One flag per role, set by the role's ready sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessGate {
    pelican: bool,
    panther: bool,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message from the ready queue. Returns the role it
    /// announced, or `None` for an unrecognised body.
    pub fn observe(&mut self, body: &str) -> Option<Role> {
        let role = Role::from_ready_sentinel(body.trim())?;
        match role {
            Role::Pelican => self.pelican = true,
            Role::Panther => self.panther = true,
        }
        Some(role)
    }

    pub fn is_ready(&self, role: Role) -> bool {
        match role {
            Role::Pelican => self.pelican,
            Role::Panther => self.panther,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pelican && self.panther
    }
}

/// Publish `role`'s ready sentinel.
pub async fn announce_ready(broker: &dyn Broker, role: Role) -> Result<(), BrokerError> {
    broker.declare_queue(READY_QUEUE, QueueOptions::durable()).await?;
    broker
        .publish(READY_QUEUE, Message::new(role.ready_sentinel()))
        .await
}

/// Consume the ready queue until both roles have announced themselves.
pub async fn await_readiness(
    broker: &dyn Broker,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<(), RpcError> {
    broker.declare_queue(READY_QUEUE, QueueOptions::durable()).await?;
    let mut ready = broker.consume(READY_QUEUE, 0).await?;
    tracing::info!("waiting for both agents to announce readiness");

    let wait = async {
        let mut gate = ReadinessGate::new();
        while !gate.is_open() {
            let delivery = tokio::select! {
                _ = cancel.cancelled() => return Err(RpcError::Cancelled),
                delivery = ready.next() => delivery?,
            };
            ready.ack(delivery.delivery_tag).await?;
            let body = String::from_utf8_lossy(&delivery.message.body);
            match gate.observe(&body) {
                Some(role) => tracing::info!(%role, "agent ready"),
                None => tracing::warn!(body = %body, "ignoring unknown readiness message"),
            }
        }
        Ok::<(), RpcError>(())
    };
    within(deadline, wait).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryBroker;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn gate_opens_iff_both_sentinels_seen(
            bodies in proptest::collection::vec(
                prop_oneof![
                    Just("PELICAN_READY".to_string()),
                    Just("PANTHER_READY".to_string()),
                    "[A-Z_]{0,14}",
                ],
                0..16,
            )
        ) {
            let mut gate = ReadinessGate::new();
            for body in &bodies {
                gate.observe(body);
            }
            let saw = |s: &str| bodies.iter().any(|b| b == s);
            prop_assert_eq!(gate.is_open(), saw("PELICAN_READY") && saw("PANTHER_READY"));
        }
    }

    #[test]
    fn duplicates_are_idempotent() {
        let mut gate = ReadinessGate::new();
        gate.observe("PELICAN_READY");
        gate.observe("PELICAN_READY");
        assert!(!gate.is_open());
        assert!(gate.is_ready(Role::Pelican));
        assert_eq!(gate.observe("PANTHER_READY"), Some(Role::Panther));
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn returns_once_both_agents_announced() {
        let broker = InMemoryBroker::new();
        announce_ready(&broker, Role::Panther).await.unwrap();
        broker.publish(READY_QUEUE, Message::new("HELLO")).await.unwrap();
        announce_ready(&broker, Role::Panther).await.unwrap();

        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move {
                await_readiness(&broker, None, &CancellationToken::new()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        announce_ready(&broker, Role::Pelican).await.unwrap();
        waiter.await.unwrap().unwrap();
        assert_eq!(broker.queue_depth(READY_QUEUE), Some(0));
    }

    #[tokio::test]
    async fn deadline_expires_without_both_agents() {
        let broker = InMemoryBroker::new();
        announce_ready(&broker, Role::Pelican).await.unwrap();
        let result = await_readiness(
            &broker,
            Some(Duration::from_millis(30)),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(RpcError::Timeout(_))));
    }
}
