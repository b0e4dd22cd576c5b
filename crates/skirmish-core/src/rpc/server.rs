//! Agent side of the protocol.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::RpcError;
use super::readiness::announce_ready;
use crate::codec::from_text;
use crate::domain::Role;
use crate::ports::{Broker, BrokerError, Consumer, Decider, Delivery, Message, QueueOptions};

/// Serves one role's request queue with an agent-supplied [`Decider`].
///
/// One request is in flight at a time (prefetch 1). Each reply is published
/// before its request is acknowledged, so a crash in between redelivers the
/// request instead of losing it.
pub struct AgentServer<D> {
    broker: Arc<dyn Broker>,
    role: Role,
    decider: D,
}

impl<D: Decider> AgentServer<D> {
    pub fn new(broker: Arc<dyn Broker>, role: Role, decider: D) -> Self {
        Self {
            broker,
            role,
            decider,
        }
    }

    /// Start consuming, announce readiness, then answer requests until
    /// `cancel` fires. Returns the number of requests answered.
    pub async fn serve(mut self, cancel: CancellationToken) -> Result<u64, RpcError> {
        let queue = self
            .broker
            .declare_queue(self.role.request_queue(), QueueOptions::durable())
            .await?;
        let mut requests = self.broker.consume(&queue, 1).await?;
        announce_ready(self.broker.as_ref(), self.role).await?;
        tracing::info!(role = %self.role, queue = %queue, "agent serving");

        let mut answered = 0;
        loop {
            let delivery = tokio::select! {
                _ = cancel.cancelled() => break,
                delivery = requests.next() => delivery?,
            };
            if self.answer(requests.as_mut(), delivery).await? {
                answered += 1;
            }
        }
        tracing::info!(role = %self.role, answered, "agent stopped");
        Ok(answered)
    }

    /// Returns false when the request was rejected.
    async fn answer(
        &mut self,
        requests: &mut dyn Consumer,
        delivery: Delivery,
    ) -> Result<bool, RpcError> {
        let props = &delivery.message.properties;
        let (Some(reply_to), Some(correlation_id)) = (&props.reply_to, &props.correlation_id)
        else {
            tracing::warn!(role = %self.role, tag = delivery.delivery_tag, "request without reply_to or correlation_id, rejecting");
            requests.reject(delivery.delivery_tag, false).await?;
            return Ok(false);
        };

        let observation = match delivery.message.body_text().map(from_text) {
            Ok(Ok(observation)) => observation,
            Ok(Err(e)) => {
                tracing::warn!(role = %self.role, error = %e, "request body is not JSON, rejecting");
                requests.reject(delivery.delivery_tag, false).await?;
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!(role = %self.role, error = %e, "request body is not UTF-8, rejecting");
                requests.reject(delivery.delivery_tag, false).await?;
                return Ok(false);
            }
        };

        let action = self.decider.decide(&observation);
        tracing::debug!(role = %self.role, %action, "decided");
        let reply = Message::new(action.as_str()).with_correlation_id(correlation_id.clone());
        match self.broker.publish(reply_to, reply).await {
            Ok(()) => {}
            // the caller gave up and its reply queue is gone
            Err(BrokerError::QueueNotFound(queue)) => {
                tracing::warn!(role = %self.role, queue = %queue, "reply queue no longer exists, dropping reply");
            }
            Err(e) => return Err(e.into()),
        }
        requests.ack(delivery.delivery_tag).await?;
        Ok(true)
    }
}
