//! Coordinator side of the protocol: one client per running game.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{RpcError, within};
use crate::codec::{StateValue, to_text};
use crate::domain::{ActionToken, Role};
use crate::ports::{Broker, Consumer, IdGenerator, IdGeneratorExt, Message, QueueOptions};

/// Synchronous request/reply over the broker.
///
/// Owns a private reply queue for its whole lifetime. Each call publishes one
/// request and waits for the reply carrying the same correlation id; replies
/// with any other id are logged and dropped.
pub struct RpcClient {
    broker: Arc<dyn Broker>,
    ids: Arc<dyn IdGenerator>,
    reply_queue: String,
    replies: Box<dyn Consumer>,
    cancel: CancellationToken,
}

impl RpcClient {
    pub async fn open(
        broker: Arc<dyn Broker>,
        ids: Arc<dyn IdGenerator>,
        cancel: CancellationToken,
    ) -> Result<Self, RpcError> {
        let reply_queue = broker.declare_queue("", QueueOptions::exclusive()).await?;
        let replies = broker.consume(&reply_queue, 0).await?;
        tracing::debug!(reply_queue = %reply_queue, "rpc client ready");
        Ok(Self {
            broker,
            ids,
            reply_queue,
            replies,
            cancel,
        })
    }

    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Ask `role`'s agent for an action on `observation`.
    pub async fn call(
        &mut self,
        role: Role,
        observation: &StateValue,
        deadline: Option<Duration>,
    ) -> Result<ActionToken, RpcError> {
        let correlation_id = self.ids.correlation_id().to_string();
        let request = Message::new(to_text(observation)?)
            .with_reply_to(self.reply_queue.clone())
            .with_correlation_id(correlation_id.clone());
        self.broker.publish(role.request_queue(), request).await?;
        tracing::debug!(%role, correlation_id = %correlation_id, "request published");

        let action = within(
            deadline,
            wait_for_reply(self.replies.as_mut(), &self.cancel, &correlation_id),
        )
        .await?;
        tracing::debug!(%role, %action, "reply received");
        Ok(action)
    }

    /// Same as [`call`](Self::call) with the role given as a token.
    ///
    /// An unknown token fails before anything is published.
    pub async fn call_named(
        &mut self,
        role: &str,
        observation: &StateValue,
        deadline: Option<Duration>,
    ) -> Result<ActionToken, RpcError> {
        let role: Role = role.parse()?;
        self.call(role, observation, deadline).await
    }
}

async fn wait_for_reply(
    replies: &mut dyn Consumer,
    cancel: &CancellationToken,
    correlation_id: &str,
) -> Result<ActionToken, RpcError> {
    loop {
        let delivery = tokio::select! {
            _ = cancel.cancelled() => return Err(RpcError::Cancelled),
            delivery = replies.next() => delivery?,
        };
        replies.ack(delivery.delivery_tag).await?;

        let matches = delivery.message.properties.correlation_id.as_deref() == Some(correlation_id);
        if !matches {
            tracing::warn!(
                expected = correlation_id,
                got = ?delivery.message.properties.correlation_id,
                "discarding reply for another request"
            );
            continue;
        }
        let text = delivery
            .message
            .body_text()
            .map_err(|e| RpcError::MalformedReply(e.to_string()))?;
        return Ok(ActionToken::from(text));
    }
}
