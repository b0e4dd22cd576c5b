//! Agent RPC protocol over the broker.
//!
//! # Queues
//! - `rpc_queue_pelican` / `rpc_queue_panther`: durable request queues, one
//!   agent process consuming each with prefetch 1.
//! - `rpc_queue_ready`: durable queue the agents announce readiness on.
//! - one exclusive, broker-named reply queue per [`RpcClient`].
//!
//! # Envelope
//! Requests carry `reply_to` and `correlation_id`; the body is the serialized
//! observation. Replies carry the same `correlation_id`; the body is the
//! action token as plain UTF-8 text.

use std::time::Duration;

use crate::domain::UnknownRole;
use crate::ports::BrokerError;

pub mod client;
pub mod connect;
pub mod readiness;
pub mod server;

pub use self::client::RpcClient;
pub use self::connect::{DEFAULT_CONNECT_DELAY, connect_with_retry};
pub use self::readiness::{ReadinessGate, announce_ready, await_readiness};
pub use self::server::AgentServer;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("failed to encode observation: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Run `fut`, bounded by an optional deadline.
pub(crate) async fn within<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T, RpcError>>,
) -> Result<T, RpcError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RpcError::Timeout(limit))?,
        None => fut.await,
    }
}
