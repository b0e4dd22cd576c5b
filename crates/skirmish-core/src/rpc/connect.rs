//! Broker connection with indefinite retry.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::RpcError;
use crate::ports::{Broker, Connector};

pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connect to `host`, retrying with a fixed `delay` until it succeeds.
///
/// Only cancellation ends the loop without a connection.
pub async fn connect_with_retry(
    connector: &dyn Connector,
    host: &str,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<Arc<dyn Broker>, RpcError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(RpcError::Cancelled),
            result = connector.connect(host) => result,
        };
        match result {
            Ok(broker) => {
                tracing::debug!(host, attempt, "connected to broker");
                return Ok(broker);
            }
            Err(e) => {
                tracing::warn!(host, attempt, error = %e, retry_in = ?delay, "broker connection failed");
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(RpcError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
