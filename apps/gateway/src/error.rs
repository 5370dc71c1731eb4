use shared::DeliveryStatus;
use thiserror::Error;

use crate::store::StoreError;

/// Application-level failures inside the tracking channel. Everything after
/// the handshake renders to the wire as a unicast `error` event; nothing
/// here may take down the connection task.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("illegal status transition from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("no tracking record for delivery {0}")]
    UnknownDelivery(i64),

    #[error("{0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
