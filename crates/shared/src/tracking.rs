use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bare coordinate pair, used for the fixed pickup/dropoff endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A timestamped coordinate sample. The latest point for a delivery is the
/// authoritative picker location; no history is kept by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

impl LocationPoint {
    pub fn position(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Delivery lifecycle: `pending -> accepted -> picked_up -> delivered`,
/// with `cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Accepted,
    PickedUp,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    fn chain_position(self) -> Option<u8> {
        match self {
            DeliveryStatus::Pending => Some(0),
            DeliveryStatus::Accepted => Some(1),
            DeliveryStatus::PickedUp => Some(2),
            DeliveryStatus::Delivered => Some(3),
            DeliveryStatus::Cancelled => None,
        }
    }

    /// A transition is legal iff it strictly advances the chain, or the
    /// target is `cancelled` and the current status is non-terminal.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == DeliveryStatus::Cancelled {
            return true;
        }
        match (self.chain_position(), next.chain_position()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Accepted => "accepted",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown delivery status: {}", self.0)
    }
}

impl std::error::Error for InvalidStatus {}

impl FromStr for DeliveryStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "accepted" => Ok(DeliveryStatus::Accepted),
            "picked_up" => Ok(DeliveryStatus::PickedUp),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "cancelled" => Ok(DeliveryStatus::Cancelled),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// The persisted tracking record for one delivery. Created by the
/// marketplace when an offer is accepted; the gateway only reads it and
/// updates `picker_location` and `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTrackingState {
    pub id: i64,
    pub delivery_id: i64,
    pub picker_id: i64,
    pub sender_id: i64,
    pub receiver_id: Option<i64>,
    pub from_location: GeoPoint,
    pub to_location: GeoPoint,
    pub picker_location: Option<LocationPoint>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_legal() {
        assert!(DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Accepted));
        assert!(DeliveryStatus::Accepted.can_transition_to(DeliveryStatus::PickedUp));
        assert!(DeliveryStatus::PickedUp.can_transition_to(DeliveryStatus::Delivered));
        // Skipping a step still moves forward.
        assert!(DeliveryStatus::Pending.can_transition_to(DeliveryStatus::PickedUp));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!DeliveryStatus::PickedUp.can_transition_to(DeliveryStatus::Pending));
        assert!(!DeliveryStatus::Accepted.can_transition_to(DeliveryStatus::Accepted));
        assert!(!DeliveryStatus::Delivered.can_transition_to(DeliveryStatus::PickedUp));
    }

    #[test]
    fn cancel_is_reachable_from_any_non_terminal_state() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Accepted,
            DeliveryStatus::PickedUp,
        ] {
            assert!(status.can_transition_to(DeliveryStatus::Cancelled));
        }
        assert!(!DeliveryStatus::Delivered.can_transition_to(DeliveryStatus::Cancelled));
        assert!(!DeliveryStatus::Cancelled.can_transition_to(DeliveryStatus::Cancelled));
    }

    #[test]
    fn status_wire_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&DeliveryStatus::PickedUp).unwrap(),
            "\"picked_up\""
        );
        assert_eq!(
            serde_json::from_str::<DeliveryStatus>("\"cancelled\"").unwrap(),
            DeliveryStatus::Cancelled
        );
        assert_eq!("picked_up".parse::<DeliveryStatus>().unwrap(), DeliveryStatus::PickedUp);
        assert!("shipped".parse::<DeliveryStatus>().is_err());
    }
}
