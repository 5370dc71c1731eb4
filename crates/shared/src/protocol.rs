//! The tracking channel's wire vocabulary. Frames are JSON text messages of
//! the form `{"event": "...", "data": {...}}`; the closed enums below are
//! the single source of truth for event names and payload shapes.

use serde::{Deserialize, Serialize};

use crate::tracking::{DeliveryStatus, DeliveryTrackingState, LocationPoint};

/// Events a client may send to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinTracking { delivery_id: i64, user_id: i64 },
    #[serde(rename_all = "camelCase")]
    LeaveTracking { delivery_id: i64 },
    #[serde(rename_all = "camelCase")]
    UpdateLocation {
        delivery_id: i64,
        lat: f64,
        lng: f64,
        user_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    UpdateStatus {
        delivery_id: i64,
        status: DeliveryStatus,
        user_id: i64,
    },
}

/// Events the gateway sends to clients. `TrackingData` and `Error` are
/// unicast; the rest are room-scoped broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    TrackingData(DeliveryTrackingState),
    #[serde(rename_all = "camelCase")]
    LocationUpdated {
        delivery_id: i64,
        picker_location: LocationPoint,
    },
    #[serde(rename_all = "camelCase")]
    StatusUpdated {
        delivery_id: i64,
        status: DeliveryStatus,
    },
    #[serde(rename_all = "camelCase")]
    TrackingCompleted { delivery_id: i64 },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn client_event_wire_names_are_stable() {
        let event = ClientEvent::UpdateLocation {
            delivery_id: 100,
            lat: 53.9,
            lng: 27.5,
            user_id: 7,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "update-location",
                "data": {"deliveryId": 100, "lat": 53.9, "lng": 27.5, "userId": 7}
            })
        );
    }

    #[test]
    fn join_and_status_events_round_trip() {
        let join: ClientEvent = serde_json::from_value(json!({
            "event": "join-tracking",
            "data": {"deliveryId": 42, "userId": 3}
        }))
        .unwrap();
        assert_eq!(
            join,
            ClientEvent::JoinTracking {
                delivery_id: 42,
                user_id: 3
            }
        );

        let status: ClientEvent = serde_json::from_value(json!({
            "event": "update-status",
            "data": {"deliveryId": 42, "status": "picked_up", "userId": 3}
        }))
        .unwrap();
        assert_eq!(
            status,
            ClientEvent::UpdateStatus {
                delivery_id: 42,
                status: DeliveryStatus::PickedUp,
                user_id: 3
            }
        );
    }

    #[test]
    fn server_event_wire_names_are_stable() {
        let now = Utc::now();
        let event = ServerEvent::LocationUpdated {
            delivery_id: 100,
            picker_location: LocationPoint {
                lat: 53.9,
                lng: 27.5,
                timestamp: now,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "location-updated");
        assert_eq!(value["data"]["deliveryId"], 100);
        assert_eq!(value["data"]["pickerLocation"]["lat"], 53.9);

        let done = serde_json::to_value(ServerEvent::TrackingCompleted { delivery_id: 5 }).unwrap();
        assert_eq!(done["event"], "tracking-completed");

        let err = serde_json::to_value(ServerEvent::Error {
            message: "nope".into(),
        })
        .unwrap();
        assert_eq!(err["event"], "error");
        assert_eq!(err["data"]["message"], "nope");
    }

    #[test]
    fn malformed_event_name_is_rejected() {
        let result = serde_json::from_value::<ClientEvent>(json!({
            "event": "subscribe",
            "data": {"deliveryId": 1}
        }));
        assert!(result.is_err());
    }
}
