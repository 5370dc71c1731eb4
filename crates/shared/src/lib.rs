//! Types shared between the tracking gateway and its clients: the wire
//! protocol, the delivery tracking data model, and the movement filter.

pub mod geo;
pub mod protocol;
pub mod tracking;

pub use protocol::{ClientEvent, ServerEvent};
pub use tracking::{DeliveryStatus, DeliveryTrackingState, GeoPoint, LocationPoint};
