use chrono::Utc;
use shared::geo::{self, MIN_MOVEMENT_METERS};
use shared::LocationPoint;

use crate::session::ClientTrackingSession;

/// Picker-side movement filter: raw geolocation samples pass through
/// [`offer`](Self::offer) and only those farther than the threshold from
/// the last *emitted* point make it onto the wire.
pub struct PositionWatcher {
    threshold_m: f64,
    last_emitted: Option<LocationPoint>,
}

impl PositionWatcher {
    pub fn new() -> Self {
        Self::with_threshold(MIN_MOVEMENT_METERS)
    }

    pub fn with_threshold(threshold_m: f64) -> Self {
        Self {
            threshold_m,
            last_emitted: None,
        }
    }

    /// Returns the stamped point when the sample should be emitted.
    pub fn offer(&mut self, lat: f64, lng: f64) -> Option<LocationPoint> {
        let candidate = LocationPoint {
            lat,
            lng,
            timestamp: Utc::now(),
        };
        if geo::should_emit(self.last_emitted.as_ref(), &candidate, self.threshold_m) {
            self.last_emitted = Some(candidate.clone());
            Some(candidate)
        } else {
            None
        }
    }

    /// Filters a sample and, when it passes, sends `update-location` over
    /// the session. Returns whether the sample was emitted.
    pub fn publish(
        &mut self,
        session: &ClientTrackingSession,
        delivery_id: i64,
        lat: f64,
        lng: f64,
    ) -> bool {
        match self.offer(lat, lng) {
            Some(point) => {
                session.update_location(delivery_id, point.lat, point.lng);
                true
            }
            None => false,
        }
    }
}

impl Default for PositionWatcher {
    fn default() -> Self {
        Self::new()
    }
}
