use std::sync::Arc;

use crate::auth::JwtConfig;
use crate::rooms::RoomRegistry;
use crate::store::TrackingStore;

#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub store: Arc<dyn TrackingStore>,
    pub jwt: JwtConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn TrackingStore>, jwt: JwtConfig) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            store,
            jwt,
        }
    }
}
