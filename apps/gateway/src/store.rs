use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{DeliveryStatus, DeliveryTrackingState, GeoPoint, LocationPoint};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The narrow persistence surface the gateway consumes. The tracking record
/// is created and deleted elsewhere; the gateway only reads it and updates
/// the picker location and status fields.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn get(&self, delivery_id: i64) -> Result<Option<DeliveryTrackingState>, StoreError>;

    async fn update_picker_location(
        &self,
        delivery_id: i64,
        point: &LocationPoint,
    ) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        delivery_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), StoreError>;
}

/// Postgres-backed store.
///
/// Expected schema (owned by the marketplace's migrations):
/// `delivery_tracking(id bigserial, delivery_id bigint unique, picker_id,
/// sender_id, receiver_id, from_lat, from_lng, to_lat, to_lng, picker_lat,
/// picker_lng, picker_ts timestamptz, status text, created_at, updated_at)`.
pub struct PgTrackingStore {
    pool: PgPool,
}

impl PgTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_state(row: &sqlx::postgres::PgRow) -> Result<DeliveryTrackingState, StoreError> {
        let status_raw = row.get::<String, _>("status");
        let status = DeliveryStatus::from_str(&status_raw)
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let picker_location = match (
            row.get::<Option<f64>, _>("picker_lat"),
            row.get::<Option<f64>, _>("picker_lng"),
            row.get::<Option<DateTime<Utc>>, _>("picker_ts"),
        ) {
            (Some(lat), Some(lng), Some(timestamp)) => Some(LocationPoint {
                lat,
                lng,
                timestamp,
            }),
            _ => None,
        };

        Ok(DeliveryTrackingState {
            id: row.get::<i64, _>("id"),
            delivery_id: row.get::<i64, _>("delivery_id"),
            picker_id: row.get::<i64, _>("picker_id"),
            sender_id: row.get::<i64, _>("sender_id"),
            receiver_id: row.get::<Option<i64>, _>("receiver_id"),
            from_location: GeoPoint {
                lat: row.get::<f64, _>("from_lat"),
                lng: row.get::<f64, _>("from_lng"),
            },
            to_location: GeoPoint {
                lat: row.get::<f64, _>("to_lat"),
                lng: row.get::<f64, _>("to_lng"),
            },
            picker_location,
            status,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
        })
    }
}

#[async_trait]
impl TrackingStore for PgTrackingStore {
    async fn get(&self, delivery_id: i64) -> Result<Option<DeliveryTrackingState>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, delivery_id, picker_id, sender_id, receiver_id,
                   from_lat, from_lng, to_lat, to_lng,
                   picker_lat, picker_lng, picker_ts,
                   status, created_at, updated_at
            FROM delivery_tracking
            WHERE delivery_id = $1
            "#,
        )
        .bind(delivery_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_state).transpose()
    }

    async fn update_picker_location(
        &self,
        delivery_id: i64,
        point: &LocationPoint,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE delivery_tracking
            SET picker_lat = $2, picker_lng = $3, picker_ts = $4, updated_at = now()
            WHERE delivery_id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(point.lat)
        .bind(point.lng)
        .bind(point.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_status(
        &self,
        delivery_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE delivery_tracking
            SET status = $2, updated_at = now()
            WHERE delivery_id = $1
            "#,
        )
        .bind(delivery_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-memory store used by tests and local runs without a database.
#[derive(Default)]
pub struct MemoryTrackingStore {
    records: Mutex<HashMap<i64, DeliveryTrackingState>>,
}

impl MemoryTrackingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stand-in for the marketplace's record creation on offer acceptance.
    pub async fn insert(&self, state: DeliveryTrackingState) {
        self.records.lock().await.insert(state.delivery_id, state);
    }
}

#[async_trait]
impl TrackingStore for MemoryTrackingStore {
    async fn get(&self, delivery_id: i64) -> Result<Option<DeliveryTrackingState>, StoreError> {
        Ok(self.records.lock().await.get(&delivery_id).cloned())
    }

    async fn update_picker_location(
        &self,
        delivery_id: i64,
        point: &LocationPoint,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&delivery_id) {
            record.picker_location = Some(point.clone());
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_status(
        &self,
        delivery_id: i64,
        status: DeliveryStatus,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&delivery_id) {
            record.status = status;
            record.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(delivery_id: i64) -> DeliveryTrackingState {
        let now = Utc::now();
        DeliveryTrackingState {
            id: delivery_id,
            delivery_id,
            picker_id: 42,
            sender_id: 3,
            receiver_id: None,
            from_location: GeoPoint { lat: 53.9, lng: 27.5 },
            to_location: GeoPoint { lat: 53.95, lng: 27.6 },
            picker_location: None,
            status: DeliveryStatus::Accepted,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn memory_store_round_trips_updates() {
        let store = MemoryTrackingStore::new();
        store.insert(record(100)).await;

        let point = LocationPoint {
            lat: 54.0,
            lng: 27.55,
            timestamp: Utc::now(),
        };
        store.update_picker_location(100, &point).await.unwrap();
        store
            .update_status(100, DeliveryStatus::PickedUp)
            .await
            .unwrap();

        let state = store.get(100).await.unwrap().unwrap();
        assert_eq!(state.picker_location, Some(point));
        assert_eq!(state.status, DeliveryStatus::PickedUp);
        assert!(store.get(999).await.unwrap().is_none());
    }
}
