//! The tracking protocol state machine: one authenticated session per
//! connection, joined rooms per delivery, and the four inbound operations.

use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use shared::{ClientEvent, LocationPoint, ServerEvent};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::GatewayError;
use crate::state::AppState;

/// One live connection after a successful handshake. A user may hold
/// several sessions (devices, tabs); each gets its own uuid and outbox.
pub struct Session {
    pub id: Uuid,
    pub identity: Identity,
    pub outbox: mpsc::UnboundedSender<ServerEvent>,
    pub joined: HashSet<i64>,
}

impl Session {
    pub fn new(identity: Identity, outbox: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            outbox,
            joined: HashSet::new(),
        }
    }

    fn unicast(&self, event: ServerEvent) {
        let _ = self.outbox.send(event);
    }
}

/// Drives one connection: a writer task drains the session outbox into the
/// socket while the read loop dispatches inbound events to completion, in
/// arrival order. On disconnect the session leaves every joined room; no
/// departure broadcast is sent.
pub async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(identity, tx);
    tracing::info!(
        session = %session.id,
        user = session.identity.id,
        "tracking client connected"
    );

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_event(&state, &mut session, event).await,
                Err(err) => {
                    session.unicast(ServerEvent::Error {
                        message: format!("malformed payload: {err}"),
                    });
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state
        .rooms
        .remove_session(session.id, session.joined.iter().copied())
        .await;
    writer.abort();
    tracing::info!(
        session = %session.id,
        user = session.identity.id,
        "tracking client disconnected"
    );
}

/// Exhaustive dispatch over the closed event vocabulary. Failures become a
/// unicast `error` event and never alter room or store state.
pub async fn handle_event(state: &AppState, session: &mut Session, event: ClientEvent) {
    let result = match event {
        ClientEvent::JoinTracking { delivery_id, .. } => {
            join_tracking(state, session, delivery_id).await
        }
        ClientEvent::LeaveTracking { delivery_id } => {
            leave_tracking(state, session, delivery_id).await
        }
        ClientEvent::UpdateLocation {
            delivery_id,
            lat,
            lng,
            ..
        } => update_location(state, session, delivery_id, lat, lng).await,
        ClientEvent::UpdateStatus {
            delivery_id,
            status,
            ..
        } => update_status(state, session, delivery_id, status).await,
    };

    if let Err(err) = result {
        tracing::warn!(
            session = %session.id,
            user = session.identity.id,
            %err,
            "tracking event rejected"
        );
        session.unicast(ServerEvent::Error {
            message: err.to_string(),
        });
    }
}

/// Idempotent join: a repeat join keeps a single membership entry but
/// always resends a fresh snapshot, which is what reconnecting clients
/// rely on.
async fn join_tracking(
    state: &AppState,
    session: &mut Session,
    delivery_id: i64,
) -> Result<(), GatewayError> {
    let snapshot = state
        .store
        .get(delivery_id)
        .await?
        .ok_or(GatewayError::UnknownDelivery(delivery_id))?;

    state
        .rooms
        .join(delivery_id, session.id, session.outbox.clone())
        .await;
    session.joined.insert(delivery_id);

    session.unicast(ServerEvent::TrackingData(snapshot));
    Ok(())
}

async fn leave_tracking(
    state: &AppState,
    session: &mut Session,
    delivery_id: i64,
) -> Result<(), GatewayError> {
    state.rooms.leave(delivery_id, session.id).await;
    session.joined.remove(&delivery_id);
    Ok(())
}

/// Only the assigned picker may move the parcel. The session's resolved
/// identity is authoritative; the `userId` field on the wire is ignored.
async fn update_location(
    state: &AppState,
    session: &mut Session,
    delivery_id: i64,
    lat: f64,
    lng: f64,
) -> Result<(), GatewayError> {
    let record = state
        .store
        .get(delivery_id)
        .await?
        .ok_or(GatewayError::UnknownDelivery(delivery_id))?;

    if session.identity.id != record.picker_id {
        return Err(GatewayError::Forbidden(
            "only the assigned picker may update the delivery location".to_string(),
        ));
    }

    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(GatewayError::Validation(format!("invalid latitude: {lat}")));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(GatewayError::Validation(format!("invalid longitude: {lng}")));
    }

    let point = LocationPoint {
        lat,
        lng,
        timestamp: Utc::now(),
    };
    state
        .store
        .update_picker_location(delivery_id, &point)
        .await?;

    state
        .rooms
        .broadcast(
            delivery_id,
            ServerEvent::LocationUpdated {
                delivery_id,
                picker_location: point,
            },
            None,
        )
        .await;
    Ok(())
}

async fn update_status(
    state: &AppState,
    session: &mut Session,
    delivery_id: i64,
    status: shared::DeliveryStatus,
) -> Result<(), GatewayError> {
    let record = state
        .store
        .get(delivery_id)
        .await?
        .ok_or(GatewayError::UnknownDelivery(delivery_id))?;

    if !record.status.can_transition_to(status) {
        return Err(GatewayError::InvalidTransition {
            from: record.status,
            to: status,
        });
    }

    state.store.update_status(delivery_id, status).await?;

    state
        .rooms
        .broadcast(
            delivery_id,
            ServerEvent::StatusUpdated {
                delivery_id,
                status,
            },
            None,
        )
        .await;

    if status.is_terminal() {
        state
            .rooms
            .broadcast(
                delivery_id,
                ServerEvent::TrackingCompleted { delivery_id },
                None,
            )
            .await;
        state.rooms.evict(delivery_id).await;
        tracing::info!(delivery = delivery_id, %status, "tracking completed");
    }
    Ok(())
}
