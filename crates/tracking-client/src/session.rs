use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use shared::{ClientEvent, DeliveryStatus, DeliveryTrackingState, LocationPoint, ServerEvent};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Delay before reconnect attempt `n` (1-based): 1s, 2s, 4s, 8s, 16s.
pub fn reconnect_delay(attempt: u32) -> Duration {
    INITIAL_RECONNECT_DELAY * 2u32.saturating_pow(attempt.saturating_sub(1))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("bearer token is not a valid header value")]
    Token,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: String,
    pub token: String,
    pub user_id: i64,
}

enum Command {
    Emit(ClientEvent),
    Close,
}

enum Exit {
    /// The caller asked for the session to end.
    Closed,
    /// The transport went away underneath us; reconnect.
    Dropped,
}

type Handler<T> = RwLock<Option<Box<dyn Fn(T) + Send + Sync>>>;

/// Handler wiring lives apart from the connection lifecycle so callbacks
/// can be swapped at any time without tearing the transport down.
#[derive(Default)]
struct Handlers {
    tracking_data: Handler<DeliveryTrackingState>,
    location_update: Handler<(i64, LocationPoint)>,
    status_update: Handler<(i64, DeliveryStatus)>,
    tracking_completed: Handler<i64>,
    error: Handler<String>,
}

impl Handlers {
    fn set<T>(slot: &Handler<T>, callback: impl Fn(T) + Send + Sync + 'static) {
        if let Ok(mut guard) = slot.write() {
            *guard = Some(Box::new(callback));
        }
    }

    fn fire<T>(slot: &Handler<T>, value: T) {
        if let Ok(guard) = slot.read() {
            if let Some(callback) = guard.as_ref() {
                callback(value);
            }
        }
    }

    fn dispatch(&self, event: ServerEvent) {
        match event {
            ServerEvent::TrackingData(state) => Self::fire(&self.tracking_data, state),
            ServerEvent::LocationUpdated {
                delivery_id,
                picker_location,
            } => Self::fire(&self.location_update, (delivery_id, picker_location)),
            ServerEvent::StatusUpdated {
                delivery_id,
                status,
            } => Self::fire(&self.status_update, (delivery_id, status)),
            ServerEvent::TrackingCompleted { delivery_id } => {
                Self::fire(&self.tracking_completed, delivery_id)
            }
            ServerEvent::Error { message } => Self::fire(&self.error, message),
        }
    }
}

/// An explicitly owned tracking connection. Dropping the handle does not
/// tear the connection down; call [`disconnect`](Self::disconnect).
///
/// On a transport drop the session reconnects with doubling delays, and on
/// each fresh connection re-issues `join-tracking` for every room the
/// caller had joined; the gateway's idempotent join resends the snapshot.
pub struct ClientTrackingSession {
    user_id: i64,
    commands: mpsc::UnboundedSender<Command>,
    handlers: Arc<Handlers>,
    joined: Arc<Mutex<HashSet<i64>>>,
    task: JoinHandle<()>,
}

impl ClientTrackingSession {
    /// Validates the endpoint and credential, then spawns the connection
    /// supervisor. Must be called from within a tokio runtime.
    pub fn connect(config: SessionConfig) -> Result<Self, ClientError> {
        build_request(&config.endpoint, &config.token)?;

        let handlers = Arc::new(Handlers::default());
        let joined = Arc::new(Mutex::new(HashSet::new()));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let user_id = config.user_id;

        let task = tokio::spawn(supervise(
            config,
            Arc::clone(&handlers),
            Arc::clone(&joined),
            command_rx,
        ));

        Ok(Self {
            user_id,
            commands,
            handlers,
            joined,
            task,
        })
    }

    pub fn join(&self, delivery_id: i64) {
        if let Ok(mut joined) = self.joined.lock() {
            joined.insert(delivery_id);
        }
        self.emit(ClientEvent::JoinTracking {
            delivery_id,
            user_id: self.user_id,
        });
    }

    pub fn leave(&self, delivery_id: i64) {
        if let Ok(mut joined) = self.joined.lock() {
            joined.remove(&delivery_id);
        }
        self.emit(ClientEvent::LeaveTracking { delivery_id });
    }

    pub fn update_location(&self, delivery_id: i64, lat: f64, lng: f64) {
        self.emit(ClientEvent::UpdateLocation {
            delivery_id,
            lat,
            lng,
            user_id: self.user_id,
        });
    }

    pub fn update_status(&self, delivery_id: i64, status: DeliveryStatus) {
        self.emit(ClientEvent::UpdateStatus {
            delivery_id,
            status,
            user_id: self.user_id,
        });
    }

    pub fn on_tracking_data(&self, f: impl Fn(DeliveryTrackingState) + Send + Sync + 'static) {
        Handlers::set(&self.handlers.tracking_data, f);
    }

    pub fn on_location_update(&self, f: impl Fn(i64, LocationPoint) + Send + Sync + 'static) {
        Handlers::set(&self.handlers.location_update, move |(id, point)| {
            f(id, point)
        });
    }

    pub fn on_status_update(&self, f: impl Fn(i64, DeliveryStatus) + Send + Sync + 'static) {
        Handlers::set(&self.handlers.status_update, move |(id, status)| {
            f(id, status)
        });
    }

    pub fn on_tracking_completed(&self, f: impl Fn(i64) + Send + Sync + 'static) {
        Handlers::set(&self.handlers.tracking_completed, f);
    }

    pub fn on_error(&self, f: impl Fn(String) + Send + Sync + 'static) {
        Handlers::set(&self.handlers.error, f);
    }

    /// Closes the connection and waits for the supervisor to finish.
    pub async fn disconnect(self) {
        let _ = self.commands.send(Command::Close);
        let _ = self.task.await;
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.commands.send(Command::Emit(event));
    }
}

fn build_request(endpoint: &str, token: &str) -> Result<Request<()>, ClientError> {
    let mut request = endpoint.into_client_request()?;
    let value =
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ClientError::Token)?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

async fn supervise(
    config: SessionConfig,
    handlers: Arc<Handlers>,
    joined: Arc<Mutex<HashSet<i64>>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut attempt: u32 = 0;
    loop {
        let request = match build_request(&config.endpoint, &config.token) {
            Ok(request) => request,
            Err(err) => {
                tracing::error!(%err, "cannot build tracking handshake");
                return;
            }
        };

        match connect_async(request).await {
            Ok((stream, _)) => {
                tracing::info!(endpoint = %config.endpoint, "tracking connection established");
                attempt = 0;
                match drive(stream, &config, &handlers, &joined, &mut commands).await {
                    Exit::Closed => return,
                    Exit::Dropped => {
                        tracing::warn!("tracking connection dropped");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, "tracking connect failed");
            }
        }

        attempt += 1;
        if attempt > MAX_RECONNECT_ATTEMPTS {
            tracing::error!("tracking reconnect attempts exhausted");
            Handlers::fire(
                &handlers.error,
                "connection lost: reconnect attempts exhausted".to_string(),
            );
            return;
        }
        tokio::time::sleep(reconnect_delay(attempt)).await;
    }
}

async fn drive(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: &SessionConfig,
    handlers: &Handlers,
    joined: &Mutex<HashSet<i64>>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Exit {
    let (mut sink, mut source) = stream.split();

    // Replay room memberships so a reconnect needs no caller involvement.
    let rejoin: Vec<i64> = joined
        .lock()
        .map(|guard| guard.iter().copied().collect())
        .unwrap_or_default();
    for delivery_id in rejoin {
        let event = ClientEvent::JoinTracking {
            delivery_id,
            user_id: config.user_id,
        };
        if send_event(&mut sink, &event).await.is_err() {
            return Exit::Dropped;
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Emit(event)) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        return Exit::Dropped;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Exit::Closed;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => handlers.dispatch(event),
                        Err(err) => tracing::warn!(%err, "unreadable frame from gateway"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Exit::Dropped,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(%err, "tracking transport error");
                    return Exit::Dropped;
                }
            }
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &ClientEvent) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let Ok(json) = serde_json::to_string(event) else {
        return Err(());
    };
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn backoff_schedule_doubles_from_one_second() {
        assert_eq!(reconnect_delay(1), Duration::from_millis(1000));
        assert_eq!(reconnect_delay(2), Duration::from_millis(2000));
        assert_eq!(reconnect_delay(3), Duration::from_millis(4000));
        assert_eq!(reconnect_delay(4), Duration::from_millis(8000));
        assert_eq!(reconnect_delay(5), Duration::from_millis(16000));
    }

    #[test]
    fn dispatch_without_handlers_is_a_no_op() {
        let handlers = Handlers::default();
        handlers.dispatch(ServerEvent::TrackingCompleted { delivery_id: 1 });
        handlers.dispatch(ServerEvent::Error {
            message: "x".into(),
        });
    }

    #[test]
    fn swapping_a_handler_replaces_the_previous_one() {
        let handlers = Handlers::default();
        let seen = Arc::new(AtomicI64::new(0));

        let first = Arc::clone(&seen);
        Handlers::set(&handlers.tracking_completed, move |_| {
            first.store(1, Ordering::SeqCst);
        });
        let second = Arc::clone(&seen);
        Handlers::set(&handlers.tracking_completed, move |id| {
            second.store(id * 10, Ordering::SeqCst);
        });

        handlers.dispatch(ServerEvent::TrackingCompleted { delivery_id: 7 });
        assert_eq!(seen.load(Ordering::SeqCst), 70);
    }

    #[test]
    fn status_updates_reach_the_registered_handler() {
        let handlers = Handlers::default();
        let seen = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        Handlers::set(&handlers.status_update, move |(id, status)| {
            *sink.lock().unwrap() = Some((id, status));
        });

        handlers.dispatch(ServerEvent::StatusUpdated {
            delivery_id: 100,
            status: DeliveryStatus::PickedUp,
        });
        assert_eq!(
            *seen.lock().unwrap(),
            Some((100, DeliveryStatus::PickedUp))
        );
    }
}
