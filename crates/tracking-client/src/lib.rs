//! Consumer-side tracking session: an explicitly owned connection object
//! with reconnection, automatic room re-join, and swappable event handlers,
//! plus the picker-side position watcher.

pub mod endpoint;
pub mod session;
pub mod watcher;

pub use endpoint::{server_url, RuntimeContext};
pub use session::{ClientTrackingSession, SessionConfig};
pub use watcher::PositionWatcher;
