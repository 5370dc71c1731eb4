pub mod auth;
pub mod error;
pub mod gateway;
pub mod rooms;
pub mod server;
pub mod state;
pub mod store;
