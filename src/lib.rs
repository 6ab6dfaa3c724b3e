//! Live AIS vessel viewer core
//!
//! Keeps a registry of vessels streamed from an AIS WebSocket server and
//! subscribes only to the region the map currently shows.

pub mod config;
pub mod errors;
pub mod gate;
pub mod map_events;
pub mod models;
pub mod presenter;
pub mod registry;
pub mod session;
pub mod transport;
pub mod viewport;
