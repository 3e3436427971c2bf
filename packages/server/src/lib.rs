//! Corkboard server core.
//!
//! Backend for a map-based community event board: clients submit flyers and
//! event details, async jobs extract and publish them, and a WebSocket
//! gateway streams job progress back to the submitting device.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
