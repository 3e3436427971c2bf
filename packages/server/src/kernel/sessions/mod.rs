//! Live sessions over WebSocket.
//!
//! A session groups the jobs one client cares about with the connections it
//! has open. The [`SessionRegistry`] holds that mapping, the
//! [`BroadcastGateway`] turns job events into full-snapshot `session_update`
//! pushes, and [`protocol`] defines the JSON envelope both sides speak.

pub mod gateway;
pub mod protocol;
pub mod reconnect;
pub mod registry;

pub use gateway::BroadcastGateway;
pub use protocol::{ClientCommand, ProtocolError, ServerMessage};
pub use reconnect::ReconnectPolicy;
pub use registry::{ConnectionSender, SessionRegistry};
