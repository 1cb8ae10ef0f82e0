//! Realtime gateway.
//!
//! One [`session::GatewaySession`] per WebSocket connection: it owns the
//! hub subscription for its user's channel, applies inbound messages
//! through the dispatch service and hands hub events back to the socket
//! loop in [`ws`].

pub mod protocol;
pub mod session;
pub mod ws;

pub use session::GatewaySession;
