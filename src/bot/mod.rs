/// Message dispatcher state machine
pub mod dispatcher;
/// Command and message handlers
pub mod handlers;
/// Outbound reply transport
pub mod transport;
/// User-facing texts
pub mod views;
