// ABOUTME: Protocol module for the relay wire format
// ABOUTME: Message types, roles, and inbound frame classification

mod messages;

pub use messages::{classify, ClientMessage, InboundFrame, Role, ServerMessage};
