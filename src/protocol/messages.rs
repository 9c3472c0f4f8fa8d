// ABOUTME: Relay protocol message definitions and inbound frame classification
// ABOUTME: JSON text frames carry a `type` discriminator; binary frames are opaque audio

use serde::{Deserialize, Serialize};

/// Role a connection registers as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single connection allowed to emit audio payload frames
    Source,
    /// A registered connection receiving broadcast control and payload frames
    Listener,
}

impl Role {
    /// Protocol string for this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Listener => "listener",
        }
    }
}

/// Messages a client sends to the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Register this connection with a role and external identifier
    #[serde(rename = "register")]
    Register {
        /// Requested role
        role: Role,
        /// Client-chosen external identifier
        id: String,
    },

    /// Source announces the start of its audio stream
    #[serde(rename = "audio_start")]
    AudioStart,

    /// Source announces the end of its audio stream
    #[serde(rename = "audio_stop")]
    AudioStop,

    /// Clock synchronization probe carrying the sender's timestamp
    #[serde(rename = "sync")]
    Sync {
        /// Sender's wall-clock timestamp in milliseconds
        timestamp: i64,
    },

    /// Any structured message with an unrecognized `type`; logged and skipped
    #[serde(other)]
    Unknown,
}

/// Messages the relay sends to clients and listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Welcome message sent to every new connection
    #[serde(rename = "connection")]
    Connection {
        /// Human-readable greeting
        message: String,
        /// Server wall-clock time in milliseconds
        timestamp: i64,
    },

    /// Registration confirmation sent back to the registering client
    #[serde(rename = "registered")]
    #[serde(rename_all = "camelCase")]
    Registered {
        /// Role the client registered as
        role: Role,
        /// Total tracked connections at registration time
        connected_clients: usize,
        /// Server wall-clock time in milliseconds
        timestamp: i64,
    },

    /// Membership change notification broadcast to listeners
    #[serde(rename = "client_update")]
    #[serde(rename_all = "camelCase")]
    ClientUpdate {
        /// Total tracked connections
        total_clients: usize,
        /// Server wall-clock time in milliseconds
        timestamp: i64,
    },

    /// Relayed stream-start announcement
    #[serde(rename = "audio_start")]
    AudioStart {
        /// Server wall-clock time in milliseconds
        timestamp: i64,
    },

    /// Relayed stream-stop announcement
    #[serde(rename = "audio_stop")]
    AudioStop {
        /// Server wall-clock time in milliseconds
        timestamp: i64,
    },

    /// Relayed clock sync carrying both clocks for offset estimation
    #[serde(rename = "sync")]
    #[serde(rename_all = "camelCase")]
    Sync {
        /// Timestamp echoed from the sender's sync probe
        master_timestamp: i64,
        /// Server wall-clock time in milliseconds
        server_timestamp: i64,
    },

    /// Metadata notice sent immediately before each forwarded binary frame
    #[serde(rename = "audio_chunk")]
    AudioChunk {
        /// Server wall-clock time in milliseconds
        timestamp: i64,
        /// Byte length of the binary frame that follows
        size: usize,
    },

    /// Broadcast when the current source connection closes
    #[serde(rename = "master_disconnected")]
    MasterDisconnected {
        /// Server wall-clock time in milliseconds
        timestamp: i64,
    },
}

/// Classified inbound frame
///
/// The relay never branches on parse exceptions: every inbound frame is run
/// through [`classify`], which yields either a structured control message or
/// the raw bytes of an opaque payload frame.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// A structured control message
    Control(ClientMessage),
    /// Opaque binary audio payload, forwarded unmodified if accepted
    Payload(Vec<u8>),
}

/// Classify an inbound frame as control or payload
///
/// Anything that parses as a tagged JSON object is control, including
/// unrecognized types ([`ClientMessage::Unknown`]). Everything else is
/// treated as raw audio payload.
pub fn classify(data: Vec<u8>) -> InboundFrame {
    match serde_json::from_slice::<ClientMessage>(&data) {
        Ok(msg) => InboundFrame::Control(msg),
        Err(_) => InboundFrame::Payload(data),
    }
}
