//! Wire frames exchanged with the signaling relay.
//!
//! Frames are internally-tagged JSON objects so either side can dispatch
//! on the `"type"` field:
//!
//! ```json
//! {"type":"sendMessage","appointmentId":"ap-7","userId":"u-1","message":"hi"}
//! {"type":"receiveVideoSignal","senderId":"u-2","signal":{...}}
//! ```

use serde::{Deserialize, Serialize};

/// Client-to-server operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Relay a chat line to the appointment's other participants.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        appointment_id: String,
        user_id: String,
        message: String,
    },
    /// Relay an opaque negotiation payload to one receiver.
    #[serde(rename_all = "camelCase")]
    SendVideoSignal {
        receiver_id: String,
        signal: serde_json::Value,
    },
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    ReceiveMessage { sender_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    ReceiveVideoSignal {
        sender_id: String,
        signal: serde_json::Value,
    },
}
