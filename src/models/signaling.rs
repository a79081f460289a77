use serde::{Deserialize, Serialize};

/// A relayed chat message, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: String,
    pub body: String,
}

/// An opaque peer-negotiation payload relayed to one receiver.
///
/// The structure of `data` is the peer-connection library's contract;
/// this layer never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSignal {
    pub sender_id: String,
    pub data: serde_json::Value,
}
