//! Message shapes

use serde::{Deserialize, Serialize};

/// Logical timestamp identifying a value; 0 means "undetermined"
pub type Timestamp = u64;

/// Multicast announcement of the timestamp a peer currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    /// TCP port the sender serves its value on
    #[serde(rename = "lp")]
    pub listen_port: u16,

    /// Sender identity, replaced on receipt by the observed source address
    #[serde(rename = "si", default)]
    pub source: String,

    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
}

/// Value served to TCP clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMessage {
    #[serde(rename = "dv", default)]
    pub value: String,

    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
}

/// A decoded body; the `pt` field carries the packet kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pt")]
pub enum Message {
    #[serde(rename = "alive")]
    Heartbeat(HeartbeatMessage),
    #[serde(rename = "data")]
    Data(DataMessage),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Heartbeat(_) => "alive",
            Message::Data(_) => "data",
        }
    }
}
