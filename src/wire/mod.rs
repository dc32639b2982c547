//! Wire format shared by the multicast and TCP legs
//!
//! Every multicast frame is a 4-byte little-endian length followed by a JSON
//! body. The TCP leg carries a bare JSON body with no length prefix.

pub mod codec;
pub mod message;

pub use codec::{decode, decode_body, encode, encode_body, HEADER_LEN, MAX_DATAGRAM};
pub use message::{DataMessage, HeartbeatMessage, Message, Timestamp};
