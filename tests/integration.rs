//! Integration tests for the wire contract and arbitration rules

use nds::peer::{HeartbeatVerdict, PeerState, TickAction};
use nds::wire::{decode, encode, DataMessage, HeartbeatMessage, Message};
use nds::Error;
use std::time::{Duration, Instant};

#[test]
fn test_data_message_round_trip() {
    let msg = Message::Data(DataMessage {
        value: "hello".to_string(),
        timestamp: 1_700_000_000,
    });
    let frame = encode(&msg).unwrap();
    assert_eq!(decode(&frame).unwrap(), msg);
}

#[test]
fn test_oversized_length_field_is_malformed() {
    let msg = Message::Heartbeat(HeartbeatMessage {
        listen_port: 31582,
        source: String::new(),
        timestamp: 5,
    });
    let mut frame = encode(&msg).unwrap().to_vec();
    frame.truncate(frame.len() - 3);
    assert!(matches!(decode(&frame), Err(Error::MalformedMessage(_))));
}

#[test]
fn test_garbage_never_panics() {
    // every prefix of a valid frame, plus a few hand-made buffers
    let frame = encode(&Message::Data(DataMessage {
        value: "hello".to_string(),
        timestamp: 1,
    }))
    .unwrap();
    for end in 0..frame.len() {
        assert!(decode(&frame[..end]).is_err());
    }
    for buf in [
        &[0xff, 0xff, 0xff, 0xff][..],
        &[0, 0, 0, 0][..],
        &[2, 0, 0, 0, b'{', b'}'][..],
    ] {
        assert!(decode(buf).is_err());
    }
}

#[test]
fn test_bootstrap_then_converge() {
    let start = Instant::now();
    let mut state = PeerState::new(start + Duration::from_secs(2));

    assert_eq!(state.on_tick(start, true, 100), TickAction::Idle);
    assert_eq!(state.on_heartbeat(1_700_000_000), HeartbeatVerdict::Adopted(1_700_000_000));
    assert_eq!(
        state.on_tick(start + Duration::from_secs(4), true, 1_800_000_000),
        TickAction::Announce(1_700_000_000)
    );
}
