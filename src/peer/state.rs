//! Peer state and timestamp arbitration
//!
//! Pure transitions, no I/O. The coordinator feeds events in and acts on the
//! returned decisions.

use crate::wire::{DataMessage, Timestamp};
use std::time::Instant;

/// Lifecycle of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    /// No canonical timestamp yet
    Bootstrapping,
    /// Holding a non-zero timestamp
    Converged,
    /// Shutting down
    Terminating,
}

impl std::fmt::Display for PeerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerPhase::Bootstrapping => write!(f, "bootstrapping"),
            PeerPhase::Converged => write!(f, "converged"),
            PeerPhase::Terminating => write!(f, "terminating"),
        }
    }
}

/// What a tick asks the coordinator to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Terminate,
    /// Elected itself with this timestamp; announce it
    SelfElected(Timestamp),
    /// Re-announce the held timestamp
    Announce(Timestamp),
    Idle,
}

/// Outcome of a received heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatVerdict {
    /// Remote timestamp was greater and is now ours
    Adopted(Timestamp),
    /// Same timestamp as ours, but our value still belongs to an older one
    Refetch(Timestamp),
    /// Remote is behind our non-zero timestamp
    Outdated,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PeerState {
    current_timestamp: Timestamp,
    desired_timestamp: Timestamp,
    value: String,
    /// Timestamp `value` was published under; lags `current_timestamp`
    /// until an adopted value has been fetched
    value_timestamp: Timestamp,
    bootstrap_deadline: Instant,
    exit_required: bool,
    phase: PeerPhase,
}

impl PeerState {
    pub fn new(bootstrap_deadline: Instant) -> Self {
        Self {
            current_timestamp: 0,
            desired_timestamp: 0,
            value: String::new(),
            value_timestamp: 0,
            bootstrap_deadline,
            exit_required: false,
            phase: PeerPhase::Bootstrapping,
        }
    }

    pub fn current_timestamp(&self) -> Timestamp {
        self.current_timestamp
    }

    pub fn desired_timestamp(&self) -> Timestamp {
        self.desired_timestamp
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn value_timestamp(&self) -> Timestamp {
        self.value_timestamp
    }

    /// Does the held value belong to the held timestamp?
    pub fn is_synced(&self) -> bool {
        self.value_timestamp == self.current_timestamp
    }

    pub fn phase(&self) -> PeerPhase {
        self.phase
    }

    pub fn request_exit(&mut self) {
        self.exit_required = true;
    }

    /// Response body for a TCP client.
    ///
    /// Always a matching pair: while an adopted value is still being fetched
    /// the previous value is served under its own timestamp.
    pub fn data_message(&self) -> DataMessage {
        DataMessage {
            value: self.value.clone(),
            timestamp: self.value_timestamp,
        }
    }

    /// Assert `value` as canonical from the start
    pub fn publish(&mut self, value: String, now_epoch: Timestamp) {
        self.set_canonical(value, now_epoch);
    }

    /// Periodic timekeeping. `long_lived` peers never time out.
    pub fn on_tick(&mut self, now: Instant, long_lived: bool, now_epoch: Timestamp) -> TickAction {
        if self.phase == PeerPhase::Terminating {
            return TickAction::Terminate;
        }

        if self.exit_required {
            self.phase = PeerPhase::Terminating;
            return TickAction::Terminate;
        }

        let past_deadline = now > self.bootstrap_deadline;

        if !long_lived && past_deadline {
            self.phase = PeerPhase::Terminating;
            return TickAction::Terminate;
        }

        if self.current_timestamp == 0 && self.desired_timestamp == 0 && past_deadline {
            self.set_canonical(String::new(), now_epoch);
            return TickAction::SelfElected(now_epoch);
        }

        if self.current_timestamp != 0 {
            TickAction::Announce(self.current_timestamp)
        } else {
            TickAction::Idle
        }
    }

    /// Greater remote timestamps win; equal ones change nothing beyond asking
    /// for the value again when ours is still missing.
    pub fn on_heartbeat(&mut self, remote: Timestamp) -> HeartbeatVerdict {
        if self.phase == PeerPhase::Terminating {
            return HeartbeatVerdict::Ignored;
        }

        if remote > self.current_timestamp {
            self.current_timestamp = remote;
            self.desired_timestamp = remote;
            self.phase = PeerPhase::Converged;
            HeartbeatVerdict::Adopted(remote)
        } else if remote < self.current_timestamp {
            HeartbeatVerdict::Outdated
        } else if !self.is_synced() {
            HeartbeatVerdict::Refetch(remote)
        } else {
            HeartbeatVerdict::Ignored
        }
    }

    /// Apply a value fetched from another peer. Stale or empty bodies are
    /// dropped; returns whether the state changed.
    pub fn apply_synced(&mut self, data: DataMessage) -> bool {
        if self.phase == PeerPhase::Terminating
            || data.timestamp == 0
            || data.timestamp < self.current_timestamp
        {
            return false;
        }
        self.set_canonical(data.value, data.timestamp);
        true
    }

    fn set_canonical(&mut self, value: String, timestamp: Timestamp) {
        self.value = value;
        self.value_timestamp = timestamp;
        self.current_timestamp = timestamp;
        self.desired_timestamp = timestamp;
        if timestamp != 0 {
            self.phase = PeerPhase::Converged;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const T0: Timestamp = 1_700_000_000;

    fn fresh() -> (PeerState, Instant) {
        let start = Instant::now();
        (PeerState::new(start + Duration::from_secs(2)), start)
    }

    #[test]
    fn test_new_state_is_undetermined() {
        let (state, _) = fresh();
        assert_eq!(state.current_timestamp(), 0);
        assert_eq!(state.desired_timestamp(), 0);
        assert_eq!(state.value(), "");
        assert_eq!(state.phase(), PeerPhase::Bootstrapping);
    }

    #[test]
    fn test_idle_before_deadline() {
        let (mut state, start) = fresh();
        assert_eq!(state.on_tick(start, false, T0), TickAction::Idle);
        assert_eq!(state.on_tick(start, true, T0), TickAction::Idle);
        assert_eq!(state.phase(), PeerPhase::Bootstrapping);
    }

    #[test]
    fn test_one_shot_peer_terminates_after_deadline() {
        let (mut state, start) = fresh();
        let late = start + Duration::from_secs(3);
        assert_eq!(state.on_tick(late, false, T0), TickAction::Terminate);
        assert_eq!(state.phase(), PeerPhase::Terminating);
        // a one-shot peer never self-elects
        assert_eq!(state.current_timestamp(), 0);
    }

    #[test]
    fn test_long_lived_peer_self_elects() {
        let (mut state, start) = fresh();
        let late = start + Duration::from_secs(3);
        assert_eq!(state.on_tick(late, true, T0), TickAction::SelfElected(T0));
        assert_eq!(state.current_timestamp(), T0);
        assert_eq!(state.desired_timestamp(), T0);
        assert_eq!(state.value(), "");
        assert!(state.is_synced());
        assert_eq!(state.data_message().timestamp, T0);
        assert_eq!(state.phase(), PeerPhase::Converged);

        // later ticks only re-announce
        assert_eq!(state.on_tick(late, true, T0 + 5), TickAction::Announce(T0));
    }

    #[test]
    fn test_exit_required_wins() {
        let (mut state, start) = fresh();
        state.request_exit();
        assert_eq!(state.on_tick(start, true, T0), TickAction::Terminate);
        assert_eq!(state.phase(), PeerPhase::Terminating);
    }

    #[test]
    fn test_publish_sets_value_and_timestamp() {
        let (mut state, start) = fresh();
        state.publish("hello".into(), T0);
        assert_eq!(state.value(), "hello");
        assert_eq!(state.current_timestamp(), T0);
        assert_eq!(state.desired_timestamp(), T0);
        assert_eq!(state.on_tick(start, true, T0 + 1), TickAction::Announce(T0));
    }

    #[test]
    fn test_heartbeat_adoption() {
        let (mut state, _) = fresh();
        assert_eq!(state.on_heartbeat(0), HeartbeatVerdict::Ignored);
        assert_eq!(state.on_heartbeat(T0), HeartbeatVerdict::Adopted(T0));
        assert_eq!(state.current_timestamp(), T0);
        assert_eq!(state.desired_timestamp(), T0);
        assert_eq!(state.on_heartbeat(T0 - 1), HeartbeatVerdict::Outdated);
        assert_eq!(state.current_timestamp(), T0);
    }

    #[test]
    fn test_equal_heartbeat_refetches_until_synced() {
        let (mut state, _) = fresh();
        state.on_heartbeat(T0);
        assert!(!state.is_synced());
        assert_eq!(state.on_heartbeat(T0), HeartbeatVerdict::Refetch(T0));
        assert_eq!(state.on_heartbeat(T0), HeartbeatVerdict::Refetch(T0));

        assert!(state.apply_synced(DataMessage {
            value: "hello".into(),
            timestamp: T0,
        }));
        assert!(state.is_synced());
        assert_eq!(state.on_heartbeat(T0), HeartbeatVerdict::Ignored);
    }

    #[test]
    fn test_unsynced_peer_serves_previous_pair() {
        let (mut state, _) = fresh();
        state.publish("old".into(), T0);
        state.on_heartbeat(T0 + 10);
        assert_eq!(
            state.data_message(),
            DataMessage {
                value: "old".into(),
                timestamp: T0,
            }
        );

        // a third peer that adopted T0 + 10 refuses that body
        let (mut third, _) = fresh();
        third.on_heartbeat(T0 + 10);
        assert!(!third.apply_synced(state.data_message()));
        assert_eq!(third.value(), "");
        assert!(!third.is_synced());
    }

    #[test]
    fn test_adoption_prevents_self_election() {
        let (mut state, start) = fresh();
        state.on_heartbeat(T0);
        let late = start + Duration::from_secs(3);
        assert_eq!(state.on_tick(late, true, T0 + 10), TickAction::Announce(T0));
        assert_eq!(state.current_timestamp(), T0);
    }

    #[test]
    fn test_apply_synced() {
        let (mut state, _) = fresh();
        state.on_heartbeat(T0);
        assert!(state.apply_synced(DataMessage {
            value: "hello".into(),
            timestamp: T0,
        }));
        assert_eq!(state.value(), "hello");

        // stale body
        assert!(!state.apply_synced(DataMessage {
            value: "old".into(),
            timestamp: T0 - 1,
        }));
        // peer that has nothing yet
        assert!(!state.apply_synced(DataMessage::default()));
        assert_eq!(state.value(), "hello");
        assert_eq!(state.current_timestamp(), T0);
    }
}
