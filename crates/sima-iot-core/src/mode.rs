//! Connection-mode finite state machine.
//!
//! [`transition_mode`] is the single entry point for mode changes. It is
//! side-effect free: the returned [`ModeTransition`] tells the session
//! controller which effects to run.

use crate::types::ConnectionMode;

/// Input to the mode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// Live subscription established after `connect()`.
    SubscribeSucceeded,
    /// Live subscription could not be established during `connect()`.
    SubscribeFailed,
    /// Established live transport dropped.
    TransportLost,
    /// Explicit `disconnect()`.
    DisconnectRequested,
    /// The selected resource changed.
    ResourceChanged,
}

/// Outcome of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub next: ConnectionMode,
    /// Cancel the active producer before anything else.
    pub teardown: bool,
    /// Start the failover generator.
    pub start_simulator: bool,
    /// Drop all buffered history.
    pub clear_buffers: bool,
}

impl ModeTransition {
    /// Move to `mode` without any effect.
    fn plain(mode: ConnectionMode) -> Self {
        Self {
            next: mode,
            teardown: false,
            start_simulator: false,
            clear_buffers: false,
        }
    }

    pub fn changed(&self, from: ConnectionMode) -> bool {
        self.next != from
    }
}

/// Pure transition function.
///
/// There is exactly one failover per connect: once `Simulated`, further
/// transport events are ignored until an explicit disconnect and reconnect.
pub fn transition_mode(current: ConnectionMode, event: ModeEvent) -> ModeTransition {
    use ConnectionMode::{Disconnected, Live, Simulated};

    match (current, event) {
        (Disconnected, ModeEvent::SubscribeSucceeded) => ModeTransition::plain(Live),
        (Disconnected, ModeEvent::SubscribeFailed) | (Live, ModeEvent::TransportLost) => {
            ModeTransition {
                next: Simulated,
                teardown: current == Live,
                start_simulator: true,
                clear_buffers: false,
            }
        }
        (Live | Simulated, ModeEvent::DisconnectRequested) => ModeTransition {
            next: Disconnected,
            teardown: true,
            start_simulator: false,
            clear_buffers: false,
        },
        (_, ModeEvent::ResourceChanged) => ModeTransition {
            next: Disconnected,
            teardown: current.is_connected(),
            start_simulator: false,
            clear_buffers: true,
        },
        // Stale subscribe results, transport events outside Live, and
        // disconnect while already disconnected.
        (mode, _) => ModeTransition::plain(mode),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
