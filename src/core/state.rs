//! Link state tracking
//!
//! The tracker owns the single last-known link state and decides whether an
//! observation is an actual transition. It performs no I/O; callers fire the
//! side-effect action once per returned [`Transition`].

use crate::hid::protocol::{FrameKind, LinkStatus};
use std::fmt;

/// Logical attach state of the keyboard to its dongle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// Not yet resolved for the current session
    #[default]
    Unknown,
    /// Keyboard is linked to the dongle
    Connected,
    /// Keyboard is off or out of range
    Disconnected,
}

impl LinkState {
    /// Map a status payload byte to a resolved state
    pub fn from_status_byte(byte: u8) -> Option<Self> {
        LinkStatus::from_byte(byte).map(Self::from)
    }

    pub fn is_resolved(&self) -> bool {
        *self != LinkState::Unknown
    }
}

impl From<LinkStatus> for LinkState {
    fn from(status: LinkStatus) -> Self {
        match status {
            LinkStatus::Up => LinkState::Connected,
            LinkStatus::Down => LinkState::Disconnected,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Unknown => write!(f, "UNKNOWN"),
            LinkState::Connected => write!(f, "CONNECTED"),
            LinkState::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}

/// A change of the stored link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LinkState,
    pub to: LinkState,
}

/// Holds the last-known link state for one connection session
#[derive(Debug, Default)]
pub struct LinkStateTracker {
    state: LinkState,
}

impl LinkStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Feed a raw status payload byte.
    ///
    /// Unmapped payloads are ignored and never produce a transition.
    pub fn observe(&mut self, raw: u8) -> Option<Transition> {
        let next = LinkState::from_status_byte(raw)?;
        self.resolve(next)
    }

    /// Feed a classified frame; only status frames can move the state.
    pub fn apply(&mut self, frame: FrameKind) -> Option<Transition> {
        match frame {
            FrameKind::Status(raw) => self.observe(raw),
            FrameKind::PingAck | FrameKind::Unrecognized => None,
        }
    }

    /// Move to `next` if it differs from the stored state.
    pub fn resolve(&mut self, next: LinkState) -> Option<Transition> {
        if next == self.state {
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: next,
        };
        self.state = next;
        Some(transition)
    }

    /// Forget the stored state (interface pair torn down)
    pub fn reset(&mut self) {
        self.state = LinkState::Unknown;
    }
}
