//! Dongle Link Monitor
//!
//! Watches a wireless keyboard dongle that exposes a command interface and a
//! link event interface, and runs an action whenever the keyboard attaches to
//! or detaches from the dongle.
//!
//! # Features
//! - Discovers both vendor HID interfaces by usage page
//! - Resolves the initial link state with an INIT/PING handshake
//! - Listens passively for link status events
//! - Rediscovers the dongle after removal and re-announces its state
//! - Runs a configurable key combination command per transition

pub mod action;
pub mod core;
pub mod hid;

pub use crate::action::{CommandAction, LinkAction};
pub use crate::core::config::Config;
pub use crate::core::state::{LinkState, LinkStateTracker, Transition};
pub use crate::hid::{ConnectionMonitor, HidapiTransport, MonitorPhase, StopHandle};
