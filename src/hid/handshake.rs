//! Initial link state handshake
//!
//! The event interface only reports changes, so a freshly opened dongle gives
//! no hint whether the keyboard is already linked. The handshake sends INIT,
//! then probes with PING: a paired keyboard answers on the command interface.
//! Status events that arrive meanwhile on either interface win over the
//! ping-based fallback.

use super::error::TransportError;
use super::protocol::{classify, CommandFrame, FrameKind, FRAME_SIZE};
use super::transport::{HidHandle, InterfacePair};
use crate::core::config::TimingConfig;
use crate::core::state::{LinkState, LinkStateTracker, Transition};
use std::thread;
use tracing::{debug, info, warn};

/// What the handshake found out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// A ping acknowledgment was received
    pub ping_answered: bool,
    /// Probe rounds started
    pub rounds: u32,
    /// Link state after the handshake
    pub resolved: LinkState,
    /// Transitions in the order they happened; the caller announces each one
    pub transitions: Vec<Transition>,
}

/// Resolve the link state of a freshly opened interface pair
pub fn run<H: HidHandle>(
    pair: &mut InterfacePair<H>,
    tracker: &mut LinkStateTracker,
    timing: &TimingConfig,
) -> HandshakeOutcome {
    info!("Checking initial link state...");
    let mut transitions = Vec::new();

    if let Err(e) = pair.command.write(&CommandFrame::init().to_report()) {
        warn!("Failed to send INIT: {}", e);
    }
    thread::sleep(timing.init_settle());

    let mut ping_answered = false;
    let mut rounds = 0;

    for round in 1..=timing.probe_rounds {
        rounds = round;
        match probe_round(pair, tracker, timing, &mut transitions) {
            Ok(true) => {
                debug!("Ping answered in round {}", round);
                ping_answered = true;
                break;
            }
            Ok(false) => {}
            Err(e) => warn!("Probe round {} failed ({:?}): {}", round, e.kind(), e),
        }
    }

    if !tracker.state().is_resolved() {
        let fallback = if ping_answered {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        if let Some(transition) = tracker.resolve(fallback) {
            info!(
                "Keyboard is {} ({})",
                fallback,
                if ping_answered { "ping answered" } else { "no ping reply" }
            );
            transitions.push(transition);
        }
    } else {
        info!("Keyboard is {} (status event)", tracker.state());
    }

    HandshakeOutcome {
        ping_answered,
        rounds,
        resolved: tracker.state(),
        transitions,
    }
}

/// One PING round: probe the command interface, then poll the event interface.
///
/// Returns `Ok(true)` once a ping acknowledgment arrives; the event interface
/// is not read in that round.
fn probe_round<H: HidHandle>(
    pair: &mut InterfacePair<H>,
    tracker: &mut LinkStateTracker,
    timing: &TimingConfig,
    transitions: &mut Vec<Transition>,
) -> Result<bool, TransportError> {
    let mut buf = [0u8; FRAME_SIZE];

    pair.command.write(&CommandFrame::ping().to_report())?;

    let n = pair.command.read_timeout(&mut buf, timing.probe_timeout())?;
    if n > 0 {
        let kind = classify(&buf[..n]);
        if kind == FrameKind::PingAck {
            return Ok(true);
        }
        record(tracker.apply(kind), transitions);
    }

    let n = pair.event.read_timeout(&mut buf, timing.probe_timeout())?;
    if n > 0 {
        let kind = classify(&buf[..n]);
        debug!("Event frame during handshake: {:?}", kind);
        record(tracker.apply(kind), transitions);
    }

    Ok(false)
}

fn record(transition: Option<Transition>, transitions: &mut Vec<Transition>) {
    if let Some(transition) = transition {
        info!(">>> Keyboard {} (status event)", transition.to);
        transitions.push(transition);
    }
}
