//! Dongle discovery, session lifecycle and passive link monitoring
//!
//! A single blocking loop: discover both interfaces, open them, run the
//! handshake, then read the event interface with a bounded timeout until the
//! dongle disappears or the monitor is stopped. Every read has a timeout, so
//! the running flag is observed at least once per `listen_timeout`.

use super::error::FaultKind;
use super::handshake;
use super::protocol::{classify, FRAME_SIZE};
use super::transport::{Discovery, HidHandle, HidTransport, InterfacePair, InterfacePaths};
use crate::action::LinkAction;
use crate::core::config::{DeviceConfig, TimingConfig};
use crate::core::state::{LinkState, LinkStateTracker, Transition};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Where the monitor loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// Waiting for both interfaces to show up and open
    Discovering,
    /// Interfaces open, reading link events
    PassiveListening,
    /// Stop requested; interfaces closed
    Stopped,
}

/// Requests a running monitor to stop; cloneable and thread-safe
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Watches one dongle and fires the link action on every transition
pub struct ConnectionMonitor<T: HidTransport, A: LinkAction> {
    transport: T,
    action: A,
    device: DeviceConfig,
    timing: TimingConfig,
    tracker: LinkStateTracker,
    /// Open interfaces of the current session
    pair: Option<InterfacePair<T::Handle>>,
    running: Arc<AtomicBool>,
    /// "Waiting for dongle" already logged at info level this idle period
    waiting_logged: bool,
}

impl<T: HidTransport, A: LinkAction> ConnectionMonitor<T, A> {
    pub fn new(transport: T, action: A, device: DeviceConfig, timing: TimingConfig) -> Self {
        Self {
            transport,
            action,
            device,
            timing,
            tracker: LinkStateTracker::new(),
            pair: None,
            running: Arc::new(AtomicBool::new(true)),
            waiting_logged: false,
        }
    }

    /// Share an externally created stop flag (e.g. one owned by a signal handler)
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.running = stop.running;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Last known link state of the current session
    pub fn link_state(&self) -> LinkState {
        self.tracker.state()
    }

    /// Whether an interface pair is open
    pub fn is_attached(&self) -> bool {
        self.pair.is_some()
    }

    pub fn phase(&self) -> MonitorPhase {
        if !self.running.load(Ordering::SeqCst) {
            MonitorPhase::Stopped
        } else if self.pair.is_some() {
            MonitorPhase::PassiveListening
        } else {
            MonitorPhase::Discovering
        }
    }

    /// Run until stopped, then close any open interfaces
    pub fn run(&mut self) {
        info!(
            "Starting dual-interface monitor (VID={:04X} PID={:04X})",
            self.device.vendor_id, self.device.product_id
        );

        while self.step() != MonitorPhase::Stopped {}

        info!("Monitor stopped");
    }

    /// One loop iteration; returns the phase the monitor ends up in
    pub fn step(&mut self) -> MonitorPhase {
        if !self.running.load(Ordering::SeqCst) {
            self.shutdown();
            return MonitorPhase::Stopped;
        }

        if self.pair.is_none() {
            return match self.connect() {
                Some(pair) => {
                    self.pair = Some(pair);
                    self.waiting_logged = false;
                    self.handshake();
                    info!("Entering passive monitor mode");
                    MonitorPhase::PassiveListening
                }
                None => {
                    thread::sleep(self.timing.idle_interval());
                    MonitorPhase::Discovering
                }
            };
        }

        self.listen_once()
    }

    /// Close any open interfaces
    pub fn shutdown(&mut self) {
        if let Some(mut pair) = self.pair.take() {
            if pair.is_open() {
                pair.close();
                info!("Closed dongle interfaces");
            }
        }
    }

    fn discover(&mut self) -> Option<InterfacePaths> {
        let interfaces = match self.transport.enumerate(self.device.identity()) {
            Ok(interfaces) => interfaces,
            Err(e) => {
                debug!("Discovery failed ({:?}): {}", e.kind(), e);
                Vec::new()
            }
        };

        match Discovery::from_interfaces(
            &interfaces,
            self.device.command_usage_page,
            self.device.event_usage_page,
        ) {
            Discovery::Found(paths) => Some(paths),
            Discovery::Missing { command, event } => {
                if self.waiting_logged {
                    debug!(
                        "Dongle not found (command missing: {}, event missing: {})",
                        command, event
                    );
                } else {
                    info!("Waiting for dongle...");
                    self.waiting_logged = true;
                }
                None
            }
        }
    }

    /// Discover and open both interfaces; a half-opened pair is closed again
    fn connect(&mut self) -> Option<InterfacePair<T::Handle>> {
        let paths = self.discover()?;

        let mut command = match self.transport.open(&paths.command) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Error opening command interface: {}", e);
                return None;
            }
        };

        let event = match self.transport.open(&paths.event) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Error opening event interface: {}", e);
                command.close();
                return None;
            }
        };

        info!("Both interfaces opened");
        Some(InterfacePair::new(command, event))
    }

    fn handshake(&mut self) {
        let Some(pair) = self.pair.as_mut() else {
            return;
        };

        let outcome = handshake::run(pair, &mut self.tracker, &self.timing);
        debug!(
            "Handshake finished after {} round(s), ping answered: {}",
            outcome.rounds, outcome.ping_answered
        );

        for transition in outcome.transitions {
            self.announce(transition);
        }
    }

    fn listen_once(&mut self) -> MonitorPhase {
        let mut buf = [0u8; FRAME_SIZE];

        let Some(pair) = self.pair.as_mut() else {
            return MonitorPhase::Discovering;
        };

        match pair.event.read_timeout(&mut buf, self.timing.listen_timeout()) {
            Ok(0) => {}
            Ok(n) => {
                let kind = classify(&buf[..n]);
                debug!("Event frame: {:?}", kind);
                if let Some(transition) = self.tracker.apply(kind) {
                    info!(">>> Keyboard {} (link event)", transition.to);
                    self.announce(transition);
                }
            }
            Err(e) => match e.kind() {
                FaultKind::Removal => {
                    info!("Dongle removed ({}). Re-scanning...", e);
                    self.teardown();
                    return MonitorPhase::Discovering;
                }
                _ => warn!("Error in monitor loop: {}", e),
            },
        }

        self.drain_command();
        MonitorPhase::PassiveListening
    }

    /// Discard anything the command interface sent unprompted
    fn drain_command(&mut self) {
        let Some(pair) = self.pair.as_mut() else {
            return;
        };

        let mut buf = [0u8; FRAME_SIZE];
        match pair.command.read_timeout(&mut buf, self.timing.drain_timeout()) {
            Ok(0) => {}
            Ok(n) => debug!("Drained {:?} from command interface", classify(&buf[..n])),
            Err(e) => debug!("Command drain failed: {}", e),
        }
    }

    /// End the session: close both interfaces and forget the link state
    fn teardown(&mut self) {
        self.shutdown();
        self.tracker.reset();
    }

    fn announce(&mut self, transition: Transition) {
        debug!("Link transition {} -> {}", transition.from, transition.to);
        self.action.notify_link_change(transition.to);
    }
}

impl<T: HidTransport, A: LinkAction> Drop for ConnectionMonitor<T, A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
