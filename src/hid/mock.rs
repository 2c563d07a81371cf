//! Scripted in-memory transport for driving the monitor in tests.
//!
//! Each interface path has a queue of [`ReadStep`]s consumed by reads; an
//! empty queue reads as a timeout. Interfaces flagged with
//! [`MockBus::answer_pings`] reply to every PING with a ping acknowledgment.
//! The bus is shared through `Rc<RefCell<..>>` so a test can keep a handle
//! after moving the transport into the monitor.

use super::error::TransportError;
use super::protocol::CommandFrame;
use super::transport::{DeviceIdentity, HidHandle, HidTransport, InterfaceInfo};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::{CStr, CString};
use std::rc::Rc;
use std::time::Duration;

pub const COMMAND_PATH: &str = "mock://dongle/command";
pub const EVENT_PATH: &str = "mock://dongle/event";

/// What the next read on an interface returns
#[derive(Debug, Clone)]
pub enum ReadStep {
    Frame(Vec<u8>),
    Timeout,
    Removed,
    Transient,
}

/// 64-byte status frame carrying `payload`
pub fn status_frame(payload: u8) -> Vec<u8> {
    let mut frame = vec![0u8; 64];
    frame[0] = 0x05;
    frame[1] = 0xA6;
    frame[3] = payload;
    frame
}

pub fn ping_ack_frame() -> Vec<u8> {
    let mut frame = vec![0u8; 64];
    frame[0] = 0x20;
    frame[1] = 0x01;
    frame
}

#[derive(Default)]
struct BusState {
    present: bool,
    interfaces: Vec<InterfaceInfo>,
    scripts: HashMap<CString, VecDeque<ReadStep>>,
    answer_pings: HashSet<CString>,
    pending_acks: HashMap<CString, usize>,
    fail_open: HashSet<CString>,
    fail_enumerate: bool,
    failing_writes: HashMap<CString, usize>,
    writes: Vec<(CString, Vec<u8>)>,
    reads: HashMap<CString, usize>,
    enumerations: usize,
    opened: usize,
    closed: usize,
}

/// Shared view of the simulated dongle
#[derive(Clone, Default)]
pub struct MockBus {
    state: Rc<RefCell<BusState>>,
}

impl MockBus {
    /// A bus with no dongle attached
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus with the dongle attached, exposing command and event interfaces
    pub fn with_dongle() -> Self {
        let bus = Self::new();
        bus.attach();
        bus
    }

    fn path(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    pub fn attach(&self) {
        let mut state = self.state.borrow_mut();
        state.present = true;
        state.interfaces = vec![
            InterfaceInfo {
                path: Self::path(COMMAND_PATH),
                usage_page: 0xFF60,
                usage: 0x61,
                interface_number: 1,
                product: Some("Mock Dongle".into()),
            },
            InterfaceInfo {
                path: Self::path(EVENT_PATH),
                usage_page: 0xFFFF,
                usage: 0x01,
                interface_number: 2,
                product: Some("Mock Dongle".into()),
            },
        ];
    }

    pub fn detach(&self) {
        let mut state = self.state.borrow_mut();
        state.present = false;
        state.interfaces.clear();
        state.pending_acks.clear();
    }

    /// Queue read results for an interface
    pub fn script(&self, path: &str, steps: impl IntoIterator<Item = ReadStep>) {
        self.state
            .borrow_mut()
            .scripts
            .entry(Self::path(path))
            .or_default()
            .extend(steps);
    }

    pub fn answer_pings(&self, path: &str, answer: bool) {
        let mut state = self.state.borrow_mut();
        if answer {
            state.answer_pings.insert(Self::path(path));
        } else {
            state.answer_pings.remove(&Self::path(path));
        }
    }

    pub fn fail_open(&self, path: &str, fail: bool) {
        let mut state = self.state.borrow_mut();
        if fail {
            state.fail_open.insert(Self::path(path));
        } else {
            state.fail_open.remove(&Self::path(path));
        }
    }

    /// Make enumeration fail until switched off again
    pub fn fail_enumerate(&self, fail: bool) {
        self.state.borrow_mut().fail_enumerate = fail;
    }

    /// Fail the next `count` writes to `path` with a transient error
    pub fn fail_writes(&self, path: &str, count: usize) {
        self.state
            .borrow_mut()
            .failing_writes
            .insert(Self::path(path), count);
    }

    /// Reads attempted on `path`, failed ones included
    pub fn reads_from(&self, path: &str) -> usize {
        self.state
            .borrow()
            .reads
            .get(&Self::path(path))
            .copied()
            .unwrap_or(0)
    }

    /// Reports written to `path`, in order
    pub fn writes_to(&self, path: &str) -> Vec<Vec<u8>> {
        let path = Self::path(path);
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(p, _)| *p == path)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn enumerations(&self) -> usize {
        self.state.borrow().enumerations
    }

    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }

    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        let state = self.state.borrow();
        state.opened - state.closed
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport { bus: self.clone() }
    }
}

pub struct MockTransport {
    bus: MockBus,
}

impl HidTransport for MockTransport {
    type Handle = MockHandle;

    fn enumerate(&mut self, _identity: DeviceIdentity) -> Result<Vec<InterfaceInfo>, TransportError> {
        let mut state = self.bus.state.borrow_mut();
        state.enumerations += 1;
        if state.fail_enumerate {
            return Err(TransportError::Enumerate("mock enumeration failure".into()));
        }
        Ok(state.interfaces.clone())
    }

    fn open(&mut self, path: &CStr) -> Result<Self::Handle, TransportError> {
        let mut state = self.bus.state.borrow_mut();
        if !state.present || state.fail_open.contains(path) {
            return Err(TransportError::Open {
                path: path.to_string_lossy().into_owned(),
                reason: "mock open failure".into(),
            });
        }
        state.opened += 1;
        Ok(MockHandle {
            path: path.to_owned(),
            bus: self.bus.clone(),
            open: true,
        })
    }
}

pub struct MockHandle {
    path: CString,
    bus: MockBus,
    open: bool,
}

impl HidHandle for MockHandle {
    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let mut state = self.bus.state.borrow_mut();
        *state.reads.entry(self.path.clone()).or_default() += 1;

        let step = state
            .scripts
            .get_mut(&self.path)
            .and_then(VecDeque::pop_front);

        let frame = match step {
            Some(ReadStep::Frame(frame)) => frame,
            Some(ReadStep::Timeout) => return Ok(0),
            Some(ReadStep::Removed) => return Err(TransportError::Removed("mock removal".into())),
            Some(ReadStep::Transient) => {
                return Err(TransportError::Transient("mock glitch".into()))
            }
            None => match state.pending_acks.get_mut(&self.path) {
                Some(pending) if *pending > 0 => {
                    *pending -= 1;
                    ping_ack_frame()
                }
                _ => return Ok(0),
            },
        };

        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let mut state = self.bus.state.borrow_mut();
        if !state.present {
            return Err(TransportError::Removed("mock removal".into()));
        }
        if let Some(remaining) = state.failing_writes.get_mut(&self.path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Transient("mock write failure".into()));
            }
        }
        state.writes.push((self.path.clone(), data.to_vec()));

        let is_ping = data.get(1..) == Some(&CommandFrame::ping().as_bytes()[..]);
        if is_ping && state.answer_pings.contains(&self.path) {
            *state.pending_acks.entry(self.path.clone()).or_default() += 1;
        }
        Ok(data.len())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.bus.state.borrow_mut().closed += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
