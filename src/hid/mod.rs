//! HID module - dual-interface link monitoring for the wireless dongle

mod error;
pub mod handshake;
mod monitor;
pub mod protocol;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{FaultKind, TransportError};
pub use handshake::HandshakeOutcome;
pub use monitor::{ConnectionMonitor, MonitorPhase, StopHandle};
pub use protocol::{classify, CommandFrame, FrameKind, LinkStatus};
pub use transport::{
    DeviceIdentity, Discovery, HidHandle, HidTransport, HidapiHandle, HidapiTransport,
    InterfaceInfo, InterfacePair, InterfacePaths,
};
