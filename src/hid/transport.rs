//! HID transport abstraction and the hidapi backend
//!
//! The monitor only talks to [`HidTransport`] and [`HidHandle`], so the state
//! machine can be driven by a scripted transport in tests.

use super::error::TransportError;
use hidapi::{HidApi, HidDevice, HidError};
use std::ffi::{CStr, CString};
use std::time::Duration;
use tracing::{debug, info};

/// USB identity of the dongle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// One enumerated HID interface of the dongle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Platform path used to open the interface
    pub path: CString,
    /// HID usage page (capability descriptor)
    pub usage_page: u16,
    pub usage: u16,
    pub interface_number: i32,
    pub product: Option<String>,
}

impl InterfaceInfo {
    /// Path rendered for logs
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Paths of the two interfaces needed for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfacePaths {
    pub command: CString,
    pub event: CString,
}

/// Result of partitioning an enumeration by usage page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(InterfacePaths),
    Missing { command: bool, event: bool },
}

impl Discovery {
    /// Pick the command and event interfaces out of an enumeration.
    ///
    /// If a page appears more than once the last interface wins.
    pub fn from_interfaces(
        interfaces: &[InterfaceInfo],
        command_page: u16,
        event_page: u16,
    ) -> Self {
        let mut command = None;
        let mut event = None;

        for iface in interfaces {
            if iface.usage_page == command_page {
                command = Some(iface.path.clone());
            } else if iface.usage_page == event_page {
                event = Some(iface.path.clone());
            }
        }

        match (command, event) {
            (Some(command), Some(event)) => Discovery::Found(InterfacePaths { command, event }),
            (command, event) => Discovery::Missing {
                command: command.is_none(),
                event: event.is_none(),
            },
        }
    }
}

/// An open HID interface
pub trait HidHandle {
    /// Blocking read bounded by `timeout`; `Ok(0)` means nothing arrived.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Write one report, report id included
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Release the interface. Closing twice is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Host HID stack: enumeration and opening by path
pub trait HidTransport {
    type Handle: HidHandle;

    fn enumerate(&mut self, identity: DeviceIdentity) -> Result<Vec<InterfaceInfo>, TransportError>;

    fn open(&mut self, path: &CStr) -> Result<Self::Handle, TransportError>;
}

/// Command and event handles of one connection session
pub struct InterfacePair<H: HidHandle> {
    pub command: H,
    pub event: H,
}

impl<H: HidHandle> InterfacePair<H> {
    pub fn new(command: H, event: H) -> Self {
        Self { command, event }
    }

    /// Whether either handle is still open
    pub fn is_open(&self) -> bool {
        self.command.is_open() || self.event.is_open()
    }

    /// Close whichever handles are still open
    pub fn close(&mut self) {
        if self.command.is_open() {
            self.command.close();
        }
        if self.event.is_open() {
            self.event.close();
        }
    }
}

impl<H: HidHandle> Drop for InterfacePair<H> {
    fn drop(&mut self) {
        self.close();
    }
}

/// [`HidTransport`] backed by hidapi
pub struct HidapiTransport {
    api: HidApi,
}

impl HidapiTransport {
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Enumerate(e.to_string()))?;

        // The dongle also exposes its regular keyboard interface; don't grab
        // the whole device on macOS.
        #[cfg(target_os = "macos")]
        {
            api.set_open_exclusive(false);
        }

        Ok(Self { api })
    }
}

impl HidTransport for HidapiTransport {
    type Handle = HidapiHandle;

    fn enumerate(&mut self, identity: DeviceIdentity) -> Result<Vec<InterfaceInfo>, TransportError> {
        self.api
            .refresh_devices()
            .map_err(|e| TransportError::Enumerate(e.to_string()))?;

        let interfaces = self
            .api
            .device_list()
            .filter(|d| d.vendor_id() == identity.vendor_id && d.product_id() == identity.product_id)
            .map(|d| InterfaceInfo {
                path: d.path().to_owned(),
                usage_page: d.usage_page(),
                usage: d.usage(),
                interface_number: d.interface_number(),
                product: d.product_string().map(str::to_owned),
            })
            .collect::<Vec<_>>();

        debug!(
            "Enumerated {} interface(s) for {:04X}:{:04X}",
            interfaces.len(),
            identity.vendor_id,
            identity.product_id
        );
        Ok(interfaces)
    }

    fn open(&mut self, path: &CStr) -> Result<Self::Handle, TransportError> {
        let display_path = path.to_string_lossy().into_owned();
        let open_err = |e: HidError| TransportError::Open {
            path: display_path.clone(),
            reason: e.to_string(),
        };

        let device = self.api.open_path(path).map_err(open_err)?;
        device.set_blocking_mode(true).map_err(open_err)?;

        info!("Opened HID interface {}", display_path);
        Ok(HidapiHandle {
            device: Some(device),
            path: display_path,
        })
    }
}

/// An interface opened through hidapi; dropping the device closes it
pub struct HidapiHandle {
    device: Option<HidDevice>,
    path: String,
}

impl HidapiHandle {
    fn device(&self) -> Result<&HidDevice, TransportError> {
        self.device.as_ref().ok_or(TransportError::Closed)
    }
}

/// hidapi reports a vanished device as a plain API error from read/write
fn map_io_error(err: HidError) -> TransportError {
    match err {
        HidError::HidApiError { message } => TransportError::Removed(message),
        other => TransportError::Transient(other.to_string()),
    }
}

fn timeout_ms(timeout: Duration) -> i32 {
    timeout.as_millis().min(i32::MAX as u128) as i32
}

impl HidHandle for HidapiHandle {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.device()?
            .read_timeout(buf, timeout_ms(timeout))
            .map_err(map_io_error)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let written = self.device()?.write(data).map_err(map_io_error)?;
        debug!("Wrote {} bytes to {}", written, self.path);
        Ok(written)
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            debug!("Closed HID interface {}", self.path);
        }
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }
}
