//! Wire protocol for the dongle's vendor HID interfaces
//!
//! Outbound commands are 32-byte payloads written behind a report id of `0x00`.
//! Inbound frames are read into 64-byte buffers and classified by their first
//! two header bytes:
//! - `05 A6 .. ss` - link status event, `ss` at offset 3
//! - `20 01`       - ping acknowledgment

/// Command payload size in bytes (without report id)
pub const COMMAND_SIZE: usize = 32;

/// Size of a command on the wire (report id + payload)
pub const REPORT_SIZE: usize = COMMAND_SIZE + 1;

/// Size of the buffer used for inbound frames
pub const FRAME_SIZE: usize = 64;

/// HID report id prefixed to every outbound command
pub const REPORT_ID: u8 = 0x00;

/// Shortest frame that can carry a header and a status payload
pub const MIN_FRAME_LEN: usize = 4;

const STATUS_HEADER: [u8; 2] = [0x05, 0xA6];
const STATUS_OFFSET: usize = 3;
const PING_ACK_HEADER: [u8; 2] = [0x20, 0x01];

/// Semantic category of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Link status event with its raw payload byte
    Status(u8),
    /// Reply to a PING command
    PingAck,
    /// Anything else, including frames too short to classify
    Unrecognized,
}

/// Classify a raw inbound frame.
pub fn classify(frame: &[u8]) -> FrameKind {
    if frame.len() < MIN_FRAME_LEN {
        return FrameKind::Unrecognized;
    }

    let header = [frame[0], frame[1]];
    if header == STATUS_HEADER {
        FrameKind::Status(frame[STATUS_OFFSET])
    } else if header == PING_ACK_HEADER {
        FrameKind::PingAck
    } else {
        FrameKind::Unrecognized
    }
}

/// Link status carried by a status frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkStatus {
    /// Keyboard paired with the dongle
    Up = 0x01,
    /// Keyboard lost its radio link
    Down = 0x02,
}

impl LinkStatus {
    /// Parse status from a payload byte; unmapped payloads yield `None`
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(LinkStatus::Up),
            0x02 => Some(LinkStatus::Down),
            _ => None,
        }
    }
}

/// A 32-byte command sent on the command interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    data: [u8; COMMAND_SIZE],
}

impl CommandFrame {
    /// Wake-up command sent once after opening the interfaces
    pub fn init() -> Self {
        let mut data = [0u8; COMMAND_SIZE];
        data[0] = 0x02;
        data[COMMAND_SIZE - 1] = 0x02;
        Self { data }
    }

    /// Liveness probe; a paired keyboard answers with a ping acknowledgment
    pub fn ping() -> Self {
        let mut data = [0u8; COMMAND_SIZE];
        data[0] = 0x20;
        data[1] = 0x01;
        data[COMMAND_SIZE - 1] = 0x21;
        Self { data }
    }

    /// Raw payload without report id
    pub fn as_bytes(&self) -> &[u8; COMMAND_SIZE] {
        &self.data
    }

    /// Bytes as written to the device, prefixed with the report id
    pub fn to_report(&self) -> [u8; REPORT_SIZE] {
        let mut report = [0u8; REPORT_SIZE];
        report[0] = REPORT_ID;
        report[1..].copy_from_slice(&self.data);
        report
    }
}
