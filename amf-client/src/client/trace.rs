//! Dumps of the packets exchanged by a session
use crate::packet::Packet;
use std::cell::RefCell;
use std::fmt::{self, Write};
use std::rc::Rc;

/// Which way a packet travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent to the broker
    Request,

    /// Received from the broker
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => f.write_str("request"),
            Direction::Response => f.write_str("response"),
        }
    }
}

/// Receives a record of every packet exchanged
pub trait TraceSink {
    /// Called once per packet, the record describes the decoded packet and its bytes
    fn on_exchange(&self, direction: Direction, record: &str);
}

/// A [`TraceSink`] collecting every record in memory
///
/// Clones share the same buffer, keep one to read what a session traced.
#[derive(Debug, Clone, Default)]
pub struct AmfTrace {
    buffer: Rc<RefCell<String>>,
}

impl AmfTrace {
    /// An empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything traced so far
    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }

    /// Has nothing been traced
    pub fn is_empty(&self) -> bool {
        self.buffer.borrow().is_empty()
    }

    /// Forget everything traced so far
    pub fn clear(&self) {
        self.buffer.borrow_mut().clear();
    }
}

impl TraceSink for AmfTrace {
    fn on_exchange(&self, direction: Direction, record: &str) {
        let mut buffer = self.buffer.borrow_mut();
        let _ = writeln!(buffer, "---- {direction} ----");
        buffer.push_str(record);
        if !record.ends_with('\n') {
            buffer.push('\n');
        }
    }
}

/// Describe a packet, followed by a hex dump of its bytes when given
pub fn describe_packet(packet: Option<&Packet>, bytes: &[u8]) -> String {
    let mut out = String::new();
    if let Some(packet) = packet {
        let _ = writeln!(out, "AMF packet, version {}", packet.version);
        for header in &packet.headers {
            let _ = writeln!(
                out,
                "  header {:?} (must understand: {}): {:?}",
                header.name, header.must_understand, header.value
            );
        }
        for message in &packet.messages {
            let _ = writeln!(
                out,
                "  message {:?} -> {:?}: {:?}",
                message.target_uri, message.response_uri, message.contents
            );
        }
    }
    out.push_str(&hex_dump(bytes));
    out
}

/// Sixteen bytes per line, prefixed by their offset
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:08x} ", line * 16);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        out.push('\n');
    }
    out
}
