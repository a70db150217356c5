//! Transport Contract
//!
//! Outbound bytes go through [`Transport::send`]. Inbound data never
//! touches protocol state directly: the receive path (serial reader task,
//! BLE notification callback, ...) only splits bytes into lines and pushes
//! them onto an SPSC channel drained by the scheduler tick.

use crate::error::ObdError;
use tokio::sync::mpsc;

/// Longest line kept before it is force-flushed
const MAX_LINE_BYTES: usize = 512;

/// Outbound half of an adapter link
pub trait Transport {
    /// Queue `bytes` for transmission without blocking
    fn send(&mut self, bytes: &[u8]) -> Result<(), ObdError>;
}

/// Event produced by the receive path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// One received line, terminator stripped
    Line(Vec<u8>),
    /// The link went away; an external reconnect is required
    Disconnected,
}

pub type InboundSender = mpsc::UnboundedSender<InboundEvent>;
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundEvent>;

/// Create the single-producer/single-consumer inbound channel
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

/// Splits a raw byte stream into lines on CR, LF or NUL.
///
/// The `>` prompt is emitted as a line of its own, since adapters send it
/// without a trailing terminator.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes, returning every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\r' | b'\n' | 0 => self.flush_into(&mut lines),
                b'>' => {
                    self.flush_into(&mut lines);
                    lines.push(vec![b'>']);
                }
                _ => {
                    self.buf.push(byte);
                    if self.buf.len() >= MAX_LINE_BYTES {
                        self.flush_into(&mut lines);
                    }
                }
            }
        }
        lines
    }

    /// Feed bytes and forward completed lines. Returns `false` once the
    /// receiving side has gone away.
    pub fn forward(&mut self, bytes: &[u8], tx: &InboundSender) -> bool {
        self.push(bytes)
            .into_iter()
            .all(|line| tx.send(InboundEvent::Line(line)).is_ok())
    }

    fn flush_into(&mut self, lines: &mut Vec<Vec<u8>>) {
        if !self.buf.is_empty() {
            lines.push(std::mem::take(&mut self.buf));
        }
    }
}
