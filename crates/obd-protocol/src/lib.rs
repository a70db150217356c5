//! OBD-II Protocol Implementation
//!
//! Wire-level building blocks for polling a vehicle through an
//! ELM327-compatible adapter: command classification, the command queue,
//! ECU context tracking, response reassembly and payload field extraction.

mod client;
mod command;
mod ecu;
mod error;
mod frame;
mod payload;
mod protocol;
mod queue;
mod simulator;
mod transport;

pub use client::ObdClient;
pub use command::{Command, EcuId};
pub use ecu::{EcuContext, Response};
pub use error::{FieldError, ObdError};
pub use frame::{AdapterStatus, FrameReassembler, LineOutcome};
pub use payload::{NegativeResponse, Payload};
pub use protocol::ObdProtocol;
pub use queue::{CommandQueue, QueueEntry, QueueStep};
pub use simulator::{frame_lines, SimulatedAdapter};
pub use transport::{
    inbound_channel, InboundEvent, InboundReceiver, InboundSender, LineSplitter, Transport,
};

/// UDS service identifiers
pub mod service {
    /// Read data by local identifier (KWP2000 style, `21xx`)
    pub const READ_DATA_BY_LOCAL_ID: u8 = 0x21;
    /// Read data by identifier (`22xxxx`)
    pub const READ_DATA_BY_ID: u8 = 0x22;
    /// Negative response marker
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
    /// Offset added to a service id in its positive response
    pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;
}
