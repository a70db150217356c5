//! ECU Context Tracking

use crate::command::{Command, EcuId};
use crate::payload::Payload;

/// Which ECU is addressed and which command is in flight
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcuContext {
    /// Header selected by the last `ATSH`
    pub current_ecu: Option<EcuId>,
    /// CAN extended address selected by the last `ATCEA`
    pub extended_address: Option<u8>,
    /// Command most recently sent
    pub current_command: Option<Command>,
}

impl EcuContext {
    /// Create an empty context (no header selected yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a command being sent
    pub fn on_send(&mut self, command: &Command) {
        if command.resets_adapter() {
            self.current_ecu = None;
            self.extended_address = None;
        }
        if let Some(ecu) = command.header() {
            self.current_ecu = Some(ecu.clone());
        }
        if let Some(address) = command.extended_address() {
            self.extended_address = address;
        }
        self.current_command = Some(command.clone());
    }

    /// Pair a merged payload with the current context
    pub fn response(&self, payload: Payload) -> Response {
        Response {
            ecu: self.current_ecu.clone(),
            extended_address: self.extended_address,
            command: self.current_command.clone(),
            payload,
        }
    }
}

/// One complete response, consistent with the request that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub ecu: Option<EcuId>,
    pub extended_address: Option<u8>,
    pub command: Option<Command>,
    pub payload: Payload,
}

impl Response {
    /// Request text of the command this answers, if it was a request
    pub fn request(&self) -> Option<&str> {
        self.command.as_ref().and_then(Command::request)
    }

    /// Whether this answers `request` sent to header `ecu`
    pub fn answers(&self, ecu: &str, request: &str) -> bool {
        self.ecu.as_ref().is_some_and(|e| e.is(ecu))
            && self
                .request()
                .is_some_and(|r| r.eq_ignore_ascii_case(request))
    }
}
