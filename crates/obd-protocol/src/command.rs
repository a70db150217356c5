//! Adapter Commands and ECU Identifiers

use crate::error::ObdError;
use std::fmt;
use std::str::FromStr;

/// Header id of an ECU on the bus (`7E4`, `17FC007B`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EcuId(String);

impl EcuId {
    /// Create an id from hex text, normalized to upper case
    pub fn new(id: &str) -> Result<Self, ObdError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ObdError::InvalidCommand(format!("ATSH{id}")));
        }
        Ok(Self(id.to_ascii_uppercase()))
    }

    /// The bare header id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a header id
    pub fn is(&self, id: &str) -> bool {
        self.0.eq_ignore_ascii_case(id)
    }
}

impl fmt::Display for EcuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single queue command, classified once when the queue is built
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// `ATSH<id>`: switch the header (addressed ECU)
    Header(EcuId),
    /// Any other adapter configuration command
    At(String),
    /// UDS / OBD request (service byte + identifier), e.g. `220101`
    Request(String),
}

impl Command {
    /// Text sent to the adapter, without terminator
    pub fn wire_text(&self) -> String {
        match self {
            Command::Header(ecu) => format!("ATSH{ecu}"),
            Command::At(text) | Command::Request(text) => text.clone(),
        }
    }

    /// Bytes sent to the adapter: optional raw prefix, text, `\r`
    pub fn wire_bytes(&self, prefix: Option<u8>) -> Vec<u8> {
        let text = self.wire_text();
        let mut bytes = Vec::with_capacity(text.len() + 2);
        bytes.extend(prefix);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\r');
        bytes
    }

    /// ECU selected by this command, if it is a header switch
    pub fn header(&self) -> Option<&EcuId> {
        match self {
            Command::Header(ecu) => Some(ecu),
            _ => None,
        }
    }

    /// `ATZ`, `ATWS` and `ATD` drop the header and extended address
    pub fn resets_adapter(&self) -> bool {
        matches!(self, Command::At(text) if matches!(text.as_str(), "ATZ" | "ATWS" | "ATD"))
    }

    /// `ATCEA<xx>` sets the CAN extended address, bare `ATCEA` clears it.
    ///
    /// Returns `None` for every other command.
    pub fn extended_address(&self) -> Option<Option<u8>> {
        let Command::At(text) = self else {
            return None;
        };
        let arg = text.strip_prefix("ATCEA")?;
        if arg.is_empty() {
            return Some(None);
        }
        u8::from_str_radix(arg, 16).ok().map(Some)
    }

    /// Request text if this is a UDS/OBD request
    pub fn request(&self) -> Option<&str> {
        match self {
            Command::Request(text) => Some(text),
            _ => None,
        }
    }

    /// UDS service byte of a request (`0x22` for `220101`)
    pub fn service(&self) -> Option<u8> {
        let text = self.request()?;
        u8::from_str_radix(text.get(0..2)?, 16).ok()
    }
}

impl FromStr for Command {
    type Err = ObdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if compact.is_empty() {
            return Err(ObdError::InvalidCommand(s.to_string()));
        }

        if let Some(rest) = compact.strip_prefix("AT") {
            if let Some(id) = rest.strip_prefix("SH") {
                return EcuId::new(id)
                    .map(Command::Header)
                    .map_err(|_| ObdError::InvalidCommand(s.to_string()));
            }
            return Ok(Command::At(compact));
        }

        if compact.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Command::Request(compact))
        } else {
            Err(ObdError::InvalidCommand(s.to_string()))
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_text())
    }
}
