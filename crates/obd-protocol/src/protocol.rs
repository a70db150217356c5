//! ELM327 Protocol Selection

use crate::command::Command;
use serde::{Deserialize, Serialize};

/// Bus protocols selectable with `ATSP<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObdProtocol {
    /// Automatic protocol detection
    #[default]
    Auto,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765Can29bit250,
}

impl ObdProtocol {
    /// Protocol number used by `ATSP`
    pub fn number(&self) -> u8 {
        match self {
            ObdProtocol::Auto => 0,
            ObdProtocol::Iso15765Can11bit500 => 6,
            ObdProtocol::Iso15765Can29bit500 => 7,
            ObdProtocol::Iso15765Can11bit250 => 8,
            ObdProtocol::Iso15765Can29bit250 => 9,
        }
    }

    /// The `ATSP<n>` command selecting this protocol
    pub fn to_command(&self) -> Command {
        Command::At(format!("ATSP{}", self.number()))
    }

    /// Check if this is a CAN protocol
    pub fn is_can(&self) -> bool {
        !matches!(self, ObdProtocol::Auto)
    }

    /// Whether ECU headers are 29 bit (eight hex digits)
    pub fn is_extended_id(&self) -> bool {
        matches!(
            self,
            ObdProtocol::Iso15765Can29bit500 | ObdProtocol::Iso15765Can29bit250
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_command() {
        assert_eq!(
            ObdProtocol::Iso15765Can11bit500.to_command(),
            Command::At("ATSP6".to_string())
        );
        assert_eq!(ObdProtocol::Auto.to_command().wire_text(), "ATSP0");
    }

    #[test]
    fn test_extended_id() {
        assert!(ObdProtocol::Iso15765Can29bit500.is_extended_id());
        assert!(!ObdProtocol::Iso15765Can11bit500.is_extended_id());
        assert!(!ObdProtocol::Auto.is_can());
    }
}
