//! Merged Response Payloads and Field Extraction
//!
//! Positions are counted in nibbles (hex digits) from the start of the
//! merged payload, including the positive-response service byte.

use crate::error::FieldError;
use std::fmt;

/// Merged hex payload of one response
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(String);

impl Payload {
    /// Create a payload, dropping whitespace and separators and
    /// normalizing to upper case
    pub fn new(text: &str) -> Self {
        Self(
            text.chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        )
    }

    /// Length in nibbles
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits `start..end`, failing when the range does not fit
    pub fn nibbles(&self, start: usize, end: usize) -> Result<&str, FieldError> {
        if start >= end || end > self.0.len() {
            return Err(FieldError::OutOfRange {
                start,
                end,
                len: self.0.len(),
            });
        }
        Ok(&self.0[start..end])
    }

    /// Whether digits `start..end` equal `expected` (case-insensitive)
    pub fn nibbles_eq(&self, start: usize, end: usize, expected: &str) -> bool {
        self.nibbles(start, end)
            .is_ok_and(|n| n.eq_ignore_ascii_case(expected))
    }

    /// Whether the payload begins with `prefix` (case-insensitive)
    pub fn starts_with_nibbles(&self, prefix: &str) -> bool {
        self.nibbles_eq(0, prefix.len(), prefix)
    }

    /// Read a number from digits `start..end`.
    ///
    /// With `signed`, the value is reinterpreted as two's complement over
    /// `byte_width` bytes.
    pub fn extract_field(
        &self,
        start: usize,
        end: usize,
        byte_width: usize,
        signed: bool,
    ) -> Result<f64, FieldError> {
        let digits = self.nibbles(start, end)?;
        if digits.len() > 16 {
            return Err(FieldError::TooWide(digits.len() / 2));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FieldError::InvalidHex(digits.to_string()));
        }
        let raw = u64::from_str_radix(digits, 16)
            .map_err(|_| FieldError::InvalidHex(digits.to_string()))?;

        if !signed {
            return Ok(raw as f64);
        }
        if byte_width == 0 || byte_width > 8 {
            return Err(FieldError::TooWide(byte_width));
        }

        let bits = 8 * byte_width as u32;
        let max_positive = (1u128 << (bits - 1)) - 1;
        let raw = u128::from(raw);
        if raw > max_positive {
            Ok(raw as f64 - (1u128 << bits) as f64)
        } else {
            Ok(raw as f64)
        }
    }

    /// Read one bit (0 = least significant) of the byte at `start..start+2`
    pub fn bit(&self, start: usize, bit: u8) -> Result<bool, FieldError> {
        let byte = self.extract_field(start, start + 2, 1, false)? as u8;
        Ok(byte & (1 << bit) != 0)
    }

    /// Negative UDS response (`7F <service> <code>`), if this is one
    pub fn negative_response(&self) -> Option<NegativeResponse> {
        if !self.0.starts_with("7F") {
            return None;
        }
        let byte_at = |start: usize| {
            self.nibbles(start, start + 2)
                .ok()
                .and_then(|d| u8::from_str_radix(d, 16).ok())
        };
        Some(NegativeResponse {
            service: byte_at(2),
            code: byte_at(4),
        })
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejected request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegativeResponse {
    /// Echoed service byte
    pub service: Option<u8>,
    /// Negative response code
    pub code: Option<u8>,
}

impl NegativeResponse {
    /// Human readable name of the response code
    pub fn code_name(&self) -> &'static str {
        match self.code {
            Some(0x10) => "general reject",
            Some(0x11) => "service not supported",
            Some(0x12) => "sub-function not supported",
            Some(0x13) => "incorrect message length",
            Some(0x22) => "conditions not correct",
            Some(0x31) => "request out of range",
            Some(0x33) => "security access denied",
            Some(0x78) => "response pending",
            Some(_) => "unknown",
            None => "truncated",
        }
    }
}

impl fmt::Display for NegativeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.service, self.code) {
            (Some(service), Some(code)) => {
                write!(f, "7F {service:02X} {code:02X} ({})", self.code_name())
            }
            _ => write!(f, "7F ({})", self.code_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unsigned_extract() {
        let payload = Payload::new("62C00BFFFF0000B93D0100");
        assert_eq!(payload.extract_field(14, 16, 2, false), Ok(185.0));
        assert_eq!(payload.extract_field(14, 18, 2, false), Ok(47421.0));
    }

    #[test]
    fn test_signed_extract() {
        let payload = Payload::new("FF7F80FFFE");
        assert_eq!(payload.extract_field(0, 2, 1, true), Ok(-1.0));
        assert_eq!(payload.extract_field(2, 4, 1, true), Ok(127.0));
        assert_eq!(payload.extract_field(4, 6, 1, true), Ok(-128.0));
        assert_eq!(payload.extract_field(6, 10, 2, true), Ok(-2.0));
        // Same digits read unsigned
        assert_eq!(payload.extract_field(6, 10, 2, false), Ok(65534.0));
    }

    #[test]
    fn test_short_payload_fails_closed() {
        let payload = Payload::new("6201");
        assert_eq!(
            payload.extract_field(4, 8, 2, false),
            Err(FieldError::OutOfRange {
                start: 4,
                end: 8,
                len: 4
            })
        );
        assert!(payload.extract_field(2, 2, 1, false).is_err());
    }

    #[test]
    fn test_invalid_hex() {
        let payload = Payload::new("62ZZ");
        assert!(matches!(
            payload.extract_field(2, 4, 1, false),
            Err(FieldError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_new_normalizes() {
        let payload = Payload::new("62 c0 0b\r");
        assert_eq!(payload.as_str(), "62C00B");
        assert!(payload.starts_with_nibbles("62c0"));
        assert!(!payload.starts_with_nibbles("62C00B01"));
    }

    #[test]
    fn test_bit() {
        let payload = Payload::new("6220");
        assert_eq!(payload.bit(2, 5), Ok(true));
        assert_eq!(payload.bit(2, 4), Ok(false));
        assert!(payload.bit(4, 0).is_err());
    }

    #[test]
    fn test_negative_response() {
        let nr = Payload::new("7F2112").negative_response().unwrap();
        assert_eq!(nr.service, Some(0x21));
        assert_eq!(nr.code, Some(0x12));
        assert_eq!(nr.code_name(), "sub-function not supported");

        let truncated = Payload::new("7F").negative_response().unwrap();
        assert_eq!(truncated.service, None);

        assert!(Payload::new("620101").negative_response().is_none());
    }

    proptest! {
        #[test]
        fn prop_extract_never_panics(
            text in "[0-9A-Fa-fG-Z]{0,40}",
            start in 0usize..48,
            len in 0usize..20,
            width in 0usize..10,
            signed in any::<bool>(),
        ) {
            let payload = Payload::new(&text);
            let end = start + len;
            let result = payload.extract_field(start, end, width, signed);
            if end > payload.len() || len == 0 {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn prop_signed_byte_in_range(byte in any::<u8>()) {
            let payload = Payload::new(&format!("{byte:02X}"));
            let value = payload.extract_field(0, 2, 1, true).unwrap();
            prop_assert_eq!(value, f64::from(byte as i8));
        }
    }
}
