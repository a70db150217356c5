//! Response Frame Reassembly
//!
//! The adapter answers with lines such as:
//!
//! ```text
//! 03E
//! 0:620101FFF7E7
//! 1:FF8A0000000003
//! ...
//! >
//! ```
//!
//! Indexed fragments are merged into one payload, which is released when
//! the `>` prompt arrives.

use crate::payload::Payload;
use tracing::{debug, warn};

/// Non-data line reported by the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterStatus {
    Ok,
    NoData,
    /// `?`: command not understood
    Unknown,
    CanError,
    BufferFull,
    Stopped,
    Searching,
    UnableToConnect,
    Other(String),
}

impl AdapterStatus {
    fn classify(text: &str) -> Self {
        match text {
            "OK" => AdapterStatus::Ok,
            "NODATA" => AdapterStatus::NoData,
            "?" => AdapterStatus::Unknown,
            "CANERROR" => AdapterStatus::CanError,
            "BUFFERFULL" => AdapterStatus::BufferFull,
            "STOPPED" => AdapterStatus::Stopped,
            "UNABLETOCONNECT" => AdapterStatus::UnableToConnect,
            _ if text.starts_with("SEARCHING") => AdapterStatus::Searching,
            _ => AdapterStatus::Other(text.to_string()),
        }
    }

    /// Statuses that mean the request produced no data
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            AdapterStatus::NoData
                | AdapterStatus::Unknown
                | AdapterStatus::CanError
                | AdapterStatus::BufferFull
                | AdapterStatus::Stopped
                | AdapterStatus::UnableToConnect
        )
    }
}

/// What a single line did to the reassembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Line consumed, response not finished yet
    Pending,
    /// Prompt received with data: one complete response
    Complete(Payload),
    /// Prompt received without data (AT command acknowledged, NO DATA, ...)
    Ready,
    /// Adapter status line
    Status(AdapterStatus),
    /// Blank line, command echo or noise
    Ignored,
}

/// Merges fragmented response lines into one payload per command
#[derive(Debug, Default)]
pub struct FrameReassembler {
    accumulator: String,
    announced_bytes: Option<usize>,
    indexed: bool,
    echo: Option<String>,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore a bare line equal to `command` (adapter echo)
    pub fn set_echo_filter(&mut self, command: Option<String>) {
        self.echo = command.map(|c| c.to_ascii_uppercase());
    }

    /// Feed one line (terminator already stripped)
    pub fn push_line(&mut self, line: &[u8]) -> LineOutcome {
        let text: String = String::from_utf8_lossy(line)
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\0')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if text.is_empty() {
            return LineOutcome::Ignored;
        }
        if text == ">" {
            return self.finish();
        }

        if let Some((index, fragment)) = text.split_once(':') {
            let valid_index =
                (1..=2).contains(&index.len()) && index.chars().all(|c| c.is_ascii_hexdigit());
            if valid_index && fragment.chars().all(|c| c.is_ascii_hexdigit()) {
                self.accumulator.push_str(fragment);
                self.indexed = true;
                return LineOutcome::Pending;
            }
            return LineOutcome::Status(AdapterStatus::Other(text));
        }

        if !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return LineOutcome::Status(AdapterStatus::classify(&text));
        }

        if self.echo.as_deref() == Some(text.as_str()) {
            debug!("Dropping echo of {}", text);
            return LineOutcome::Ignored;
        }

        if text.len() == 3 && self.accumulator.is_empty() && !self.indexed {
            self.announced_bytes = usize::from_str_radix(&text, 16).ok();
            return LineOutcome::Pending;
        }

        if text.len() % 2 == 0 {
            self.accumulator.push_str(&text);
            return LineOutcome::Pending;
        }

        debug!("Ignoring odd-length hex line {}", text);
        LineOutcome::Ignored
    }

    /// Discard any partial response
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.announced_bytes = None;
        self.indexed = false;
    }

    /// Whether a partial response is buffered
    pub fn is_merging(&self) -> bool {
        !self.accumulator.is_empty()
    }

    fn finish(&mut self) -> LineOutcome {
        if self.accumulator.is_empty() {
            self.reset();
            return LineOutcome::Ready;
        }

        if let Some(bytes) = self.announced_bytes {
            if self.accumulator.len() < bytes * 2 {
                warn!(
                    "Truncated response: {} of {} announced bytes",
                    self.accumulator.len() / 2,
                    bytes
                );
            }
        }

        let payload = Payload::new(&self.accumulator);
        self.reset();
        LineOutcome::Complete(payload)
    }
}
