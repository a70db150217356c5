//! Simulated ELM327 Adapter
//!
//! Answers requests from a fixed response table so the whole pipeline can
//! run without hardware. Long payloads are split into ELM-style indexed
//! frames, the same way a real adapter prints ISO-TP multi-frame answers.

use crate::command::Command;
use crate::transport::{InboundEvent, InboundSender};
use std::collections::HashMap;
use tracing::debug;

/// Nibbles carried by the first frame of a multi-frame answer
const FIRST_FRAME_NIBBLES: usize = 12;
/// Nibbles carried by each consecutive frame
const NEXT_FRAME_NIBBLES: usize = 14;

/// In-process adapter answering from a response table
#[derive(Debug)]
pub struct SimulatedAdapter {
    responses: HashMap<(String, String), String>,
    header: Option<String>,
    tx: InboundSender,
    responding: bool,
    sent: Vec<String>,
}

impl SimulatedAdapter {
    /// `responses` holds `(header, request, payload)` triples
    pub fn new<I, H, R, P>(tx: InboundSender, responses: I) -> Self
    where
        I: IntoIterator<Item = (H, R, P)>,
        H: AsRef<str>,
        R: AsRef<str>,
        P: AsRef<str>,
    {
        let responses = responses
            .into_iter()
            .map(|(header, request, payload)| {
                (
                    (
                        header.as_ref().to_ascii_uppercase(),
                        request.as_ref().to_ascii_uppercase(),
                    ),
                    payload.as_ref().to_ascii_uppercase(),
                )
            })
            .collect();
        Self {
            responses,
            header: None,
            tx,
            responding: true,
            sent: Vec::new(),
        }
    }

    /// Stop answering (to exercise timeouts)
    pub fn set_responding(&mut self, responding: bool) {
        self.responding = responding;
    }

    /// Replace or add the answer to one request
    pub fn set_response(&mut self, header: &str, request: &str, payload: &str) {
        self.responses.insert(
            (header.to_ascii_uppercase(), request.to_ascii_uppercase()),
            payload.to_ascii_uppercase(),
        );
    }

    /// Commands received so far, as text
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Report a dropped link on the inbound channel
    pub fn disconnect(&self) {
        let _ = self.tx.send(InboundEvent::Disconnected);
    }

    /// Handle one command written by the host
    pub fn handle(&mut self, bytes: &[u8]) {
        let text: String = String::from_utf8_lossy(bytes)
            .chars()
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();
        self.sent.push(text.clone());

        if !self.responding {
            debug!("Simulated adapter muted, ignoring {}", text);
            return;
        }

        let lines = match text.parse::<Command>() {
            Ok(Command::Header(ecu)) => {
                self.header = Some(ecu.as_str().to_string());
                vec!["OK".to_string()]
            }
            Ok(command @ Command::At(_)) if command.resets_adapter() => {
                self.header = None;
                if command.wire_text() == "ATD" {
                    vec!["OK".to_string()]
                } else {
                    vec!["ELM327 v1.5".to_string()]
                }
            }
            Ok(Command::At(at)) if at == "ATI" => vec!["ELM327 v1.5".to_string()],
            Ok(Command::At(_)) => vec!["OK".to_string()],
            Ok(Command::Request(request)) => {
                let key = (self.header.clone().unwrap_or_default(), request);
                match self.responses.get(&key) {
                    Some(payload) => frame_lines(payload),
                    None => vec!["NO DATA".to_string()],
                }
            }
            Err(_) => vec!["?".to_string()],
        };

        for line in lines {
            let _ = self.tx.send(InboundEvent::Line(line.into_bytes()));
        }
        let _ = self.tx.send(InboundEvent::Line(b">".to_vec()));
    }
}

/// Print a payload the way an ELM327 does with spaces and headers off
pub fn frame_lines(payload: &str) -> Vec<String> {
    if payload.len() <= NEXT_FRAME_NIBBLES {
        return vec![payload.to_string()];
    }

    let mut lines = vec![format!("{:03X}", payload.len() / 2)];
    let (first, mut rest) = payload.split_at(FIRST_FRAME_NIBBLES);
    lines.push(format!("0:{first}"));

    let mut index = 1usize;
    while !rest.is_empty() {
        let take = rest.len().min(NEXT_FRAME_NIBBLES);
        let (chunk, tail) = rest.split_at(take);
        lines.push(format!("{:X}:{chunk}", index % 16));
        rest = tail;
        index += 1;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::inbound_channel;

    fn drain(rx: &mut crate::transport::InboundReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(InboundEvent::Line(line)) = rx.try_recv() {
            lines.push(String::from_utf8(line).unwrap());
        }
        lines
    }

    #[test]
    fn test_frame_lines_single() {
        assert_eq!(frame_lines("7F2112"), ["7F2112"]);
    }

    #[test]
    fn test_frame_lines_multi() {
        let lines = frame_lines("620101FFF7E7FF8A0000000003000E");
        assert_eq!(lines, ["00F", "0:620101FFF7E7", "1:FF8A0000000003", "2:000E"]);
    }

    #[test]
    fn test_answers_by_header() {
        let (tx, mut rx) = inbound_channel();
        let mut sim = SimulatedAdapter::new(tx, [("7E4", "220105", "620105AA")]);

        sim.handle(b"220105\r");
        assert_eq!(drain(&mut rx), ["NO DATA", ">"]);

        sim.handle(b"ATSH7E4\r");
        assert_eq!(drain(&mut rx), ["OK", ">"]);

        sim.handle(b"220105\r");
        assert_eq!(drain(&mut rx), ["620105AA", ">"]);
        assert_eq!(sim.sent().len(), 3);
    }

    #[test]
    fn test_reset_forgets_header() {
        let (tx, mut rx) = inbound_channel();
        let mut sim = SimulatedAdapter::new(tx, [("7E4", "220105", "620105AA")]);
        sim.handle(b"ATSH7E4\r");
        sim.handle(b"ATZ\r");
        drain(&mut rx);

        sim.handle(b"220105\r");
        assert_eq!(drain(&mut rx), ["NO DATA", ">"]);
    }

    #[test]
    fn test_muted_adapter_is_silent() {
        let (tx, mut rx) = inbound_channel();
        let mut sim = SimulatedAdapter::new(tx, Vec::<(&str, &str, &str)>::new());
        sim.set_responding(false);
        sim.handle(b"ATZ\r");
        assert!(drain(&mut rx).is_empty());
    }
}
