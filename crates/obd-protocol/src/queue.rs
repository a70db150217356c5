//! Command Queue
//!
//! An ordered list of commands split into a one-time initialization
//! section (`0..loop_from`) and a repeating poll section
//! (`loop_from..len`). The cursor wraps to `loop_from`, never to 0.

use crate::command::Command;
use crate::ecu::EcuContext;
use crate::error::ObdError;
use tracing::debug;

/// A command plus an optional raw byte written before it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub command: Command,
    pub prefix: Option<u8>,
}

impl QueueEntry {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            prefix: None,
        }
    }

    pub fn with_prefix(command: Command, prefix: u8) -> Self {
        Self {
            command,
            prefix: Some(prefix),
        }
    }

    /// Bytes to put on the wire
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.command.wire_bytes(self.prefix)
    }
}

/// Result of [`CommandQueue::next_command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStep {
    pub entry: QueueEntry,
    /// Serving this entry completed a full pass of the queue
    pub cycle_complete: bool,
}

#[derive(Debug, Clone, Copy)]
struct Replay {
    position: usize,
    resume_at: usize,
}

/// Ordered command list with a repeating tail
#[derive(Debug, Clone)]
pub struct CommandQueue {
    entries: Vec<QueueEntry>,
    loop_from: usize,
    cursor: usize,
    paused: bool,
    exhausted: bool,
    replay: Option<Replay>,
    cycles: u64,
}

impl CommandQueue {
    /// Create a queue; `loop_from` is clamped to the queue length
    pub fn new(entries: Vec<QueueEntry>, loop_from: usize) -> Self {
        let loop_from = loop_from.min(entries.len());
        Self {
            entries,
            loop_from,
            cursor: 0,
            paused: false,
            exhausted: false,
            replay: None,
            cycles: 0,
        }
    }

    /// Build a queue from command text: `init` runs once, `poll` repeats
    pub fn parse(init: &[&str], poll: &[&str]) -> Result<Self, ObdError> {
        let entries = init
            .iter()
            .chain(poll)
            .map(|text| text.parse().map(QueueEntry::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries, init.len()))
    }

    /// Entry the next call to [`advance`](Self::advance) moves past
    pub fn peek(&self) -> Option<&QueueEntry> {
        if self.paused {
            return None;
        }
        if let Some(replay) = self.replay {
            return self.entries.get(replay.position);
        }
        if self.exhausted {
            return None;
        }
        self.entries.get(self.cursor)
    }

    /// Move past the current entry. Returns `true` when this wrapped the
    /// cursor back to `loop_from`, completing a cycle.
    pub fn advance(&mut self) -> bool {
        if self.peek().is_none() {
            return false;
        }

        if let Some(replay) = self.replay.as_mut() {
            replay.position += 1;
            if replay.position >= self.loop_from {
                debug!("Init replay finished, resuming at {}", replay.resume_at);
                self.cursor = replay.resume_at;
                self.replay = None;
            }
            return false;
        }

        self.cursor += 1;
        if self.cursor < self.entries.len() {
            return false;
        }

        self.cursor = self.loop_from;
        self.cycles += 1;
        if self.loop_from >= self.entries.len() {
            debug!("Queue has no repeating section, exhausted after init");
            self.exhausted = true;
        }
        true
    }

    /// Return the entry at the cursor and advance, updating the ECU
    /// context for header switches
    pub fn next_command(&mut self, ctx: &mut EcuContext) -> Option<QueueStep> {
        let entry = self.peek()?.clone();
        ctx.on_send(&entry.command);
        let cycle_complete = self.advance();
        Some(QueueStep {
            entry,
            cycle_complete,
        })
    }

    /// Serve the init section again, then continue with the header
    /// section holding the cursor.
    ///
    /// The init section resets the adapter, so resuming starts at the
    /// last header switch at or before the cursor.
    pub fn replay_init(&mut self) {
        if self.loop_from == 0 || self.replay.is_some() {
            return;
        }
        self.replay = Some(Replay {
            position: 0,
            resume_at: self.section_start(self.cursor),
        });
    }

    /// Index of the header switch addressing the entry at `index`, or
    /// `index` itself when the pass has none before it
    fn section_start(&self, index: usize) -> usize {
        let end = self.entries.len().min(index + 1);
        (self.loop_from..end)
            .rev()
            .find(|&i| self.entries[i].command.header().is_some())
            .unwrap_or(index)
    }

    /// Stop serving commands, keeping the cursor
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn loop_from(&self) -> usize {
        self.loop_from
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of completed passes
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }
}
