//! Queue Scheduler Implementation
//!
//! Drives a [`CommandQueue`] one command at a time: send, wait for the
//! prompt, hand the merged response to the decoder, send the next one.
//! Everything happens inside [`QueueScheduler::tick`], so response N is
//! always decoded before command N+1 goes out.

use obd_protocol::{
    AdapterStatus, Command, CommandQueue, EcuContext, EcuId, FrameReassembler, InboundEvent,
    InboundReceiver, LineOutcome, NegativeResponse, ObdError, Response, Transport,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

/// What to do with the queue after the link comes back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconnectPolicy {
    /// Continue polling at the saved cursor
    #[default]
    ResumeAtCursor,
    /// Run the init section again first, then continue at the saved cursor
    ReplayInit,
}

/// Configuration for the queue scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How long to wait for the prompt after a send (default: 1000ms)
    pub response_timeout: Duration,
    /// Timeouts in a row before the adapter is reported unresponsive
    pub max_consecutive_timeouts: u32,
    pub reconnect_policy: ReconnectPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(1000),
            max_consecutive_timeouts: 5,
            reconnect_policy: ReconnectPolicy::ResumeAtCursor,
        }
    }
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    AwaitingSend,
    AwaitingResponse {
        since: Instant,
        /// Sending this command wrapped the queue
        wraps: bool,
    },
    CycleComplete,
    /// Paused by the host
    Stopped,
}

/// Something the host may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// The repeating section finished one pass
    CycleComplete { cycle: u64, duration: Duration },
    /// No prompt within the response timeout
    NoResponse {
        ecu: Option<EcuId>,
        command: Option<Command>,
    },
    /// Adapter answered with an error status such as `NO DATA`
    NoData {
        ecu: Option<EcuId>,
        command: Option<Command>,
        status: AdapterStatus,
    },
    /// ECU rejected the request; the payload was not decoded
    NegativeResponse {
        ecu: Option<EcuId>,
        command: Option<Command>,
        response: NegativeResponse,
    },
    /// The receive path reported a dropped link
    Disconnected,
    /// A send failed; the command will be sent again after reconnect
    TransportError(String),
    AdapterUnresponsive { consecutive_timeouts: u32 },
    Paused,
    Resumed,
}

/// Consumer of complete, positive responses
pub trait ResponseHandler {
    fn on_response(&mut self, response: &Response);
}

impl<F: FnMut(&Response)> ResponseHandler for F {
    fn on_response(&mut self, response: &Response) {
        self(response)
    }
}

/// Single-threaded command queue engine
pub struct QueueScheduler {
    queue: CommandQueue,
    config: SchedulerConfig,
    inbound: InboundReceiver,
    context: EcuContext,
    reassembler: FrameReassembler,
    state: SchedulerState,
    connected: bool,
    pause_requested: bool,
    consecutive_timeouts: u32,
    /// Error status seen for the command in flight
    status: Option<AdapterStatus>,
    cycle_started: Option<Instant>,
}

impl QueueScheduler {
    pub fn new(queue: CommandQueue, config: SchedulerConfig, inbound: InboundReceiver) -> Self {
        info!(
            "Queue scheduler created with {} commands ({} init)",
            queue.len(),
            queue.loop_from()
        );
        Self {
            queue,
            config,
            inbound,
            context: EcuContext::new(),
            reassembler: FrameReassembler::new(),
            state: SchedulerState::Idle,
            connected: true,
            pause_requested: false,
            consecutive_timeouts: 0,
            status: None,
            cycle_started: None,
        }
    }

    /// Advance the engine. Never blocks.
    pub fn tick<T, H>(
        &mut self,
        now: Instant,
        transport: &mut T,
        handler: &mut H,
    ) -> Vec<SchedulerEvent>
    where
        T: Transport,
        H: ResponseHandler,
    {
        let mut events = Vec::new();

        self.drain_inbound(now, handler, &mut events);
        self.check_timeout(now, &mut events);

        if self.pause_requested
            && matches!(
                self.state,
                SchedulerState::Idle | SchedulerState::AwaitingSend | SchedulerState::CycleComplete
            )
        {
            info!("Polling paused at command {}", self.queue.cursor());
            self.queue.pause();
            self.state = SchedulerState::Stopped;
            events.push(SchedulerEvent::Paused);
        }

        if self.state == SchedulerState::CycleComplete {
            self.state = SchedulerState::AwaitingSend;
        }

        if self.state == SchedulerState::Idle && self.connected && self.queue.peek().is_some() {
            self.state = SchedulerState::AwaitingSend;
        }

        if self.state == SchedulerState::AwaitingSend {
            self.send_next(now, transport, &mut events);
        }

        events
    }

    fn drain_inbound<H: ResponseHandler>(
        &mut self,
        now: Instant,
        handler: &mut H,
        events: &mut Vec<SchedulerEvent>,
    ) {
        loop {
            match self.inbound.try_recv() {
                Ok(InboundEvent::Line(line)) => {
                    if matches!(self.state, SchedulerState::AwaitingResponse { .. }) {
                        self.handle_line(&line, now, handler, events);
                    } else {
                        debug!("Dropping stale line {:?}", String::from_utf8_lossy(&line));
                    }
                }
                Ok(InboundEvent::Disconnected) => {
                    self.on_disconnect(now, events);
                    return;
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        debug!("Inbound channel closed");
                        self.on_disconnect(now, events);
                    }
                    return;
                }
            }
        }
    }

    fn handle_line<H: ResponseHandler>(
        &mut self,
        line: &[u8],
        now: Instant,
        handler: &mut H,
        events: &mut Vec<SchedulerEvent>,
    ) {
        match self.reassembler.push_line(line) {
            LineOutcome::Pending | LineOutcome::Ignored => {}
            LineOutcome::Status(status) => {
                debug!("Adapter status {:?}", status);
                if status.is_error() {
                    self.status = Some(status);
                }
            }
            LineOutcome::Complete(payload) => {
                let response = self.context.response(payload);
                match response.payload.negative_response() {
                    Some(negative) => {
                        warn!(
                            "Negative response from {:?} to {:?}: {}",
                            response.ecu.as_ref().map(EcuId::as_str),
                            response.request(),
                            negative
                        );
                        events.push(SchedulerEvent::NegativeResponse {
                            ecu: response.ecu,
                            command: response.command,
                            response: negative,
                        });
                    }
                    None => handler.on_response(&response),
                }
                self.status = None;
                self.finish_command(now, events);
            }
            LineOutcome::Ready => {
                if let Some(status) = self.status.take() {
                    debug!("No data for {:?}: {:?}", self.context.current_command, status);
                    events.push(SchedulerEvent::NoData {
                        ecu: self.context.current_ecu.clone(),
                        command: self.context.current_command.clone(),
                        status,
                    });
                }
                self.finish_command(now, events);
            }
        }
    }

    fn check_timeout(&mut self, now: Instant, events: &mut Vec<SchedulerEvent>) {
        let SchedulerState::AwaitingResponse { since, wraps } = self.state else {
            return;
        };
        if now.saturating_duration_since(since) < self.config.response_timeout {
            return;
        }

        warn!(
            "No response to {:?} within {:?}",
            self.context.current_command, self.config.response_timeout
        );
        events.push(SchedulerEvent::NoResponse {
            ecu: self.context.current_ecu.clone(),
            command: self.context.current_command.clone(),
        });
        self.reassembler.reset();
        self.status = None;

        self.consecutive_timeouts += 1;
        if self.consecutive_timeouts == self.config.max_consecutive_timeouts {
            warn!("Adapter unresponsive after {} timeouts", self.consecutive_timeouts);
            events.push(SchedulerEvent::AdapterUnresponsive {
                consecutive_timeouts: self.consecutive_timeouts,
            });
        }

        self.move_on(wraps, now, events);
    }

    fn finish_command(&mut self, now: Instant, events: &mut Vec<SchedulerEvent>) {
        let SchedulerState::AwaitingResponse { wraps, .. } = self.state else {
            return;
        };
        self.consecutive_timeouts = 0;
        self.move_on(wraps, now, events);
    }

    fn move_on(&mut self, wraps: bool, now: Instant, events: &mut Vec<SchedulerEvent>) {
        if !wraps {
            self.state = SchedulerState::AwaitingSend;
            return;
        }
        let duration = self
            .cycle_started
            .take()
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        let cycle = self.queue.cycles();
        debug!("Cycle {} complete in {:?}", cycle, duration);
        events.push(SchedulerEvent::CycleComplete { cycle, duration });
        self.state = SchedulerState::CycleComplete;
    }

    fn send_next<T: Transport>(
        &mut self,
        now: Instant,
        transport: &mut T,
        events: &mut Vec<SchedulerEvent>,
    ) {
        if !self.connected {
            self.state = SchedulerState::Idle;
            return;
        }
        let Some(entry) = self.queue.peek().cloned() else {
            self.state = SchedulerState::Idle;
            return;
        };

        self.context.on_send(&entry.command);
        self.reassembler.reset();
        self.reassembler
            .set_echo_filter(Some(entry.command.wire_text()));
        self.status = None;

        if let Err(e) = transport.send(&entry.wire_bytes()) {
            warn!("Failed to send {}: {}", entry.command, e);
            if matches!(e, ObdError::Disconnected | ObdError::NotConnected) {
                self.connected = false;
            }
            events.push(SchedulerEvent::TransportError(e.to_string()));
            self.state = SchedulerState::Idle;
            return;
        }

        debug!("Sent {}", entry.command);
        let wraps = self.queue.advance();
        self.cycle_started.get_or_insert(now);
        self.state = SchedulerState::AwaitingResponse { since: now, wraps };
    }

    fn on_disconnect(&mut self, now: Instant, events: &mut Vec<SchedulerEvent>) {
        warn!("Adapter disconnected at command {}", self.queue.cursor());
        self.connected = false;
        self.reassembler.reset();
        self.status = None;
        // The queue already counted the wrap of an abandoned last command
        if let SchedulerState::AwaitingResponse { wraps: true, .. } = self.state {
            self.move_on(true, now, events);
        }
        if self.state != SchedulerState::Stopped {
            self.state = SchedulerState::Idle;
        }
        events.push(SchedulerEvent::Disconnected);
    }

    /// Attach the receive path of a fresh link
    pub fn on_reconnect(&mut self, inbound: InboundReceiver) {
        info!(
            "Adapter reconnected, policy {:?}, cursor {}",
            self.config.reconnect_policy,
            self.queue.cursor()
        );
        self.inbound = inbound;
        self.connected = true;
        self.consecutive_timeouts = 0;
        self.reassembler.reset();
        self.cycle_started = None;
        if self.state != SchedulerState::Stopped {
            self.state = SchedulerState::Idle;
        }
        if self.config.reconnect_policy == ReconnectPolicy::ReplayInit {
            self.queue.replay_init();
        }
    }

    /// Request a pause; takes effect once no command is in flight
    pub fn pause(&mut self) {
        self.pause_requested = true;
    }

    /// Leave the paused state at the same cursor
    pub fn resume(&mut self) -> Option<SchedulerEvent> {
        self.pause_requested = false;
        if self.state != SchedulerState::Stopped {
            return None;
        }
        info!("Polling resumed at command {}", self.queue.cursor());
        self.queue.resume();
        self.state = SchedulerState::AwaitingSend;
        Some(SchedulerEvent::Resumed)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_paused(&self) -> bool {
        self.state == SchedulerState::Stopped
    }

    /// Completed passes over the queue
    pub fn cycles(&self) -> u64 {
        self.queue.cycles()
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn context(&self) -> &EcuContext {
        &self.context
    }
}
