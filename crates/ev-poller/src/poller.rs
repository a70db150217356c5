//! Poll loop
//!
//! One task owns the scheduler, the decoder, the telemetry record and the
//! adapter link. A `tokio::time::interval` drives the scheduler tick and
//! a control channel carries host requests between ticks. Every tick that
//! decoded a response publishes a snapshot on a watch channel; consumers
//! never touch the live record.

use crate::config::{AdapterKind, AppConfig};
use crate::error::PollerError;
use obd_protocol::{InboundReceiver, ObdClient, Response};
use obd_scheduler::{QueueScheduler, SchedulerEvent};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use vehicle_decoder::{samples, DecodeContext, Decoder};
use vehicle_telemetry::{TelemetryRecord, TelemetrySnapshot};

/// Control channel capacity
const CONTROL_BUFFER: usize = 16;

/// Host request to a running poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Stop sending once the command in flight has been answered
    Pause,
    Resume,
    /// Clear trip latches, deciles and the charging curve
    ResetTripStats,
    Shutdown,
}

/// Cloneable handle to a running [`Poller`]
#[derive(Debug, Clone)]
pub struct PollerHandle {
    control: mpsc::Sender<Control>,
    snapshots: watch::Receiver<TelemetrySnapshot>,
}

impl PollerHandle {
    pub async fn send(&self, control: Control) -> Result<(), PollerError> {
        self.control
            .send(control)
            .await
            .map_err(|_| PollerError::Stopped)
    }

    pub async fn pause(&self) -> Result<(), PollerError> {
        self.send(Control::Pause).await
    }

    pub async fn resume(&self) -> Result<(), PollerError> {
        self.send(Control::Resume).await
    }

    pub async fn reset_trip_stats(&self) -> Result<(), PollerError> {
        self.send(Control::ResetTripStats).await
    }

    pub async fn shutdown(&self) -> Result<(), PollerError> {
        self.send(Control::Shutdown).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshots.clone()
    }
}

/// Open the configured adapter
fn connect(
    config: &AppConfig,
    decoder: &Decoder,
) -> Result<(ObdClient, InboundReceiver), PollerError> {
    match config.adapter.kind {
        AdapterKind::Serial => Ok(ObdClient::connect_serial(
            &config.adapter.device,
            config.adapter.baud_rate,
        )?),
        AdapterKind::Simulated => Ok(ObdClient::simulated(samples::responses(decoder.family()))),
    }
}

pub struct Poller {
    config: AppConfig,
    decoder: Decoder,
    scheduler: QueueScheduler,
    client: ObdClient,
    record: TelemetryRecord,
    control: mpsc::Receiver<Control>,
    snapshots: watch::Sender<TelemetrySnapshot>,
    /// Set while the link is down
    reconnect_at: Option<tokio::time::Instant>,
}

impl Poller {
    /// Build the queue for the configured vehicle and open the adapter.
    ///
    /// Must be called inside a tokio runtime when the adapter is serial.
    pub fn new(config: AppConfig) -> Result<(Self, PollerHandle), PollerError> {
        let decoder = Decoder::for_model(config.vehicle);
        let queue = decoder.command_queue()?;
        let (client, inbound) = connect(&config, &decoder)?;
        let scheduler = QueueScheduler::new(queue, config.scheduler.to_scheduler_config(), inbound);
        let record = decoder.new_record();

        let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(record.snapshot());

        info!(
            "Polling {} ({} cells, {} modules) via {}",
            decoder.profile().name,
            decoder.profile().cell_count,
            decoder.profile().module_count,
            client.device()
        );

        let poller = Self {
            config,
            decoder,
            scheduler,
            client,
            record,
            control: control_rx,
            snapshots: snapshot_tx,
            reconnect_at: None,
        };
        let handle = PollerHandle {
            control: control_tx,
            snapshots: snapshot_rx,
        };
        Ok((poller, handle))
    }

    /// Poll until [`Control::Shutdown`] or every handle is dropped.
    /// Returns the final snapshot.
    pub async fn run(mut self) -> Result<TelemetrySnapshot, PollerError> {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                control = self.control.recv() => match control {
                    Some(Control::Shutdown) | None => break,
                    Some(control) => self.on_control(control),
                },
                _ = ticker.tick() => {
                    let now = tokio::time::Instant::now();
                    self.step(now)?;
                }
            }
        }

        info!("Poller shutting down after {} cycles", self.scheduler.cycles());
        self.client.disconnect();
        let snapshot = self.publish();
        Ok(snapshot)
    }

    /// One tick: reconnect if due, otherwise drive the scheduler
    fn step(&mut self, now: tokio::time::Instant) -> Result<(), PollerError> {
        if let Some(at) = self.reconnect_at {
            if now >= at {
                self.reconnect(now);
            }
            return Ok(());
        }

        let ctx = DecodeContext::now();
        let decoder = &self.decoder;
        let record = &mut self.record;
        let mut decoded = false;
        let mut handler = |response: &Response| {
            decoded |= decoder.decode(response, record, &ctx).written > 0;
        };
        let events = self
            .scheduler
            .tick(now.into_std(), &mut self.client, &mut handler);

        if decoded {
            self.publish();
        }
        for event in events {
            self.on_event(event, now)?;
        }
        Ok(())
    }

    fn on_event(
        &mut self,
        event: SchedulerEvent,
        now: tokio::time::Instant,
    ) -> Result<(), PollerError> {
        match event {
            SchedulerEvent::CycleComplete { cycle, duration } => {
                debug!("Cycle {} took {:?}", cycle, duration);
                let every = self.config.log_every_cycles;
                if every > 0 && cycle % every == 0 {
                    info!("Cycle {}: {}", cycle, serde_json::to_string(&self.record)?);
                }
            }
            SchedulerEvent::NoResponse { ecu, command } => {
                debug!("No response from {:?} to {:?}", ecu, command);
            }
            SchedulerEvent::NoData { ecu, command, status } => {
                debug!("{:?} answered {:?} with {:?}", ecu, command, status);
            }
            SchedulerEvent::NegativeResponse { ecu, command, response } => {
                debug!("{:?} rejected {:?}: {}", ecu, command, response);
            }
            SchedulerEvent::Disconnected => {
                warn!("Adapter link lost");
                self.schedule_reconnect(now);
            }
            SchedulerEvent::TransportError(message) => {
                error!("Adapter transport error: {}", message);
                self.schedule_reconnect(now);
            }
            SchedulerEvent::AdapterUnresponsive { consecutive_timeouts } => {
                warn!(
                    "Adapter unresponsive after {} timeouts, reopening link",
                    consecutive_timeouts
                );
                self.client.disconnect();
                self.schedule_reconnect(now);
            }
            SchedulerEvent::Paused => info!("Polling paused"),
            SchedulerEvent::Resumed => info!("Polling resumed"),
        }
        Ok(())
    }

    fn on_control(&mut self, control: Control) {
        debug!("Control request {:?}", control);
        match control {
            Control::Pause => self.scheduler.pause(),
            Control::Resume => {
                if self.scheduler.resume().is_none() {
                    debug!("Resume while not paused");
                }
            }
            Control::ResetTripStats => {
                self.record.reset_trip_stats();
                self.publish();
            }
            Control::Shutdown => {}
        }
    }

    fn schedule_reconnect(&mut self, now: tokio::time::Instant) {
        if self.reconnect_at.is_none() {
            info!("Reconnecting in {:?}", self.config.reconnect_delay());
            self.reconnect_at = Some(now + self.config.reconnect_delay());
        }
    }

    fn reconnect(&mut self, now: tokio::time::Instant) {
        match connect(&self.config, &self.decoder) {
            Ok((client, inbound)) => {
                self.client = client;
                self.scheduler.on_reconnect(inbound);
                self.reconnect_at = None;
            }
            Err(e) => {
                warn!("Reconnect failed: {}", e);
                self.reconnect_at = Some(now + self.config.reconnect_delay());
            }
        }
    }

    /// Publish and return a snapshot of the live record
    fn publish(&self) -> TelemetrySnapshot {
        let snapshot = self.record.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn scheduler(&self) -> &QueueScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vehicle_decoder::VehicleModel;

    fn simulated(model: VehicleModel) -> AppConfig {
        let mut config = AppConfig::default();
        config.vehicle = model;
        config.adapter.kind = AdapterKind::Simulated;
        config.reconnect_delay_ms = 100;
        config
    }

    fn step_until_cycle(poller: &mut Poller, now: &mut tokio::time::Instant, cycle: u64) {
        for _ in 0..1000 {
            if poller.scheduler.cycles() >= cycle {
                return;
            }
            poller.step(*now).unwrap();
            *now += Duration::from_millis(1);
        }
        panic!("cycle {cycle} not reached");
    }

    #[tokio::test]
    async fn test_cycle_publishes_snapshot() {
        let (mut poller, handle) = Poller::new(simulated(VehicleModel::KiaEniro64)).unwrap();
        assert!(handle.snapshot().soc_perc.is_none());

        let mut now = tokio::time::Instant::now();
        step_until_cycle(&mut poller, &mut now, 1);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.soc_perc, Some(55.5));
        assert_eq!(snapshot.odo_km, Some(23456.0));
    }

    #[tokio::test]
    async fn test_disconnect_schedules_reconnect() {
        let (mut poller, _handle) = Poller::new(simulated(VehicleModel::RenaultZoeZe50)).unwrap();
        let mut now = tokio::time::Instant::now();
        step_until_cycle(&mut poller, &mut now, 1);

        poller.client.disconnect();
        poller.step(now).unwrap();
        assert!(poller.reconnect_at.is_some());
        assert!(!poller.scheduler.is_connected());

        // Too early: still waiting
        now += Duration::from_millis(50);
        poller.step(now).unwrap();
        assert!(poller.reconnect_at.is_some());

        now += Duration::from_millis(60);
        poller.step(now).unwrap();
        assert!(poller.reconnect_at.is_none());
        assert!(poller.scheduler.is_connected());

        step_until_cycle(&mut poller, &mut now, 2);
    }

    #[tokio::test]
    async fn test_reset_trip_stats_publishes() {
        let (mut poller, handle) = Poller::new(simulated(VehicleModel::KiaEv6Sr58)).unwrap();
        let mut now = tokio::time::Instant::now();
        step_until_cycle(&mut poller, &mut now, 1);
        assert!(poller.record.odo_km_start.is_some());

        poller.on_control(Control::ResetTripStats);
        let snapshot = handle.snapshot();
        assert!(snapshot.odo_km_start.is_none());
        assert!(snapshot.charging_curve.peak_power_kw().is_none());
        assert_eq!(snapshot.odo_km, Some(12345.0));
    }

    #[tokio::test]
    async fn test_pause_stops_sending() {
        let (mut poller, _handle) = Poller::new(simulated(VehicleModel::BmwI3_60Ah)).unwrap();
        let mut now = tokio::time::Instant::now();
        poller.on_control(Control::Pause);
        for _ in 0..5 {
            poller.step(now).unwrap();
            now += Duration::from_millis(1);
        }
        assert!(poller.scheduler.is_paused());
        let cursor = poller.scheduler.queue().cursor();
        poller.step(now).unwrap();
        assert_eq!(poller.scheduler.queue().cursor(), cursor);

        poller.on_control(Control::Resume);
        step_until_cycle(&mut poller, &mut now, 1);
    }

    #[test]
    fn test_serial_adapter_missing_device() {
        let mut config = AppConfig::default();
        config.adapter.device = "/dev/ev-poller-does-not-exist".into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = runtime.block_on(async { Poller::new(config).map(|_| ()) });
        assert!(matches!(result, Err(PollerError::Obd(_))));
    }
}
