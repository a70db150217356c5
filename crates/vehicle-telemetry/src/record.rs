//! Telemetry Record
//!
//! Canonical live data for one vehicle. Every quantity is an `Option`:
//! `None` means "not observed yet" and is never read as data.

use crate::charging::{ChargingCurve, CurveSample};
use crate::deciles::{DecileSample, SocDecileTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Speed below which a powered battery counts as charging on the curve
pub const CHARGING_MAX_SPEED_KMH: f64 = 10.0;
/// Minimum battery power (kW, positive = charging) recorded on the curve
pub const CHARGING_MIN_POWER_KW: f64 = 1.0;

/// Read-only view published to consumers
pub type TelemetrySnapshot = Arc<TelemetryRecord>;

/// Tire position, in the order vehicles report them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearRight,
    RearLeft,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearRight,
        Wheel::RearLeft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TireState {
    pub pressure_bar: Option<f64>,
    pub temp_c: Option<f64>,
}

/// Live vehicle data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    // State of charge / health
    pub soc_perc: Option<f64>,
    /// Last SoC value different from the current one
    pub soc_perc_previous: Option<f64>,
    pub soh_perc: Option<f64>,

    // High-voltage battery
    pub bat_voltage: Option<f64>,
    /// Positive while charging
    pub bat_current_amp: Option<f64>,
    /// Positive while charging
    pub bat_power_kw: Option<f64>,
    pub bat_power_kwh_100km: Option<f64>,
    pub cell_voltages: Vec<Option<f64>>,
    pub bat_cell_min_v: Option<f64>,
    pub bat_cell_max_v: Option<f64>,
    pub module_temps_c: Vec<Option<f64>>,
    pub bat_min_c: Option<f64>,
    pub bat_max_c: Option<f64>,
    pub bat_temp_c: Option<f64>,
    pub bat_inlet_c: Option<f64>,
    pub bat_heater_c: Option<f64>,
    pub cooling_water_temp_c: Option<f64>,
    pub bat_fan_status: Option<f64>,
    pub bat_fan_feedback_hz: Option<f64>,
    pub isolation_resistance_kohm: Option<f64>,
    pub available_charge_power_kw: Option<f64>,
    pub available_discharge_power_kw: Option<f64>,

    // 12V auxiliary battery
    pub aux_perc: Option<f64>,
    pub aux_current_amp: Option<f64>,
    pub aux_voltage: Option<f64>,

    pub tires: [TireState; 4],

    // Odometer and lifetime energy counters, with trip start latches
    pub odo_km: Option<f64>,
    pub odo_km_start: Option<f64>,
    pub cumulative_energy_charged_kwh: Option<f64>,
    pub cumulative_energy_charged_kwh_start: Option<f64>,
    pub cumulative_energy_discharged_kwh: Option<f64>,
    pub cumulative_energy_discharged_kwh_start: Option<f64>,

    // Drive train and cabin
    pub speed_kmh: Option<f64>,
    pub motor_rpm: Option<f64>,
    pub indoor_temp_c: Option<f64>,
    pub outdoor_temp_c: Option<f64>,
    pub ignition_on: Option<bool>,
    pub head_lights_on: Option<bool>,
    pub brake_lights_on: Option<bool>,

    pub charging_started_at: Option<DateTime<Utc>>,
    pub soc_deciles: SocDecileTable,
    pub charging_curve: ChargingCurve,
}

impl TelemetryRecord {
    /// Create a record with every value unknown
    pub fn new(cell_count: usize, module_count: usize) -> Self {
        Self {
            soc_perc: None,
            soc_perc_previous: None,
            soh_perc: None,
            bat_voltage: None,
            bat_current_amp: None,
            bat_power_kw: None,
            bat_power_kwh_100km: None,
            cell_voltages: vec![None; cell_count],
            bat_cell_min_v: None,
            bat_cell_max_v: None,
            module_temps_c: vec![None; module_count],
            bat_min_c: None,
            bat_max_c: None,
            bat_temp_c: None,
            bat_inlet_c: None,
            bat_heater_c: None,
            cooling_water_temp_c: None,
            bat_fan_status: None,
            bat_fan_feedback_hz: None,
            isolation_resistance_kohm: None,
            available_charge_power_kw: None,
            available_discharge_power_kw: None,
            aux_perc: None,
            aux_current_amp: None,
            aux_voltage: None,
            tires: [TireState::default(); 4],
            odo_km: None,
            odo_km_start: None,
            cumulative_energy_charged_kwh: None,
            cumulative_energy_charged_kwh_start: None,
            cumulative_energy_discharged_kwh: None,
            cumulative_energy_discharged_kwh_start: None,
            speed_kmh: None,
            motor_rpm: None,
            indoor_temp_c: None,
            outdoor_temp_c: None,
            ignition_on: None,
            head_lights_on: None,
            brake_lights_on: None,
            charging_started_at: None,
            soc_deciles: SocDecileTable::new(),
            charging_curve: ChargingCurve::new(),
        }
    }

    /// Store a new SoC reading, remembering the previous distinct value
    pub fn set_soc(&mut self, soc: f64) {
        if self.soc_perc != Some(soc) {
            self.soc_perc_previous = self.soc_perc;
            self.soc_perc = Some(soc);
        }
    }

    /// Write one cell voltage; indexes past the pack size are ignored
    pub fn set_cell_voltage(&mut self, index: usize, volts: f64) -> bool {
        match self.cell_voltages.get_mut(index) {
            Some(cell) => {
                *cell = Some(volts);
                true
            }
            None => false,
        }
    }

    /// Write one module temperature; indexes past the module count are ignored
    pub fn set_module_temp(&mut self, index: usize, temp_c: f64) -> bool {
        match self.module_temps_c.get_mut(index) {
            Some(module) => {
                *module = Some(temp_c);
                true
            }
            None => false,
        }
    }

    pub fn tire_mut(&mut self, wheel: Wheel) -> &mut TireState {
        &mut self.tires[wheel.index()]
    }

    pub fn tire(&self, wheel: Wheel) -> &TireState {
        &self.tires[wheel.index()]
    }

    /// Latch each `*_start` value on its first valid observation
    pub fn latch_start_values(&mut self) {
        fn latch(start: &mut Option<f64>, value: Option<f64>) {
            if start.is_none() {
                *start = value;
            }
        }
        latch(&mut self.odo_km_start, self.odo_km);
        latch(
            &mut self.cumulative_energy_charged_kwh_start,
            self.cumulative_energy_charged_kwh,
        );
        latch(
            &mut self.cumulative_energy_discharged_kwh_start,
            self.cumulative_energy_discharged_kwh,
        );
    }

    /// Forget trip latches and session aggregates
    pub fn reset_trip_stats(&mut self) {
        debug!("Resetting trip statistics");
        self.odo_km_start = None;
        self.cumulative_energy_charged_kwh_start = None;
        self.cumulative_energy_discharged_kwh_start = None;
        self.soc_deciles.clear();
        self.charging_curve.clear();
        self.charging_started_at = None;
    }

    /// Recompute `bat_min_c` / `bat_max_c` from the known module
    /// temperatures. Leaves them untouched when no module is known.
    pub fn update_temperature_extremes(&mut self) -> Option<(f64, f64)> {
        let (min, max) = known_extremes(&self.module_temps_c)?;
        self.bat_min_c = Some(min);
        self.bat_max_c = Some(max);
        Some((min, max))
    }

    /// Recompute cell min/max voltage from the known cells
    pub fn update_cell_extremes(&mut self) -> Option<(f64, f64)> {
        let (min, max) = known_extremes(&self.cell_voltages)?;
        self.bat_cell_min_v = Some(min);
        self.bat_cell_max_v = Some(max);
        Some((min, max))
    }

    /// `power = current x voltage`, in kW
    pub fn update_power(&mut self) -> Option<f64> {
        let power = self.bat_current_amp? * self.bat_voltage? / 1000.0;
        self.bat_power_kw = Some(power);
        Some(power)
    }

    /// Track when charging began; cleared whenever the pack discharges
    pub fn update_charging_start(&mut self, now: DateTime<Utc>) {
        match self.bat_power_kw {
            Some(power) if power < 0.0 => self.charging_started_at = None,
            Some(power) if power > 0.0 && self.charging_started_at.is_none() => {
                self.charging_started_at = Some(now);
            }
            _ => {}
        }
    }

    /// Feed the SoC decile table with the current readings
    pub fn update_soc_deciles(&mut self, now: DateTime<Utc>) -> bool {
        let Some(soc) = self.soc_perc else {
            return false;
        };
        let sample = DecileSample {
            cumulative_charged_kwh: self.cumulative_energy_charged_kwh,
            cumulative_discharged_kwh: self.cumulative_energy_discharged_kwh,
            odo_km: self.odo_km,
            recorded_at: now,
        };
        let written = self
            .soc_deciles
            .record(self.soc_perc_previous, soc, sample);
        if written {
            debug!("SoC decile recorded at {:.1}%", soc);
        }
        written
    }

    /// Feed the charging curve when the car is charging at low speed
    pub fn update_charging_curve(&mut self) -> bool {
        let (Some(speed), Some(power), Some(soc)) =
            (self.speed_kmh, self.bat_power_kw, self.soc_perc)
        else {
            return false;
        };
        if speed >= CHARGING_MAX_SPEED_KMH || power < CHARGING_MIN_POWER_KW {
            return false;
        }
        self.charging_curve.record(CurveSample {
            soc_perc: soc,
            power_kw: power,
            bat_min_c: self.bat_min_c,
            bat_max_c: self.bat_max_c,
            heater_c: self.bat_heater_c,
            coolant_c: self.cooling_water_temp_c,
        })
    }

    /// Energy charged since the trip start latch
    pub fn charged_since_start(&self) -> Option<f64> {
        Some(self.cumulative_energy_charged_kwh? - self.cumulative_energy_charged_kwh_start?)
    }

    /// Energy discharged since the trip start latch
    pub fn discharged_since_start(&self) -> Option<f64> {
        Some(self.cumulative_energy_discharged_kwh? - self.cumulative_energy_discharged_kwh_start?)
    }

    /// Distance driven since the trip start latch
    pub fn distance_since_start(&self) -> Option<f64> {
        Some(self.odo_km? - self.odo_km_start?)
    }

    /// Cell voltages that have been observed, with their index
    pub fn known_cell_voltages(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.cell_voltages
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
    }

    /// Immutable copy for consumers
    pub fn snapshot(&self) -> TelemetrySnapshot {
        Arc::new(self.clone())
    }
}

fn known_extremes(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values.iter().flatten().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((min, max)) => Some((f64::min(min, v), f64::max(max, v))),
    })
}
