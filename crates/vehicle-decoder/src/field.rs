//! Field Descriptor Engine
//!
//! Byte layouts are declared as static tables of [`FieldSpec`]s and
//! interpreted here. Each entry reads one number from the payload and
//! writes `raw * factor / divisor + offset` into its target. Every entry
//! fails closed on its own: a payload too short for one field leaves that
//! field untouched and the rest of the table still runs.

use obd_protocol::Payload;
use std::ops::AddAssign;
use tracing::trace;
use vehicle_telemetry::{TelemetryRecord, Wheel};

/// Numeric quantity a table entry writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SocPerc,
    SohPerc,
    BatVoltage,
    BatCurrentAmp,
    CellVoltage(usize),
    BatCellMinV,
    BatCellMaxV,
    ModuleTemp(usize),
    BatMinC,
    BatMaxC,
    BatTempC,
    BatInletC,
    BatHeaterC,
    CoolingWaterTempC,
    BatFanStatus,
    BatFanFeedbackHz,
    IsolationResistanceKohm,
    AvailableChargePowerKw,
    AvailableDischargePowerKw,
    AuxPerc,
    AuxCurrentAmp,
    AuxVoltage,
    TirePressureBar(Wheel),
    TireTempC(Wheel),
    OdoKm,
    CumulativeChargedKwh,
    CumulativeDischargedKwh,
    SpeedKmh,
    MotorRpm,
    IndoorTempC,
    OutdoorTempC,
}

impl Field {
    /// Store `value`. Returns `false` when an indexed target is outside
    /// the record's cell or module range.
    pub fn write(self, record: &mut TelemetryRecord, value: f64) -> bool {
        let slot = match self {
            Field::SocPerc => {
                record.set_soc(value);
                return true;
            }
            Field::CellVoltage(index) => return record.set_cell_voltage(index, value),
            Field::ModuleTemp(index) => return record.set_module_temp(index, value),
            Field::TirePressureBar(wheel) => &mut record.tire_mut(wheel).pressure_bar,
            Field::TireTempC(wheel) => &mut record.tire_mut(wheel).temp_c,
            Field::SohPerc => &mut record.soh_perc,
            Field::BatVoltage => &mut record.bat_voltage,
            Field::BatCurrentAmp => &mut record.bat_current_amp,
            Field::BatCellMinV => &mut record.bat_cell_min_v,
            Field::BatCellMaxV => &mut record.bat_cell_max_v,
            Field::BatMinC => &mut record.bat_min_c,
            Field::BatMaxC => &mut record.bat_max_c,
            Field::BatTempC => &mut record.bat_temp_c,
            Field::BatInletC => &mut record.bat_inlet_c,
            Field::BatHeaterC => &mut record.bat_heater_c,
            Field::CoolingWaterTempC => &mut record.cooling_water_temp_c,
            Field::BatFanStatus => &mut record.bat_fan_status,
            Field::BatFanFeedbackHz => &mut record.bat_fan_feedback_hz,
            Field::IsolationResistanceKohm => &mut record.isolation_resistance_kohm,
            Field::AvailableChargePowerKw => &mut record.available_charge_power_kw,
            Field::AvailableDischargePowerKw => &mut record.available_discharge_power_kw,
            Field::AuxPerc => &mut record.aux_perc,
            Field::AuxCurrentAmp => &mut record.aux_current_amp,
            Field::AuxVoltage => &mut record.aux_voltage,
            Field::OdoKm => &mut record.odo_km,
            Field::CumulativeChargedKwh => &mut record.cumulative_energy_charged_kwh,
            Field::CumulativeDischargedKwh => &mut record.cumulative_energy_discharged_kwh,
            Field::SpeedKmh => &mut record.speed_kmh,
            Field::MotorRpm => &mut record.motor_rpm,
            Field::IndoorTempC => &mut record.indoor_temp_c,
            Field::OutdoorTempC => &mut record.outdoor_temp_c,
        };
        *slot = Some(value);
        true
    }
}

/// One numeric field of a response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// First nibble, counted from the start of the payload
    pub start: usize,
    /// One past the last nibble
    pub end: usize,
    /// Byte width used for two's complement
    pub width: usize,
    pub signed: bool,
    pub factor: f64,
    pub divisor: f64,
    pub offset: f64,
    pub target: Field,
}

impl FieldSpec {
    /// Unsigned field covering `start..end`, unscaled
    pub const fn new(start: usize, end: usize, target: Field) -> Self {
        Self {
            start,
            end,
            width: (end - start) / 2,
            signed: false,
            factor: 1.0,
            divisor: 1.0,
            offset: 0.0,
            target,
        }
    }

    pub const fn signed(self) -> Self {
        Self {
            signed: true,
            ..self
        }
    }

    pub const fn times(self, factor: f64) -> Self {
        Self { factor, ..self }
    }

    pub const fn div(self, divisor: f64) -> Self {
        Self { divisor, ..self }
    }

    pub const fn plus(self, offset: f64) -> Self {
        Self { offset, ..self }
    }

    /// Scaled value, or `None` when the payload cannot supply it
    pub fn read(&self, payload: &Payload) -> Option<f64> {
        let raw = payload
            .extract_field(self.start, self.end, self.width, self.signed)
            .ok()?;
        let value = raw * self.factor / self.divisor + self.offset;
        value.is_finite().then_some(value)
    }
}

/// Cells or modules laid out back to back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    Cells { first: usize },
    Modules { first: usize },
}

/// `count` equally spaced fields written to consecutive indexes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSpec {
    pub start: usize,
    pub stride: usize,
    pub count: usize,
    /// Nibbles per value
    pub nibbles: usize,
    pub signed: bool,
    pub divisor: f64,
    pub offset: f64,
    pub target: RunTarget,
}

impl RunSpec {
    pub const fn cells(first: usize, start: usize, count: usize, divisor: f64) -> Self {
        Self {
            start,
            stride: 2,
            count,
            nibbles: 2,
            signed: false,
            divisor,
            offset: 0.0,
            target: RunTarget::Cells { first },
        }
    }

    pub const fn modules(first: usize, start: usize, count: usize) -> Self {
        Self {
            start,
            stride: 2,
            count,
            nibbles: 2,
            signed: true,
            divisor: 1.0,
            offset: 0.0,
            target: RunTarget::Modules { first },
        }
    }

    pub const fn stride(self, stride: usize, nibbles: usize) -> Self {
        Self {
            stride,
            nibbles,
            ..self
        }
    }

    pub const fn unsigned(self) -> Self {
        Self {
            signed: false,
            ..self
        }
    }

    pub const fn plus(self, offset: f64) -> Self {
        Self { offset, ..self }
    }

    fn field(&self, i: usize) -> FieldSpec {
        let start = self.start + i * self.stride;
        let target = match self.target {
            RunTarget::Cells { first } => Field::CellVoltage(first + i),
            RunTarget::Modules { first } => Field::ModuleTemp(first + i),
        };
        FieldSpec {
            start,
            end: start + self.nibbles,
            width: self.nibbles / 2,
            signed: self.signed,
            factor: 1.0,
            divisor: self.divisor,
            offset: self.offset,
            target,
        }
    }
}

/// Boolean quantity read from a single bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    IgnitionOn,
    HeadLightsOn,
    BrakeLightsOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpec {
    /// Nibble where the byte starts
    pub start: usize,
    /// Bit within that byte, 0 = least significant
    pub bit: u8,
    pub target: Flag,
}

impl FlagSpec {
    pub const fn new(start: usize, bit: u8, target: Flag) -> Self {
        Self { start, bit, target }
    }

    fn apply(&self, payload: &Payload, record: &mut TelemetryRecord) -> bool {
        let Ok(value) = payload.bit(self.start, self.bit) else {
            return false;
        };
        let slot = match self.target {
            Flag::IgnitionOn => &mut record.ignition_on,
            Flag::HeadLightsOn => &mut record.head_lights_on,
            Flag::BrakeLightsOn => &mut record.brake_lights_on,
        };
        *slot = Some(value);
        true
    }
}

/// Nibbles a payload must carry for its layout to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub start: usize,
    pub end: usize,
    pub expected: &'static str,
}

/// Complete byte layout of one response
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub marker: Option<Marker>,
    pub fields: &'static [FieldSpec],
    pub runs: &'static [RunSpec],
    pub flags: &'static [FlagSpec],
}

impl Layout {
    pub const EMPTY: Layout = Layout {
        marker: None,
        fields: &[],
        runs: &[],
        flags: &[],
    };

    pub const fn fields(fields: &'static [FieldSpec]) -> Self {
        Self {
            fields,
            ..Self::EMPTY
        }
    }

    pub const fn runs(self, runs: &'static [RunSpec]) -> Self {
        Self { runs, ..self }
    }

    pub const fn flags(self, flags: &'static [FlagSpec]) -> Self {
        Self { flags, ..self }
    }

    pub const fn marker(self, start: usize, end: usize, expected: &'static str) -> Self {
        Self {
            marker: Some(Marker {
                start,
                end,
                expected,
            }),
            ..self
        }
    }

    /// Decode `payload` into `record`
    pub fn apply(&self, payload: &Payload, record: &mut TelemetryRecord) -> DecodeOutcome {
        if let Some(marker) = self.marker {
            if !payload.nibbles_eq(marker.start, marker.end, marker.expected) {
                trace!("Layout marker {:?} not present", marker);
                return DecodeOutcome::default();
            }
        }

        let mut outcome = apply(self.fields, payload, record);
        for run in self.runs {
            let specs: Vec<FieldSpec> = (0..run.count).map(|i| run.field(i)).collect();
            outcome += apply(&specs, payload, record);
        }
        for flag in self.flags {
            if flag.apply(payload, record) {
                outcome.written += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        outcome
    }
}

/// How many table entries were written or left untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub written: usize,
    pub skipped: usize,
}

impl DecodeOutcome {
    pub fn is_empty(&self) -> bool {
        self.written == 0 && self.skipped == 0
    }
}

impl AddAssign for DecodeOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.written += rhs.written;
        self.skipped += rhs.skipped;
    }
}

/// Run every spec against `payload`
pub fn apply(
    specs: &[FieldSpec],
    payload: &Payload,
    record: &mut TelemetryRecord,
) -> DecodeOutcome {
    let mut outcome = DecodeOutcome::default();
    for spec in specs {
        match spec.read(payload) {
            Some(value) if spec.target.write(record, value) => outcome.written += 1,
            _ => outcome.skipped += 1,
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[FieldSpec] = &[
        FieldSpec::new(6, 10, Field::BatVoltage).div(10.0),
        FieldSpec::new(10, 14, Field::BatCurrentAmp).signed().times(-1.0).div(10.0),
        FieldSpec::new(14, 16, Field::IndoorTempC).div(2.0).plus(-40.0),
    ];

    #[test]
    fn test_scale_and_offset() {
        let mut record = TelemetryRecord::new(0, 0);
        let outcome = apply(TABLE, &Payload::new("6201010E10FE0C7B"), &mut record);
        assert_eq!(outcome, DecodeOutcome { written: 3, skipped: 0 });
        assert_eq!(record.bat_voltage, Some(360.0));
        assert_eq!(record.bat_current_amp, Some(50.0));
        assert_eq!(record.indoor_temp_c, Some(21.5));
    }

    #[test]
    fn test_short_payload_fails_per_field() {
        let mut record = TelemetryRecord::new(0, 0);
        record.indoor_temp_c = Some(5.0);
        let outcome = apply(TABLE, &Payload::new("6201010E10"), &mut record);
        assert_eq!(outcome, DecodeOutcome { written: 1, skipped: 2 });
        assert_eq!(record.bat_voltage, Some(360.0));
        assert!(record.bat_current_amp.is_none());
        assert_eq!(record.indoor_temp_c, Some(5.0));
    }

    #[test]
    fn test_run_skips_indexes_past_pack() {
        const RUNS: &[RunSpec] = &[RunSpec::cells(0, 6, 4, 50.0)];
        let layout = Layout::EMPTY.runs(RUNS);
        let mut record = TelemetryRecord::new(3, 0);
        let outcome = layout.apply(&Payload::new("620102C3C4C5C6"), &mut record);
        assert_eq!(outcome, DecodeOutcome { written: 3, skipped: 1 });
        assert_eq!(record.cell_voltages, [Some(3.9), Some(3.92), Some(3.94)]);
    }

    #[test]
    fn test_marker_gates_layout() {
        const RUNS: &[RunSpec] = &[RunSpec::cells(0, 8, 1, 50.0)];
        let layout = Layout::EMPTY.runs(RUNS).marker(6, 8, "FF");
        let mut record = TelemetryRecord::new(1, 0);

        assert!(layout.apply(&Payload::new("62010200C3"), &mut record).is_empty());
        assert!(record.cell_voltages[0].is_none());

        layout.apply(&Payload::new("620102FFC3"), &mut record);
        assert_eq!(record.cell_voltages[0], Some(3.9));
    }

    #[test]
    fn test_flags() {
        const FLAGS: &[FlagSpec] = &[
            FlagSpec::new(6, 5, Flag::IgnitionOn),
            FlagSpec::new(8, 5, Flag::HeadLightsOn),
        ];
        let layout = Layout::EMPTY.flags(FLAGS);
        let mut record = TelemetryRecord::new(0, 0);
        let outcome = layout.apply(&Payload::new("62BC0320"), &mut record);
        assert_eq!(outcome, DecodeOutcome { written: 1, skipped: 1 });
        assert_eq!(record.ignition_on, Some(true));
        assert!(record.head_lights_on.is_none());
    }

    #[test]
    fn test_tire_targets() {
        let mut record = TelemetryRecord::new(0, 0);
        assert!(Field::TireTempC(Wheel::RearLeft).write(&mut record, 12.0));
        assert_eq!(record.tire(Wheel::RearLeft).temp_c, Some(12.0));
        assert!(!Field::ModuleTemp(0).write(&mut record, 12.0));
    }
}
