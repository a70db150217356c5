//! Hyundai Ioniq 5 and Kia EV6 (E-GMP platform, 800 V)

use super::{build_queue, request_key, HYUNDAI_ODOMETER, HYUNDAI_TPMS};
use crate::derive::{ConsumptionGuard, Derivations, TemperatureSource};
use crate::field::{DecodeOutcome, Field, FieldSpec, Layout, RunSpec};
use crate::model::VehicleProfile;
use obd_protocol::{CommandQueue, ObdError, ObdProtocol, Response};
use vehicle_telemetry::TelemetryRecord;

pub const DERIVATIONS: Derivations = Derivations {
    temperature: TemperatureSource::ColdestModule,
    consumption: ConsumptionGuard::AboveTenKmh,
    cell_extremes: false,
};

/// Cells per `2201xx` cell bank response
const CELLS_PER_BANK: usize = 32;

/// Banks `220102..220104`, then `22010A..22010C`
const CELL_BANKS: [&str; 6] = ["220102", "220103", "220104", "22010A", "22010B", "22010C"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// BMS `7E4 220101`
    BmsStatus,
    /// BMS cell bank, index into the six cell responses
    BmsCells(u8),
    /// BMS `7E4 220105`
    BmsHealth,
    /// BMS `7E4 220106`
    BmsCoolant,
    /// VMCU `7E2 22E004`
    VmcuDrive,
    Cluster,
    Tpms,
}

impl Request {
    pub fn from_response(response: &Response) -> Option<Self> {
        let (ecu, request) = request_key(response)?;
        let request = match (ecu.as_str(), request.as_str()) {
            ("7E4", "220101") => Request::BmsStatus,
            ("7E4", "220105") => Request::BmsHealth,
            ("7E4", "220106") => Request::BmsCoolant,
            ("7E4", cells) => {
                let bank = CELL_BANKS.iter().position(|b| *b == cells)?;
                Request::BmsCells(u8::try_from(bank).ok()?)
            }
            ("7E2", "22E004") => Request::VmcuDrive,
            ("7C6", "22B002") => Request::Cluster,
            ("7A0", "22C00B") => Request::Tpms,
            _ => return None,
        };
        Some(request)
    }

    pub fn layout(self) -> Layout {
        match self {
            Request::BmsStatus => Layout::fields(BMS_STATUS).runs(BMS_STATUS_MODULES),
            Request::BmsCells(bank) => {
                let bank = usize::from(bank).min(CELL_BANKS.len() - 1);
                Layout::EMPTY.runs(&BMS_CELLS[bank])
            }
            Request::BmsHealth => Layout::fields(BMS_HEALTH).runs(BMS_HEALTH_MODULES),
            Request::BmsCoolant => Layout::fields(BMS_COOLANT),
            Request::VmcuDrive => Layout::fields(VMCU_DRIVE),
            Request::Cluster => Layout::fields(HYUNDAI_ODOMETER),
            Request::Tpms => Layout::fields(HYUNDAI_TPMS),
        }
    }
}

static BMS_STATUS: &[FieldSpec] = &[
    FieldSpec::new(16, 20, Field::AvailableChargePowerKw).div(100.0),
    FieldSpec::new(20, 24, Field::AvailableDischargePowerKw).div(100.0),
    FieldSpec::new(24, 28, Field::BatCurrentAmp).signed().times(-1.0).div(10.0),
    FieldSpec::new(28, 32, Field::BatVoltage).div(10.0),
    FieldSpec::new(48, 50, Field::BatInletC).signed(),
    FieldSpec::new(50, 52, Field::BatCellMaxV).div(50.0),
    FieldSpec::new(54, 56, Field::BatCellMinV).div(50.0),
    FieldSpec::new(58, 60, Field::BatFanStatus),
    FieldSpec::new(60, 62, Field::BatFanFeedbackHz),
    FieldSpec::new(62, 64, Field::AuxVoltage).div(10.0),
    FieldSpec::new(82, 90, Field::CumulativeChargedKwh).div(10.0),
    FieldSpec::new(90, 98, Field::CumulativeDischargedKwh).div(10.0),
    FieldSpec::new(112, 116, Field::MotorRpm),
    FieldSpec::new(118, 122, Field::IsolationResistanceKohm).signed(),
];

static BMS_STATUS_MODULES: &[RunSpec] = &[RunSpec::modules(0, 36, 5)];

static BMS_CELLS: [[RunSpec; 1]; 6] = [
    [RunSpec::cells(0, 14, CELLS_PER_BANK, 50.0)],
    [RunSpec::cells(CELLS_PER_BANK, 14, CELLS_PER_BANK, 50.0)],
    [RunSpec::cells(2 * CELLS_PER_BANK, 14, CELLS_PER_BANK, 50.0)],
    [RunSpec::cells(3 * CELLS_PER_BANK, 14, CELLS_PER_BANK, 50.0)],
    [RunSpec::cells(4 * CELLS_PER_BANK, 14, CELLS_PER_BANK, 50.0)],
    [RunSpec::cells(5 * CELLS_PER_BANK, 14, CELLS_PER_BANK, 50.0)],
];

static BMS_HEALTH: &[FieldSpec] = &[
    FieldSpec::new(52, 54, Field::BatHeaterC).signed(),
    FieldSpec::new(56, 60, Field::SohPerc).div(10.0),
    FieldSpec::new(68, 70, Field::SocPerc).div(2.0),
];

static BMS_HEALTH_MODULES: &[RunSpec] = &[RunSpec::modules(5, 22, 11)];

static BMS_COOLANT: &[FieldSpec] = &[FieldSpec::new(14, 16, Field::CoolingWaterTempC).signed()];

static VMCU_DRIVE: &[FieldSpec] = &[FieldSpec::new(30, 34, Field::SpeedKmh).div(100.0)];

pub fn command_queue(profile: &VehicleProfile) -> Result<CommandQueue, ObdError> {
    let banks = profile.cell_count.div_ceil(CELLS_PER_BANK).min(CELL_BANKS.len());
    let mut poll = vec!["ATSH7E4", "220101"];
    poll.extend_from_slice(&CELL_BANKS[..banks]);
    poll.extend_from_slice(&[
        "220105", "220106",
        "ATSH7E2", "22E004",
        "ATSH7C6", "22B002",
        "ATSH7A0", "22C00B",
    ]);
    build_queue(ObdProtocol::Iso15765Can11bit500, &["ATST16"], &poll)
}

pub fn decode(response: &Response, record: &mut TelemetryRecord) -> DecodeOutcome {
    match Request::from_response(response) {
        Some(request) => request.layout().apply(&response.payload, record),
        None => DecodeOutcome::default(),
    }
}
