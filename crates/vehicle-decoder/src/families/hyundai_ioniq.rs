//! Hyundai Ioniq Electric 28 kWh
//!
//! Older BMS firmware answering KWP-style `21xx` requests.

use super::{build_queue, clamp_vmcu_speed, request_key, HYUNDAI_ODOMETER, HYUNDAI_TPMS};
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

const POLL: &[&str] = &[
    "ATSH7E4", "2101", "2102", "2103", "2104", "2105",
    "ATSH7E2", "2101",
    "ATSH7C6", "22B002",
    "ATSH7A0", "22C00B",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// BMS `7E4 2101`
    BmsStatus,
    /// BMS `7E4 2102..2104`: 32 cells each
    BmsCells(u8),
    /// BMS `7E4 2105`
    BmsHealth,
    /// VMCU `7E2 2101`
    VmcuDrive,
    Cluster,
    Tpms,
}

impl Request {
    pub fn from_response(response: &Response) -> Option<Self> {
        let (ecu, request) = request_key(response)?;
        let request = match (ecu.as_str(), request.as_str()) {
            ("7E4", "2101") => Request::BmsStatus,
            ("7E4", "2102") => Request::BmsCells(0),
            ("7E4", "2103") => Request::BmsCells(1),
            ("7E4", "2104") => Request::BmsCells(2),
            ("7E4", "2105") => Request::BmsHealth,
            ("7E2", "2101") => Request::VmcuDrive,
            ("7C6", "22B002") => Request::Cluster,
            ("7A0", "22C00B") => Request::Tpms,
            _ => return None,
        };
        Some(request)
    }

    pub fn layout(self) -> Layout {
        match self {
            Request::BmsStatus => Layout::fields(BMS_STATUS).runs(BMS_STATUS_MODULES),
            Request::BmsCells(bank) => Layout::EMPTY.runs(&BMS_CELLS[usize::from(bank.min(2))]),
            Request::BmsHealth => Layout::fields(BMS_HEALTH).runs(BMS_HEALTH_MODULES),
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
    FieldSpec::new(66, 68, Field::SocPerc).div(2.0),
    FieldSpec::new(80, 88, Field::CumulativeChargedKwh).div(10.0),
    FieldSpec::new(88, 96, Field::CumulativeDischargedKwh).div(10.0),
    FieldSpec::new(108, 112, Field::MotorRpm),
];

static BMS_STATUS_MODULES: &[RunSpec] = &[RunSpec::modules(0, 36, 5)];

static BMS_CELLS: [[RunSpec; 1]; 3] = [
    [RunSpec::cells(0, 12, 32, 50.0)],
    [RunSpec::cells(32, 12, 32, 50.0)],
    [RunSpec::cells(64, 12, 32, 50.0)],
];

static BMS_HEALTH: &[FieldSpec] = &[
    FieldSpec::new(50, 52, Field::BatHeaterC).signed(),
    FieldSpec::new(54, 58, Field::SohPerc).div(10.0),
];

static BMS_HEALTH_MODULES: &[RunSpec] = &[RunSpec::modules(5, 22, 7)];

static VMCU_DRIVE: &[FieldSpec] = &[FieldSpec::new(32, 36, Field::SpeedKmh).times(0.0155)];

pub fn command_queue(_profile: &VehicleProfile) -> Result<CommandQueue, ObdError> {
    build_queue(ObdProtocol::Iso15765Can11bit500, &["ATST16"], POLL)
}

pub fn decode(response: &Response, record: &mut TelemetryRecord) -> DecodeOutcome {
    let Some(request) = Request::from_response(response) else {
        return DecodeOutcome::default();
    };
    let outcome = request.layout().apply(&response.payload, record);
    if request == Request::VmcuDrive {
        clamp_vmcu_speed(record);
    }
    outcome
}
