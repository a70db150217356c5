//! Kia e-Niro, Hyundai Kona EV and Kia e-Soul (64 / 39 kWh)

use super::{build_queue, clamp_vmcu_speed, request_key, HYUNDAI_ODOMETER, HYUNDAI_TPMS};
use crate::derive::{ConsumptionGuard, Derivations, TemperatureSource};
use crate::field::{DecodeOutcome, Field, FieldSpec, Flag, FlagSpec, Layout, RunSpec};
use crate::model::VehicleProfile;
use obd_protocol::{CommandQueue, ObdError, ObdProtocol, Response};
use vehicle_telemetry::TelemetryRecord;

pub const DERIVATIONS: Derivations = Derivations {
    temperature: TemperatureSource::ColdestModule,
    consumption: ConsumptionGuard::AboveTenKmh,
    cell_extremes: false,
};

const POLL: &[&str] = &[
    "ATSH770", "22BC03", // IGPM
    "ATSH7E2", "2101", "2102", // VMCU
    "ATSH7E4", "220101", "220102", "220103", "220104", "220105", "220106", // BMS
    "ATSH7B3", "220100", "220102", // Aircon
    "ATSH7A0", "22C00B", // TPMS
    "ATSH7C6", "22B002", // Cluster
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// IGPM `770 22BC03`: ignition and lights
    Igpm,
    /// VMCU `7E2 2101`: speed
    VmcuDrive,
    /// VMCU `7E2 2102`: 12V battery
    VmcuAux,
    /// BMS `7E4 220101`: pack status
    BmsStatus,
    /// BMS `7E4 220102..220104`: 32 cells each, bank 0 to 2
    BmsCells(u8),
    /// BMS `7E4 220105`: SoC, SoH, remaining modules
    BmsHealth,
    /// BMS `7E4 220106`: coolant
    BmsCoolant,
    /// Aircon `7B3 220100`: cabin temperatures
    AirconCabin,
    /// Aircon `7B3 220102`: coolant
    AirconCoolant,
    /// TPMS `7A0 22C00B`
    Tpms,
    /// Cluster `7C6 22B002`: odometer
    Cluster,
}

impl Request {
    /// Dispatch on the ECU first, then on the command
    pub fn from_response(response: &Response) -> Option<Self> {
        let (ecu, request) = request_key(response)?;
        let request = match (ecu.as_str(), request.as_str()) {
            ("770", "22BC03") => Request::Igpm,
            ("7E2", "2101") => Request::VmcuDrive,
            ("7E2", "2102") => Request::VmcuAux,
            ("7E4", "220101") => Request::BmsStatus,
            ("7E4", "220102") => Request::BmsCells(0),
            ("7E4", "220103") => Request::BmsCells(1),
            ("7E4", "220104") => Request::BmsCells(2),
            ("7E4", "220105") => Request::BmsHealth,
            ("7E4", "220106") => Request::BmsCoolant,
            ("7B3", "220100") => Request::AirconCabin,
            ("7B3", "220102") => Request::AirconCoolant,
            ("7A0", "22C00B") => Request::Tpms,
            ("7C6", "22B002") => Request::Cluster,
            _ => return None,
        };
        Some(request)
    }

    pub fn layout(self) -> Layout {
        match self {
            Request::Igpm => Layout::EMPTY.flags(IGPM),
            Request::VmcuDrive => Layout::fields(VMCU_DRIVE),
            Request::VmcuAux => Layout::fields(VMCU_AUX),
            Request::BmsStatus => Layout::fields(BMS_STATUS).runs(BMS_STATUS_MODULES),
            Request::BmsCells(0) => Layout::EMPTY.runs(&BMS_CELLS[0]).marker(12, 14, "FF"),
            Request::BmsCells(bank) => Layout::EMPTY.runs(&BMS_CELLS[usize::from(bank.min(2))]),
            Request::BmsHealth => Layout::fields(BMS_HEALTH).runs(BMS_HEALTH_RUNS),
            Request::BmsCoolant => Layout::fields(BMS_COOLANT),
            Request::AirconCabin => Layout::fields(AIRCON_CABIN),
            Request::AirconCoolant => Layout::fields(AIRCON_COOLANT).marker(12, 14, "00"),
            Request::Tpms => Layout::fields(HYUNDAI_TPMS),
            Request::Cluster => Layout::fields(HYUNDAI_ODOMETER),
        }
    }
}

static IGPM: &[FlagSpec] = &[
    FlagSpec::new(16, 5, Flag::IgnitionOn),
    FlagSpec::new(18, 5, Flag::HeadLightsOn),
    FlagSpec::new(20, 5, Flag::BrakeLightsOn),
];

static VMCU_DRIVE: &[FieldSpec] = &[FieldSpec::new(32, 36, Field::SpeedKmh).times(0.0155)];

static VMCU_AUX: &[FieldSpec] = &[
    FieldSpec::new(46, 50, Field::AuxCurrentAmp).signed().times(-1.0).div(1000.0),
    FieldSpec::new(50, 52, Field::AuxPerc),
];

static BMS_STATUS: &[FieldSpec] = &[
    FieldSpec::new(16, 20, Field::AvailableChargePowerKw).div(100.0),
    FieldSpec::new(20, 24, Field::AvailableDischargePowerKw).div(100.0),
    FieldSpec::new(26, 30, Field::BatCurrentAmp).signed().times(-1.0).div(10.0),
    FieldSpec::new(30, 34, Field::BatVoltage).div(10.0),
    FieldSpec::new(48, 50, Field::BatCellMaxV).div(50.0),
    FieldSpec::new(50, 52, Field::BatInletC).signed(),
    FieldSpec::new(52, 54, Field::BatCellMinV).div(50.0),
    FieldSpec::new(60, 62, Field::BatFanStatus),
    FieldSpec::new(62, 64, Field::BatFanFeedbackHz),
    FieldSpec::new(64, 66, Field::AuxVoltage).div(10.0),
    FieldSpec::new(82, 90, Field::CumulativeChargedKwh).div(10.0),
    FieldSpec::new(90, 98, Field::CumulativeDischargedKwh).div(10.0),
    FieldSpec::new(112, 116, Field::MotorRpm),
    FieldSpec::new(118, 122, Field::IsolationResistanceKohm).signed(),
];

static BMS_STATUS_MODULES: &[RunSpec] = &[RunSpec::modules(0, 38, 4)];

static BMS_CELLS: [[RunSpec; 1]; 3] = [
    [RunSpec::cells(0, 14, 32, 50.0)],
    [RunSpec::cells(32, 14, 32, 50.0)],
    [RunSpec::cells(64, 14, 32, 50.0)],
];

static BMS_HEALTH: &[FieldSpec] = &[
    FieldSpec::new(52, 54, Field::BatHeaterC).signed(),
    FieldSpec::new(56, 60, Field::SohPerc).div(10.0),
    FieldSpec::new(68, 70, Field::SocPerc).div(2.0),
];

static BMS_HEALTH_RUNS: &[RunSpec] = &[
    RunSpec::modules(4, 22, 8),
    RunSpec::cells(96, 74, 2, 50.0),
];

static BMS_COOLANT: &[FieldSpec] = &[FieldSpec::new(14, 16, Field::CoolingWaterTempC).signed()];

static AIRCON_CABIN: &[FieldSpec] = &[
    FieldSpec::new(16, 18, Field::IndoorTempC).div(2.0).plus(-40.0),
    FieldSpec::new(18, 20, Field::OutdoorTempC).div(2.0).plus(-40.0),
];

static AIRCON_COOLANT: &[FieldSpec] =
    &[FieldSpec::new(14, 16, Field::CoolingWaterTempC).div(2.0).plus(-40.0)];

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
