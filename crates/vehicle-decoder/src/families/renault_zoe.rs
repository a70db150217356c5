//! Renault Zoe ZE40 / ZE50

use super::{build_queue, request_key};
use crate::derive::{ConsumptionGuard, Derivations, TemperatureSource};
use crate::field::{DecodeOutcome, Field, FieldSpec, Layout, RunSpec};
use crate::model::VehicleProfile;
use obd_protocol::{CommandQueue, ObdError, ObdProtocol, Response};
use vehicle_telemetry::TelemetryRecord;

pub const DERIVATIONS: Derivations = Derivations {
    temperature: TemperatureSource::ModuleMean,
    consumption: ConsumptionGuard::NonZero,
    cell_extremes: true,
};

const POLL: &[&str] = &[
    "ATSH7E4", "222002", "222003", "222005", "223206", "22300F", // EVC
    "ATSH79B", "2101", "2103", "2104", "2141", "2142", // LBC
    "ATSH743", "220206", // Cluster
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// EVC `7E4 222002`
    EvcSoc,
    /// EVC `7E4 222003`
    EvcSpeed,
    /// EVC `7E4 222005`
    EvcAuxVoltage,
    /// EVC `7E4 223206`
    EvcSoh,
    /// EVC `7E4 22300F`
    EvcChargePower,
    /// LBC `79B 2101`: current, voltage, energy counters
    LbcStatus,
    /// LBC `79B 2103`
    LbcIsolation,
    /// LBC `79B 2104`: module temperatures
    LbcTemperatures,
    /// LBC `79B 2141`: cells 0..61
    LbcCellsLow,
    /// LBC `79B 2142`: cells 62..95
    LbcCellsHigh,
    /// Cluster `743 220206`
    Cluster,
}

impl Request {
    pub fn from_response(response: &Response) -> Option<Self> {
        let (ecu, request) = request_key(response)?;
        let request = match (ecu.as_str(), request.as_str()) {
            ("7E4", "222002") => Request::EvcSoc,
            ("7E4", "222003") => Request::EvcSpeed,
            ("7E4", "222005") => Request::EvcAuxVoltage,
            ("7E4", "223206") => Request::EvcSoh,
            ("7E4", "22300F") => Request::EvcChargePower,
            ("79B", "2101") => Request::LbcStatus,
            ("79B", "2103") => Request::LbcIsolation,
            ("79B", "2104") => Request::LbcTemperatures,
            ("79B", "2141") => Request::LbcCellsLow,
            ("79B", "2142") => Request::LbcCellsHigh,
            ("743", "220206") => Request::Cluster,
            _ => return None,
        };
        Some(request)
    }

    pub fn layout(self) -> Layout {
        match self {
            Request::EvcSoc => Layout::fields(EVC_SOC),
            Request::EvcSpeed => Layout::fields(EVC_SPEED),
            Request::EvcAuxVoltage => Layout::fields(EVC_AUX_VOLTAGE),
            Request::EvcSoh => Layout::fields(EVC_SOH),
            Request::EvcChargePower => Layout::fields(EVC_CHARGE_POWER),
            Request::LbcStatus => Layout::fields(LBC_STATUS),
            Request::LbcIsolation => Layout::fields(LBC_ISOLATION),
            Request::LbcTemperatures => Layout::EMPTY.runs(LBC_TEMPERATURES),
            Request::LbcCellsLow => Layout::EMPTY.runs(LBC_CELLS_LOW),
            Request::LbcCellsHigh => Layout::EMPTY.runs(LBC_CELLS_HIGH),
            Request::Cluster => Layout::fields(CLUSTER),
        }
    }
}

static EVC_SOC: &[FieldSpec] = &[FieldSpec::new(6, 10, Field::SocPerc).div(50.0)];
static EVC_SPEED: &[FieldSpec] = &[FieldSpec::new(6, 10, Field::SpeedKmh).div(100.0)];
static EVC_AUX_VOLTAGE: &[FieldSpec] = &[FieldSpec::new(6, 10, Field::AuxVoltage).div(100.0)];
static EVC_SOH: &[FieldSpec] = &[FieldSpec::new(6, 8, Field::SohPerc)];
static EVC_CHARGE_POWER: &[FieldSpec] =
    &[FieldSpec::new(6, 10, Field::AvailableChargePowerKw).div(100.0)];

static LBC_STATUS: &[FieldSpec] = &[
    FieldSpec::new(4, 8, Field::BatCurrentAmp).signed().div(10.0),
    FieldSpec::new(8, 12, Field::BatVoltage).div(10.0),
    FieldSpec::new(12, 20, Field::CumulativeChargedKwh).div(10.0),
    FieldSpec::new(20, 28, Field::CumulativeDischargedKwh).div(10.0),
];

static LBC_ISOLATION: &[FieldSpec] = &[FieldSpec::new(4, 8, Field::IsolationResistanceKohm)];

/// Twelve modules, three bytes each, temperature in the first byte
static LBC_TEMPERATURES: &[RunSpec] =
    &[RunSpec::modules(0, 8, 12).stride(6, 2).unsigned().plus(-40.0)];

/// Millivolts, two bytes per cell
static LBC_CELLS_LOW: &[RunSpec] = &[RunSpec::cells(0, 4, 62, 1000.0).stride(4, 4)];
static LBC_CELLS_HIGH: &[RunSpec] = &[RunSpec::cells(62, 4, 34, 1000.0).stride(4, 4)];

static CLUSTER: &[FieldSpec] = &[FieldSpec::new(6, 14, Field::OdoKm)];

pub fn command_queue(_profile: &VehicleProfile) -> Result<CommandQueue, ObdError> {
    build_queue(ObdProtocol::Iso15765Can11bit500, &[], POLL)
}

pub fn decode(response: &Response, record: &mut TelemetryRecord) -> DecodeOutcome {
    match Request::from_response(response) {
        Some(request) => request.layout().apply(&response.payload, record),
        None => DecodeOutcome::default(),
    }
}
