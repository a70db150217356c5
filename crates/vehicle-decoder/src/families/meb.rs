//! Skoda Enyaq iV and VW ID.3 (MEB platform, 29 bit CAN)

use super::{build_queue, request_key};
use crate::derive::{ConsumptionGuard, Derivations, TemperatureSource};
use crate::field::{DecodeOutcome, Field, FieldSpec, Layout};
use crate::model::VehicleProfile;
use obd_protocol::{CommandQueue, ObdError, ObdProtocol, Response};
use vehicle_telemetry::TelemetryRecord;

pub const DERIVATIONS: Derivations = Derivations {
    temperature: TemperatureSource::Reported,
    consumption: ConsumptionGuard::Unavailable,
    cell_extremes: false,
};

const POLL: &[&str] = &[
    "ATSH17FC007B", "22028C", "221E3B", "221E3D", "221E0E", "222A0B", // BMS
    "ATSH17FC0076", "222203", // Cluster
    "ATSH17FC0010", "22F40D", // Gateway
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    BmsSoc,
    BmsVoltage,
    BmsCurrent,
    BmsTemperatures,
    BmsEnergy,
    ClusterOdometer,
    GatewaySpeed,
}

impl Request {
    pub fn from_response(response: &Response) -> Option<Self> {
        let (ecu, request) = request_key(response)?;
        let request = match (ecu.as_str(), request.as_str()) {
            ("17FC007B", "22028C") => Request::BmsSoc,
            ("17FC007B", "221E3B") => Request::BmsVoltage,
            ("17FC007B", "221E3D") => Request::BmsCurrent,
            ("17FC007B", "221E0E") => Request::BmsTemperatures,
            ("17FC007B", "222A0B") => Request::BmsEnergy,
            ("17FC0076", "222203") => Request::ClusterOdometer,
            ("17FC0010", "22F40D") => Request::GatewaySpeed,
            _ => return None,
        };
        Some(request)
    }

    pub fn layout(self) -> Layout {
        match self {
            Request::BmsSoc => Layout::fields(BMS_SOC),
            Request::BmsVoltage => Layout::fields(BMS_VOLTAGE),
            Request::BmsCurrent => Layout::fields(BMS_CURRENT),
            Request::BmsTemperatures => Layout::fields(BMS_TEMPERATURES),
            Request::BmsEnergy => Layout::fields(BMS_ENERGY),
            Request::ClusterOdometer => Layout::fields(CLUSTER_ODOMETER),
            Request::GatewaySpeed => Layout::fields(GATEWAY_SPEED),
        }
    }
}

static BMS_SOC: &[FieldSpec] = &[FieldSpec::new(6, 8, Field::SocPerc).div(2.5)];
static BMS_VOLTAGE: &[FieldSpec] = &[FieldSpec::new(6, 10, Field::BatVoltage).div(4.0)];
/// Offset binary, 0.01 A per bit around -1500 A
static BMS_CURRENT: &[FieldSpec] =
    &[FieldSpec::new(6, 12, Field::BatCurrentAmp).div(100.0).plus(-1500.0)];
static BMS_TEMPERATURES: &[FieldSpec] = &[
    FieldSpec::new(6, 10, Field::BatMaxC).signed().div(64.0),
    FieldSpec::new(10, 14, Field::BatMinC).signed().div(64.0),
    FieldSpec::new(14, 18, Field::BatTempC).signed().div(64.0),
];
/// Lifetime counters in Wh
static BMS_ENERGY: &[FieldSpec] = &[
    FieldSpec::new(6, 14, Field::CumulativeChargedKwh).div(1000.0),
    FieldSpec::new(14, 22, Field::CumulativeDischargedKwh).div(1000.0),
];
static CLUSTER_ODOMETER: &[FieldSpec] = &[FieldSpec::new(6, 12, Field::OdoKm)];
static GATEWAY_SPEED: &[FieldSpec] = &[FieldSpec::new(6, 8, Field::SpeedKmh)];

pub fn command_queue(_profile: &VehicleProfile) -> Result<CommandQueue, ObdError> {
    build_queue(ObdProtocol::Iso15765Can29bit500, &[], POLL)
}

pub fn decode(response: &Response, record: &mut TelemetryRecord) -> DecodeOutcome {
    match Request::from_response(response) {
        Some(request) => request.layout().apply(&response.payload, record),
        None => DecodeOutcome::default(),
    }
}
