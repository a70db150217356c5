//! BMW i3 (60 Ah / 120 Ah)
//!
//! Every module sits behind the gateway header `6F1`; the target ECU is
//! picked with the CAN extended address (`ATCEA`).

use super::{build_queue, request_key};
use crate::derive::{ConsumptionGuard, Derivations, TemperatureSource};
use crate::field::{DecodeOutcome, Field, FieldSpec, Layout};
use crate::model::VehicleProfile;
use obd_protocol::{CommandQueue, ObdError, ObdProtocol, Response};
use vehicle_telemetry::TelemetryRecord;

pub const DERIVATIONS: Derivations = Derivations {
    temperature: TemperatureSource::Reported,
    consumption: ConsumptionGuard::Positive,
    cell_extremes: false,
};

/// Battery management (SME)
const SME: u8 = 0x07;
/// Instrument cluster (KOMBI)
const KOMBI: u8 = 0x60;
/// Electric drive electronics (EDME)
const EDME: u8 = 0x78;

const POLL: &[&str] = &[
    "ATSH6F1",
    "ATCEA07", "22DD68", "22DD69", "22DDBC", "22DDC0", "22DD6C",
    "ATCEA60", "22D10D",
    "ATCEA78", "22DE8A",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    SmeVoltage,
    SmeCurrent,
    SmeSoc,
    SmeTemperatures,
    SmeCoolant,
    KombiOdometer,
    EdmeSpeed,
}

impl Request {
    pub fn from_response(response: &Response) -> Option<Self> {
        let (ecu, request) = request_key(response)?;
        if ecu != "6F1" {
            return None;
        }
        let request = match (response.extended_address?, request.as_str()) {
            (SME, "22DD68") => Request::SmeVoltage,
            (SME, "22DD69") => Request::SmeCurrent,
            (SME, "22DDBC") => Request::SmeSoc,
            (SME, "22DDC0") => Request::SmeTemperatures,
            (SME, "22DD6C") => Request::SmeCoolant,
            (KOMBI, "22D10D") => Request::KombiOdometer,
            (EDME, "22DE8A") => Request::EdmeSpeed,
            _ => return None,
        };
        Some(request)
    }

    pub fn layout(self) -> Layout {
        match self {
            Request::SmeVoltage => Layout::fields(SME_VOLTAGE),
            Request::SmeCurrent => Layout::fields(SME_CURRENT),
            Request::SmeSoc => Layout::fields(SME_SOC),
            Request::SmeTemperatures => Layout::fields(SME_TEMPERATURES),
            Request::SmeCoolant => Layout::fields(SME_COOLANT),
            Request::KombiOdometer => Layout::fields(KOMBI_ODOMETER),
            Request::EdmeSpeed => Layout::fields(EDME_SPEED),
        }
    }
}

static SME_VOLTAGE: &[FieldSpec] = &[FieldSpec::new(6, 10, Field::BatVoltage).div(100.0)];
static SME_CURRENT: &[FieldSpec] =
    &[FieldSpec::new(6, 14, Field::BatCurrentAmp).signed().div(100.0)];
static SME_SOC: &[FieldSpec] = &[FieldSpec::new(6, 10, Field::SocPerc).div(10.0)];
static SME_TEMPERATURES: &[FieldSpec] = &[
    FieldSpec::new(6, 10, Field::BatMinC).signed().div(100.0),
    FieldSpec::new(10, 14, Field::BatMaxC).signed().div(100.0),
    FieldSpec::new(14, 18, Field::BatTempC).signed().div(100.0),
];
static SME_COOLANT: &[FieldSpec] =
    &[FieldSpec::new(6, 10, Field::CoolingWaterTempC).signed().div(10.0)];
static KOMBI_ODOMETER: &[FieldSpec] = &[FieldSpec::new(6, 14, Field::OdoKm)];
static EDME_SPEED: &[FieldSpec] = &[FieldSpec::new(6, 10, Field::SpeedKmh).signed().div(10.0)];

pub fn command_queue(_profile: &VehicleProfile) -> Result<CommandQueue, ObdError> {
    build_queue(ObdProtocol::Iso15765Can11bit500, &[], POLL)
}

pub fn decode(response: &Response, record: &mut TelemetryRecord) -> DecodeOutcome {
    match Request::from_response(response) {
        Some(request) => request.layout().apply(&response.payload, record),
        None => DecodeOutcome::default(),
    }
}
