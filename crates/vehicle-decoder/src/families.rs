//! Vehicle families
//!
//! Each family module owns its command queue, the `(ecu, command)` pairs
//! it understands as an exhaustive `Request` enum, the byte layout of every
//! response and any post-decode fixups.

pub mod bmw_i3;
pub mod egmp;
pub mod hyundai_ioniq;
pub mod kia_eniro;
pub mod meb;
pub mod renault_zoe;

use crate::field::{Field, FieldSpec};
use obd_protocol::{CommandQueue, ObdError, ObdProtocol, Response};
use vehicle_telemetry::{TelemetryRecord, Wheel};

/// Adapter reset and formatting common to every vehicle
const ADAPTER_INIT: &[&str] = &["ATZ", "ATD", "ATE0", "ATL0", "ATS0", "ATH0", "ATCAF1"];

/// Build a queue: adapter init, protocol selection, `extra_init`, then
/// the repeating `poll` section
pub(crate) fn build_queue(
    protocol: ObdProtocol,
    extra_init: &[&str],
    poll: &[&str],
) -> Result<CommandQueue, ObdError> {
    let protocol = protocol.to_command().wire_text();
    let init: Vec<&str> = ADAPTER_INIT
        .iter()
        .copied()
        .chain(std::iter::once(protocol.as_str()))
        .chain(extra_init.iter().copied())
        .collect();
    CommandQueue::parse(&init, poll)
}

/// Upper-case `(ecu, request)` of a response, when both are known
pub(crate) fn request_key(response: &Response) -> Option<(String, String)> {
    let ecu = response.ecu.as_ref()?.as_str().to_ascii_uppercase();
    let request = response.request()?.to_ascii_uppercase();
    Some((ecu, request))
}

/// Pressure unit of the Hyundai/Kia TPMS module (psi / 14.5038, x5)
pub(crate) const TPMS_PRESSURE_DIVISOR: f64 = 72.51886900361;

/// Hyundai/Kia TPMS `22C00B`: pressure and temperature per wheel.
///
/// Each wheel is a 4-byte group starting at payload byte 7 (nibble 14),
/// in the order front-left, front-right, rear-right, rear-left. Byte 0
/// of a group is pressure in 0.2 psi steps (`raw / 5 / 14.5038` bar);
/// byte 1 is temperature in degrees C offset by 50.
pub(crate) static HYUNDAI_TPMS: &[FieldSpec] = &[
    FieldSpec::new(14, 16, Field::TirePressureBar(Wheel::FrontLeft)).div(TPMS_PRESSURE_DIVISOR),
    FieldSpec::new(16, 18, Field::TireTempC(Wheel::FrontLeft)).plus(-50.0),
    FieldSpec::new(22, 24, Field::TirePressureBar(Wheel::FrontRight)).div(TPMS_PRESSURE_DIVISOR),
    FieldSpec::new(24, 26, Field::TireTempC(Wheel::FrontRight)).plus(-50.0),
    FieldSpec::new(30, 32, Field::TirePressureBar(Wheel::RearRight)).div(TPMS_PRESSURE_DIVISOR),
    FieldSpec::new(32, 34, Field::TireTempC(Wheel::RearRight)).plus(-50.0),
    FieldSpec::new(38, 40, Field::TirePressureBar(Wheel::RearLeft)).div(TPMS_PRESSURE_DIVISOR),
    FieldSpec::new(40, 42, Field::TireTempC(Wheel::RearLeft)).plus(-50.0),
];

/// Hyundai/Kia instrument cluster `22B002`: odometer
pub(crate) static HYUNDAI_ODOMETER: &[FieldSpec] = &[FieldSpec::new(18, 24, Field::OdoKm)];

/// Hyundai/Kia VMCU speed, reset to zero when out of the plausible range
pub(crate) fn clamp_vmcu_speed(record: &mut TelemetryRecord) {
    if let Some(speed) = record.speed_kmh {
        if !(-99.0..=200.0).contains(&speed) {
            record.speed_kmh = Some(0.0);
        }
    }
}
