//! Vehicle Telemetry
//!
//! The live data model shared by the decoder and its consumers, plus the
//! session aggregates derived from it.

mod charging;
mod deciles;
mod record;

pub use charging::{ChargingCurve, CurvePoint, CurveSample, CURVE_BUCKETS};
pub use deciles::{DecileSample, SocDecileTable};
pub use record::{
    TelemetryRecord, TelemetrySnapshot, TireState, Wheel, CHARGING_MAX_SPEED_KMH,
    CHARGING_MIN_POWER_KW,
};
