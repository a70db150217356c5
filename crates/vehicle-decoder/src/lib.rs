//! Vehicle Response Decoding
//!
//! Turns raw ECU responses into the canonical [`TelemetryRecord`]: the
//! configured vehicle picks a family, the family maps `(ecu, command)`
//! pairs onto declarative byte layouts, and derived quantities are
//! refreshed after every successful decode.
//!
//! [`TelemetryRecord`]: vehicle_telemetry::TelemetryRecord

mod decoder;
mod derive;
mod field;
mod model;

pub mod families;
pub mod samples;

pub use decoder::{DecodeContext, Decoder};
pub use derive::{ConsumptionGuard, Derivations, TemperatureSource};
pub use field::{
    apply, DecodeOutcome, Field, FieldSpec, Flag, FlagSpec, Layout, Marker, RunSpec, RunTarget,
};
pub use model::{ModelError, VehicleFamily, VehicleModel, VehicleProfile};
