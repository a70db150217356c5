//! Supported vehicles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown vehicle model {0:?}")]
    Unknown(String),
}

/// Decoder family shared by vehicles with the same ECU layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleFamily {
    /// Kia e-Niro, Hyundai Kona EV, Kia e-Soul
    KiaEniro,
    HyundaiIoniq,
    /// Hyundai Ioniq 5, Kia EV6
    Egmp,
    RenaultZoe,
    BmwI3,
    /// Skoda Enyaq, VW ID.3
    Meb,
}

impl VehicleFamily {
    pub const ALL: [VehicleFamily; 6] = [
        VehicleFamily::KiaEniro,
        VehicleFamily::HyundaiIoniq,
        VehicleFamily::Egmp,
        VehicleFamily::RenaultZoe,
        VehicleFamily::BmwI3,
        VehicleFamily::Meb,
    ];
}

/// Static facts about one trim
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleProfile {
    pub name: &'static str,
    pub family: VehicleFamily,
    /// Usable battery capacity
    pub battery_kwh: f64,
    pub cell_count: usize,
    pub module_count: usize,
}

/// Vehicle selected once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleModel {
    #[serde(rename = "kia-eniro-64")]
    KiaEniro64,
    #[serde(rename = "kia-eniro-39")]
    KiaEniro39,
    #[serde(rename = "hyundai-kona-64")]
    HyundaiKona64,
    #[serde(rename = "hyundai-kona-39")]
    HyundaiKona39,
    #[serde(rename = "kia-esoul-64")]
    KiaESoul64,
    #[serde(rename = "hyundai-ioniq-28")]
    HyundaiIoniq28,
    #[serde(rename = "hyundai-ioniq5-58")]
    HyundaiIoniq5Sr58,
    #[serde(rename = "hyundai-ioniq5-72")]
    HyundaiIoniq5Lr72,
    #[serde(rename = "hyundai-ioniq5-77")]
    HyundaiIoniq5Lr77,
    #[serde(rename = "kia-ev6-58")]
    KiaEv6Sr58,
    #[serde(rename = "kia-ev6-77")]
    KiaEv6Lr77,
    #[serde(rename = "renault-zoe-ze40")]
    RenaultZoeZe40,
    #[serde(rename = "renault-zoe-ze50")]
    RenaultZoeZe50,
    #[serde(rename = "bmw-i3-60ah")]
    BmwI3_60Ah,
    #[serde(rename = "bmw-i3-120ah")]
    BmwI3_120Ah,
    #[serde(rename = "skoda-enyaq-62")]
    SkodaEnyaq62,
    #[serde(rename = "vw-id3-58")]
    VwId3_58,
}

impl VehicleModel {
    pub const ALL: [VehicleModel; 17] = [
        VehicleModel::KiaEniro64,
        VehicleModel::KiaEniro39,
        VehicleModel::HyundaiKona64,
        VehicleModel::HyundaiKona39,
        VehicleModel::KiaESoul64,
        VehicleModel::HyundaiIoniq28,
        VehicleModel::HyundaiIoniq5Sr58,
        VehicleModel::HyundaiIoniq5Lr72,
        VehicleModel::HyundaiIoniq5Lr77,
        VehicleModel::KiaEv6Sr58,
        VehicleModel::KiaEv6Lr77,
        VehicleModel::RenaultZoeZe40,
        VehicleModel::RenaultZoeZe50,
        VehicleModel::BmwI3_60Ah,
        VehicleModel::BmwI3_120Ah,
        VehicleModel::SkodaEnyaq62,
        VehicleModel::VwId3_58,
    ];

    /// Identifier used in configuration files
    pub fn id(self) -> &'static str {
        match self {
            VehicleModel::KiaEniro64 => "kia-eniro-64",
            VehicleModel::KiaEniro39 => "kia-eniro-39",
            VehicleModel::HyundaiKona64 => "hyundai-kona-64",
            VehicleModel::HyundaiKona39 => "hyundai-kona-39",
            VehicleModel::KiaESoul64 => "kia-esoul-64",
            VehicleModel::HyundaiIoniq28 => "hyundai-ioniq-28",
            VehicleModel::HyundaiIoniq5Sr58 => "hyundai-ioniq5-58",
            VehicleModel::HyundaiIoniq5Lr72 => "hyundai-ioniq5-72",
            VehicleModel::HyundaiIoniq5Lr77 => "hyundai-ioniq5-77",
            VehicleModel::KiaEv6Sr58 => "kia-ev6-58",
            VehicleModel::KiaEv6Lr77 => "kia-ev6-77",
            VehicleModel::RenaultZoeZe40 => "renault-zoe-ze40",
            VehicleModel::RenaultZoeZe50 => "renault-zoe-ze50",
            VehicleModel::BmwI3_60Ah => "bmw-i3-60ah",
            VehicleModel::BmwI3_120Ah => "bmw-i3-120ah",
            VehicleModel::SkodaEnyaq62 => "skoda-enyaq-62",
            VehicleModel::VwId3_58 => "vw-id3-58",
        }
    }

    pub fn profile(self) -> VehicleProfile {
        use VehicleFamily::*;
        let (name, family, battery_kwh, cell_count, module_count) = match self {
            VehicleModel::KiaEniro64 => ("Kia e-Niro 64 kWh", KiaEniro, 64.0, 98, 12),
            VehicleModel::KiaEniro39 => ("Kia e-Niro 39 kWh", KiaEniro, 39.2, 90, 12),
            VehicleModel::HyundaiKona64 => ("Hyundai Kona EV 64 kWh", KiaEniro, 64.0, 98, 12),
            VehicleModel::HyundaiKona39 => ("Hyundai Kona EV 39 kWh", KiaEniro, 39.2, 90, 12),
            VehicleModel::KiaESoul64 => ("Kia e-Soul 64 kWh", KiaEniro, 64.0, 98, 12),
            VehicleModel::HyundaiIoniq28 => ("Hyundai Ioniq 28 kWh", HyundaiIoniq, 28.0, 96, 12),
            VehicleModel::HyundaiIoniq5Sr58 => ("Hyundai Ioniq 5 58 kWh", Egmp, 58.0, 144, 16),
            VehicleModel::HyundaiIoniq5Lr72 => ("Hyundai Ioniq 5 72.6 kWh", Egmp, 72.6, 180, 16),
            VehicleModel::HyundaiIoniq5Lr77 => ("Hyundai Ioniq 5 77.4 kWh", Egmp, 77.4, 192, 16),
            VehicleModel::KiaEv6Sr58 => ("Kia EV6 58 kWh", Egmp, 58.0, 144, 16),
            VehicleModel::KiaEv6Lr77 => ("Kia EV6 77.4 kWh", Egmp, 77.4, 192, 16),
            VehicleModel::RenaultZoeZe40 => ("Renault Zoe ZE40", RenaultZoe, 41.0, 96, 12),
            VehicleModel::RenaultZoeZe50 => ("Renault Zoe ZE50", RenaultZoe, 52.0, 96, 12),
            VehicleModel::BmwI3_60Ah => ("BMW i3 60 Ah", BmwI3, 18.8, 96, 8),
            VehicleModel::BmwI3_120Ah => ("BMW i3 120 Ah", BmwI3, 37.9, 96, 8),
            VehicleModel::SkodaEnyaq62 => ("Skoda Enyaq iV 62 kWh", Meb, 58.0, 96, 8),
            VehicleModel::VwId3_58 => ("VW ID.3 58 kWh", Meb, 58.0, 108, 9),
        };
        VehicleProfile {
            name,
            family,
            battery_kwh,
            cell_count,
            module_count,
        }
    }

    pub fn family(self) -> VehicleFamily {
        self.profile().family
    }
}

impl fmt::Display for VehicleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

impl FromStr for VehicleModel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleModel::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::Unknown(s.to_string()))
    }
}
