//! Derived fields
//!
//! Run after every response that wrote at least one field. Each step only
//! reads values that are known, so running them again on an unchanged
//! record changes nothing.

use chrono::{DateTime, Utc};
use vehicle_telemetry::TelemetryRecord;

/// Where the headline battery temperature comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSource {
    /// Coldest module; the module extremes become `bat_min_c`/`bat_max_c`
    ColdestModule,
    /// Mean of the known modules
    ModuleMean,
    /// Written directly by the decode tables
    Reported,
}

/// Speed condition under which consumption per 100 km is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionGuard {
    /// `speed > 10 km/h`
    AboveTenKmh,
    /// `speed != 0`
    NonZero,
    /// `speed > 0`
    Positive,
    /// The vehicle does not report consumption
    Unavailable,
}

impl ConsumptionGuard {
    pub fn allows(self, speed_kmh: f64) -> bool {
        match self {
            ConsumptionGuard::AboveTenKmh => speed_kmh > 10.0,
            ConsumptionGuard::NonZero => speed_kmh != 0.0,
            ConsumptionGuard::Positive => speed_kmh > 0.0,
            ConsumptionGuard::Unavailable => false,
        }
    }
}

/// Derived-field behavior of one vehicle family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivations {
    pub temperature: TemperatureSource,
    pub consumption: ConsumptionGuard,
    /// Compute cell min/max from the individual cells
    pub cell_extremes: bool,
}

impl Derivations {
    /// Recompute every derived quantity and feed the aggregators
    pub fn apply(&self, record: &mut TelemetryRecord, now: DateTime<Utc>) {
        self.update_temperatures(record);
        if self.cell_extremes {
            record.update_cell_extremes();
        }
        record.update_power();
        self.update_consumption(record);
        record.latch_start_values();
        record.update_charging_start(now);
        record.update_soc_deciles(now);
        record.update_charging_curve();
    }

    fn update_temperatures(&self, record: &mut TelemetryRecord) {
        match self.temperature {
            TemperatureSource::ColdestModule => {
                if let Some((min, _)) = record.update_temperature_extremes() {
                    record.bat_temp_c = Some(min);
                }
            }
            TemperatureSource::ModuleMean => {
                if record.update_temperature_extremes().is_some() {
                    let known: Vec<f64> = record.module_temps_c.iter().flatten().copied().collect();
                    record.bat_temp_c = Some(known.iter().sum::<f64>() / known.len() as f64);
                }
            }
            TemperatureSource::Reported => {}
        }
    }

    fn update_consumption(&self, record: &mut TelemetryRecord) {
        let (Some(power), Some(speed)) = (record.bat_power_kw, record.speed_kmh) else {
            return;
        };
        if self.consumption.allows(speed) {
            record.bat_power_kwh_100km = Some(power / speed * 100.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HYUNDAI: Derivations = Derivations {
        temperature: TemperatureSource::ColdestModule,
        consumption: ConsumptionGuard::AboveTenKmh,
        cell_extremes: false,
    };

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn test_guards() {
        assert!(!ConsumptionGuard::AboveTenKmh.allows(10.0));
        assert!(ConsumptionGuard::AboveTenKmh.allows(10.5));
        assert!(ConsumptionGuard::NonZero.allows(-3.0));
        assert!(!ConsumptionGuard::NonZero.allows(0.0));
        assert!(!ConsumptionGuard::Positive.allows(-3.0));
        assert!(!ConsumptionGuard::Unavailable.allows(100.0));
    }

    #[test]
    fn test_consumption_guarded_by_speed() {
        let mut record = TelemetryRecord::new(0, 0);
        record.bat_current_amp = Some(-50.0);
        record.bat_voltage = Some(360.0);
        record.speed_kmh = Some(5.0);
        HYUNDAI.apply(&mut record, now());
        assert_eq!(record.bat_power_kw, Some(-18.0));
        assert!(record.bat_power_kwh_100km.is_none());

        record.speed_kmh = Some(90.0);
        HYUNDAI.apply(&mut record, now());
        let consumption = record.bat_power_kwh_100km.unwrap();
        assert!((consumption + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_coldest_module_is_battery_temperature() {
        let mut record = TelemetryRecord::new(0, 3);
        record.set_module_temp(0, 21.0);
        record.set_module_temp(1, 18.0);
        HYUNDAI.apply(&mut record, now());
        assert_eq!(record.bat_min_c, Some(18.0));
        assert_eq!(record.bat_max_c, Some(21.0));
        assert_eq!(record.bat_temp_c, Some(18.0));
    }

    #[test]
    fn test_module_mean() {
        let derivations = Derivations {
            temperature: TemperatureSource::ModuleMean,
            ..HYUNDAI
        };
        let mut record = TelemetryRecord::new(0, 3);
        record.set_module_temp(0, 20.0);
        record.set_module_temp(2, 16.0);
        derivations.apply(&mut record, now());
        assert_eq!(record.bat_temp_c, Some(18.0));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut record = TelemetryRecord::new(2, 2);
        record.set_module_temp(0, 20.0);
        record.set_soc(50.0);
        record.bat_current_amp = Some(40.0);
        record.bat_voltage = Some(400.0);
        record.speed_kmh = Some(0.0);
        record.odo_km = Some(100.0);

        HYUNDAI.apply(&mut record, now());
        let once = record.clone();
        HYUNDAI.apply(&mut record, now());
        assert_eq!(record, once);
        assert!(record.charging_curve.get(50).is_some());
        assert_eq!(record.odo_km_start, Some(100.0));
    }
}
