//! Charging Curve
//!
//! Per-integer-SoC summary of a charging session: power envelope plus
//! battery, heater and coolant temperatures.

use serde::{Deserialize, Serialize};

/// Number of SoC buckets (0% to 100% inclusive)
pub const CURVE_BUCKETS: usize = 101;

/// One SoC bucket of the curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub min_power_kw: f64,
    pub max_power_kw: f64,
    pub min_bat_temp_c: Option<f64>,
    pub max_bat_temp_c: Option<f64>,
    pub heater_temp_c: Option<f64>,
    pub coolant_temp_c: Option<f64>,
}

/// Observation fed into the curve while charging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub soc_perc: f64,
    pub power_kw: f64,
    pub bat_min_c: Option<f64>,
    pub bat_max_c: Option<f64>,
    pub heater_c: Option<f64>,
    pub coolant_c: Option<f64>,
}

/// Charging curve for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingCurve {
    points: Vec<Option<CurvePoint>>,
}

impl Default for ChargingCurve {
    fn default() -> Self {
        Self {
            points: vec![None; CURVE_BUCKETS],
        }
    }
}

fn lower(stored: Option<f64>, seen: Option<f64>) -> Option<f64> {
    match (stored, seen) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn higher(stored: Option<f64>, seen: Option<f64>) -> Option<f64> {
    match (stored, seen) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl ChargingCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a sample into its bucket. Stored minimums never rise and
    /// stored maximums never fall. Returns `false` when SoC is outside
    /// `(0, 100]`.
    pub fn record(&mut self, sample: CurveSample) -> bool {
        if !(sample.soc_perc > 0.0 && sample.soc_perc <= 100.0) || !sample.power_kw.is_finite() {
            return false;
        }
        let index = sample.soc_perc.floor() as usize;

        let point = match self.points[index] {
            None => CurvePoint {
                min_power_kw: sample.power_kw,
                max_power_kw: sample.power_kw,
                min_bat_temp_c: sample.bat_min_c,
                max_bat_temp_c: sample.bat_max_c,
                heater_temp_c: sample.heater_c,
                coolant_temp_c: sample.coolant_c,
            },
            Some(stored) => CurvePoint {
                min_power_kw: stored.min_power_kw.min(sample.power_kw),
                max_power_kw: stored.max_power_kw.max(sample.power_kw),
                min_bat_temp_c: lower(stored.min_bat_temp_c, sample.bat_min_c),
                max_bat_temp_c: higher(stored.max_bat_temp_c, sample.bat_max_c),
                heater_temp_c: sample.heater_c.or(stored.heater_temp_c),
                coolant_temp_c: sample.coolant_c.or(stored.coolant_temp_c),
            },
        };
        self.points[index] = Some(point);
        true
    }

    pub fn get(&self, soc: usize) -> Option<&CurvePoint> {
        self.points.get(soc).and_then(Option::as_ref)
    }

    pub fn points(&self) -> &[Option<CurvePoint>] {
        &self.points
    }

    /// Highest power seen anywhere on the curve
    pub fn peak_power_kw(&self) -> Option<f64> {
        self.points
            .iter()
            .flatten()
            .map(|p| p.max_power_kw)
            .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.max(p))))
    }

    pub fn clear(&mut self) {
        self.points.iter_mut().for_each(|p| *p = None);
    }
}
