//! SOC Decile Table
//!
//! Records cumulative energy, odometer and time the first time the state
//! of charge drops onto each `x9%` boundary (plus a 4% tail bucket), so
//! consumption between deciles can be computed afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Values captured when a decile boundary is crossed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecileSample {
    pub cumulative_charged_kwh: Option<f64>,
    pub cumulative_discharged_kwh: Option<f64>,
    pub odo_km: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Eleven write-once buckets. Index 0 is the 0-4% tail bucket, index
/// `n + 1` is the `n9%` crossing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocDecileTable {
    buckets: [Option<DecileSample>; SocDecileTable::BUCKETS],
}

impl SocDecileTable {
    pub const BUCKETS: usize = 11;

    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket recording a crossing onto `soc`, if `soc` sits on a boundary
    pub fn bucket_for(soc: f64) -> Option<usize> {
        if !(0.0..100.0).contains(&soc) {
            return None;
        }
        let whole = soc.floor() as usize;
        if whole == 4 {
            Some(0)
        } else if whole % 10 == 9 {
            Some(whole / 10 + 1)
        } else {
            None
        }
    }

    /// Record `sample` if SoC moved down from `previous` onto an empty
    /// boundary bucket. Returns whether a bucket was written.
    pub fn record(&mut self, previous: Option<f64>, soc: f64, sample: DecileSample) -> bool {
        let Some(previous) = previous else {
            return false;
        };
        if previous - soc <= 0.0 {
            return false;
        }
        let Some(index) = Self::bucket_for(soc) else {
            return false;
        };
        if self.buckets[index].is_some() {
            return false;
        }
        self.buckets[index] = Some(sample);
        true
    }

    pub fn get(&self, index: usize) -> Option<&DecileSample> {
        self.buckets.get(index).and_then(Option::as_ref)
    }

    pub fn buckets(&self) -> &[Option<DecileSample>] {
        &self.buckets
    }

    /// Energy discharged between two written buckets
    pub fn discharged_between(&self, upper: usize, lower: usize) -> Option<f64> {
        let upper = self.get(upper)?.cumulative_discharged_kwh?;
        let lower = self.get(lower)?.cumulative_discharged_kwh?;
        Some(lower - upper)
    }

    pub fn clear(&mut self) {
        self.buckets = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(discharged: f64) -> DecileSample {
        DecileSample {
            cumulative_charged_kwh: Some(100.0),
            cumulative_discharged_kwh: Some(discharged),
            odo_km: Some(1234.0),
            recorded_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_bucket_for() {
        assert_eq!(SocDecileTable::bucket_for(99.5), Some(10));
        assert_eq!(SocDecileTable::bucket_for(89.0), Some(9));
        assert_eq!(SocDecileTable::bucket_for(9.0), Some(1));
        assert_eq!(SocDecileTable::bucket_for(4.5), Some(0));
        assert_eq!(SocDecileTable::bucket_for(50.0), None);
        assert_eq!(SocDecileTable::bucket_for(100.0), None);
        assert_eq!(SocDecileTable::bucket_for(-1.0), None);
    }

    #[test]
    fn test_only_downward_crossings() {
        let mut table = SocDecileTable::new();
        assert!(!table.record(Some(88.5), 89.0, sample(1.0)));
        assert!(!table.record(None, 89.0, sample(1.0)));
        assert!(table.record(Some(90.0), 89.5, sample(1.0)));
    }

    #[test]
    fn test_write_once_until_clear() {
        let mut table = SocDecileTable::new();
        assert!(table.record(Some(80.0), 79.5, sample(10.0)));
        assert!(!table.record(Some(80.0), 79.0, sample(20.0)));
        assert_eq!(table.get(8).unwrap().cumulative_discharged_kwh, Some(10.0));

        table.clear();
        assert!(table.get(8).is_none());
        assert!(table.record(Some(80.0), 79.0, sample(20.0)));
        assert_eq!(table.get(8).unwrap().cumulative_discharged_kwh, Some(20.0));
    }

    #[test]
    fn test_discharged_between() {
        let mut table = SocDecileTable::new();
        table.record(Some(90.0), 89.5, sample(10.0));
        table.record(Some(80.0), 79.5, sample(16.5));
        assert_eq!(table.discharged_between(9, 8), Some(6.5));
        assert_eq!(table.discharged_between(9, 7), None);
    }
}
