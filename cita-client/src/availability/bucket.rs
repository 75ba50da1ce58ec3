//! Period buckets for a day's slots
//!
//! Hours split at noon and 18:00. Two display policies exist:
//! fixed periods (always three buckets) and dynamic ranges (non-empty
//! buckets only, labelled by their first and last slot).

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use shared::models::Slot;

/// Time-of-day period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Morning,
    Afternoon,
    Evening,
}

impl Period {
    pub const ALL: [Period; 3] = [Self::Morning, Self::Afternoon, Self::Evening];

    /// `< 12` morning, `12..18` afternoon, `>= 18` evening
    pub fn of_hour(hour: u32) -> Self {
        match hour {
            0..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Morning => "Morning",
            Self::Afternoon => "Afternoon",
            Self::Evening => "Evening",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How slots are grouped for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketPolicy {
    /// Morning / Afternoon / Evening, all three always present
    FixedPeriods,
    /// Non-empty periods only, labelled `"09:00 - 11:30"`
    #[default]
    DynamicRanges,
}

impl FromStr for BucketPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed-periods" | "periods" => Ok(Self::FixedPeriods),
            "dynamic" | "dynamic-ranges" | "ranges" => Ok(Self::DynamicRanges),
            other => Err(format!("unknown bucket policy '{}'", other)),
        }
    }
}

/// Display group of slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub period: Period,
    /// Period name or time range depending on the policy
    pub label: String,
    /// Sorted by time
    pub slots: Vec<Slot>,
}

impl Bucket {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Partition `slots` into ordered buckets
///
/// Slots whose time does not parse are dropped with a warning.
pub fn bucketize(slots: &[Slot], policy: BucketPolicy) -> Vec<Bucket> {
    let mut timed: Vec<(NaiveTime, &Slot)> = slots
        .iter()
        .filter_map(|slot| match slot.parsed_time() {
            Ok(time) => Some((time, slot)),
            Err(e) => {
                tracing::warn!(slot = %slot.time, error = %e, "Dropping slot with unparsable time");
                None
            }
        })
        .collect();
    timed.sort_by_key(|(time, _)| *time);

    Period::ALL
        .iter()
        .filter_map(|&period| {
            let in_period: Vec<Slot> = timed
                .iter()
                .filter(|(time, _)| Period::of_hour(time.hour()) == period)
                .map(|(_, slot)| (*slot).clone())
                .collect();

            match policy {
                BucketPolicy::FixedPeriods => Some(Bucket {
                    period,
                    label: period.label().to_string(),
                    slots: in_period,
                }),
                BucketPolicy::DynamicRanges => {
                    let first = in_period.first()?.display_time();
                    let last = in_period.last()?.display_time();
                    Some(Bucket {
                        period,
                        label: format!("{} - {}", first, last),
                        slots: in_period,
                    })
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(times: &[&str]) -> Vec<Slot> {
        times
            .iter()
            .map(|t| Slot {
                time: t.to_string(),
                available_employees: vec![],
            })
            .collect()
    }

    fn times(bucket: &Bucket) -> Vec<&str> {
        bucket.slots.iter().map(|s| s.time.as_str()).collect()
    }

    #[test]
    fn test_boundary_hours() {
        let buckets = bucketize(
            &slots(&["11:59", "12:00", "17:59", "18:00"]),
            BucketPolicy::FixedPeriods,
        );
        assert_eq!(buckets.len(), 3);
        assert_eq!(times(&buckets[0]), ["11:59"]);
        assert_eq!(times(&buckets[1]), ["12:00", "17:59"]);
        assert_eq!(times(&buckets[2]), ["18:00"]);
    }

    #[test]
    fn test_period_of_hour() {
        assert_eq!(Period::of_hour(0), Period::Morning);
        assert_eq!(Period::of_hour(11), Period::Morning);
        assert_eq!(Period::of_hour(12), Period::Afternoon);
        assert_eq!(Period::of_hour(17), Period::Afternoon);
        assert_eq!(Period::of_hour(18), Period::Evening);
        assert_eq!(Period::of_hour(23), Period::Evening);
    }

    #[test]
    fn test_fixed_keeps_empty_periods() {
        let buckets = bucketize(&slots(&["09:00", "09:30"]), BucketPolicy::FixedPeriods);
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Morning", "Afternoon", "Evening"]);
        assert!(buckets[1].is_empty());
        assert!(buckets[2].is_empty());
    }

    #[test]
    fn test_dynamic_ranges() {
        let buckets = bucketize(
            &slots(&["18:30:00", "09:30:00", "09:00:00", "11:30:00", "19:00:00"]),
            BucketPolicy::DynamicRanges,
        );
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].period, Period::Morning);
        assert_eq!(buckets[0].label, "09:00 - 11:30");
        assert_eq!(times(&buckets[0]), ["09:00:00", "09:30:00", "11:30:00"]);
        assert_eq!(buckets[1].period, Period::Evening);
        assert_eq!(buckets[1].label, "18:30 - 19:00");
    }

    #[test]
    fn test_dynamic_single_slot_range() {
        let buckets = bucketize(&slots(&["14:00"]), BucketPolicy::DynamicRanges);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].label, "14:00 - 14:00");
    }

    #[test]
    fn test_unparsable_slots_are_dropped() {
        let buckets = bucketize(&slots(&["later", "10:00"]), BucketPolicy::DynamicRanges);
        assert_eq!(buckets.len(), 1);
        assert_eq!(times(&buckets[0]), ["10:00"]);
    }

    #[test]
    fn test_empty_day() {
        assert!(bucketize(&[], BucketPolicy::DynamicRanges).is_empty());
        assert_eq!(bucketize(&[], BucketPolicy::FixedPeriods).len(), 3);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("fixed".parse::<BucketPolicy>().unwrap(), BucketPolicy::FixedPeriods);
        assert_eq!(" Dynamic ".parse::<BucketPolicy>().unwrap(), BucketPolicy::DynamicRanges);
        assert!("hourly".parse::<BucketPolicy>().is_err());
    }
}
