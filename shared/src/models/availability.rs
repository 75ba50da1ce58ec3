//! Availability Model
//!
//! Produced fresh by `GET /services/{id}/availability` for every query.
//! The client never mutates slots; it only partitions them for display.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::time::{format_hhmm, parse_time_of_day};

/// Staff member eligible for a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Bookable time of day with the staff who can perform the service then
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// `HH:MM` or `HH:MM:SS`
    pub time: String,
    #[serde(default, alias = "staff")]
    pub available_employees: Vec<StaffMember>,
}

impl Slot {
    pub fn parsed_time(&self) -> ModelResult<NaiveTime> {
        parse_time_of_day(&self.time)
    }

    /// `HH:MM`, falling back to the raw string when it does not parse
    pub fn display_time(&self) -> String {
        self.parsed_time()
            .map(format_hhmm)
            .unwrap_or_else(|_| self.time.clone())
    }

    pub fn is_eligible(&self, staff_id: &str) -> bool {
        self.available_employees.iter().any(|s| s.id == staff_id)
    }

    /// The only eligible staff member, if there is exactly one
    pub fn sole_staff(&self) -> Option<&StaffMember> {
        match self.available_employees.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// One day of candidate slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub day_name: String,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl AvailabilityDay {
    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn slot(&self, time: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.time == time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(time: &str, staff: &[&str]) -> Slot {
        Slot {
            time: time.into(),
            available_employees: staff
                .iter()
                .map(|id| StaffMember {
                    id: id.to_string(),
                    name: format!("Staff {}", id),
                })
                .collect(),
        }
    }

    #[test]
    fn test_slot_time_and_display() {
        let s = slot("09:00:00", &["A"]);
        assert_eq!(s.parsed_time().unwrap(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(s.display_time(), "09:00");
        assert!(slot("nine", &[]).parsed_time().is_err());
        assert_eq!(slot("nine", &[]).display_time(), "nine");
    }

    #[test]
    fn test_sole_staff() {
        assert_eq!(slot("09:00", &["A"]).sole_staff().unwrap().id, "A");
        assert!(slot("09:00", &["A", "B"]).sole_staff().is_none());
        assert!(slot("09:00", &[]).sole_staff().is_none());
    }

    #[test]
    fn test_deserialize_day() {
        let json = r#"{
            "date": "2025-03-14",
            "day_name": "Viernes",
            "slots": [
                {"time": "09:00", "available_employees": [{"id": "A", "name": "Ana"}]},
                {"time": "09:30", "staff": [{"id": "A", "name": "Ana"}, {"id": "B", "name": "Beto"}]}
            ]
        }"#;
        let day: AvailabilityDay = serde_json::from_str(json).unwrap();
        assert!(day.has_slots());
        assert_eq!(day.slot("09:30").unwrap().available_employees.len(), 2);
        assert!(day.slot("09:30").unwrap().is_eligible("B"));
        assert!(!day.slot("09:00").unwrap().is_eligible("B"));
    }
}
