//! Slot and staff selection for the schedule step

use chrono::NaiveDate;
use shared::models::{Business, Service, Slot};

use crate::{ClientError, ClientResult};

/// Identifies an expanded bucket; the date keeps days apart
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub date: NaiveDate,
    pub label: String,
}

/// The user's in-progress choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub date: NaiveDate,
    pub slot: Slot,
    pub staff_id: Option<String>,
}

impl Selection {
    pub fn is_complete(&self) -> bool {
        self.staff_id.is_some()
    }
}

/// Complete selection handed to the payment step
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleHandoff {
    pub date: NaiveDate,
    pub slot: Slot,
    pub staff_id: String,
    /// Deposit the user has to pay at least
    pub min_amount: f64,
}

/// Selector state
#[derive(Debug, Clone, Default)]
pub struct SlotSelector {
    date: Option<NaiveDate>,
    open_bucket: Option<BucketKey>,
    selection: Option<Selection>,
}

impl SlotSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn open_bucket(&self) -> Option<&BucketKey> {
        self.open_bucket.as_ref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn is_open(&self, date: NaiveDate, label: &str) -> bool {
        self.open_bucket
            .as_ref()
            .is_some_and(|k| k.date == date && k.label == label)
    }

    /// Expand a bucket, collapsing any other; toggling the open one closes it
    pub fn toggle_bucket(&mut self, date: NaiveDate, label: &str) {
        if self.is_open(date, label) {
            self.open_bucket = None;
        } else {
            self.open_bucket = Some(BucketKey {
                date,
                label: label.to_string(),
            });
        }
    }

    /// Select a slot, replacing any earlier choice
    ///
    /// A slot with exactly one eligible staff member assigns that member.
    pub fn select_slot(&mut self, date: NaiveDate, slot: &Slot) -> &Selection {
        let staff_id = slot.sole_staff().map(|s| s.id.clone());
        if slot.available_employees.is_empty() {
            tracing::warn!(date = %date, slot = %slot.time, "Selected a slot without eligible staff");
        }
        self.selection.insert(Selection {
            date,
            slot: slot.clone(),
            staff_id,
        })
    }

    /// Pick the staff member for the selected slot
    pub fn select_staff(&mut self, staff_id: &str) -> ClientResult<()> {
        let selection = self
            .selection
            .as_mut()
            .ok_or_else(|| ClientError::InvalidState("No slot selected".into()))?;
        if !selection.slot.is_eligible(staff_id) {
            return Err(ClientError::Validation(format!(
                "Staff member {} is not available at {}",
                staff_id,
                selection.slot.display_time()
            )));
        }
        selection.staff_id = Some(staff_id.to_string());
        Ok(())
    }

    /// Switch the date filter; slots are per date so the selection goes too
    pub fn change_date(&mut self, date: Option<NaiveDate>) {
        self.date = date;
        self.open_bucket = None;
        self.selection = None;
    }

    pub fn can_continue(&self) -> bool {
        self.selection.as_ref().is_some_and(Selection::is_complete)
    }

    /// Hand the complete selection to payment with the deposit for `service`
    pub fn continue_booking(
        &self,
        service: &Service,
        business: &Business,
    ) -> ClientResult<ScheduleHandoff> {
        let Some(Selection {
            date,
            slot,
            staff_id: Some(staff_id),
        }) = self.selection.clone()
        else {
            return Err(ClientError::InvalidState(
                "Select a time and a staff member first".into(),
            ));
        };

        let min_amount = service.minimum_deposit(business);
        tracing::debug!(
            service_id = %service.id,
            date = %date,
            slot = %slot.time,
            staff_id = %staff_id,
            min_amount,
            "Schedule selection complete"
        );
        Ok(ScheduleHandoff {
            date,
            slot,
            staff_id,
            min_amount,
        })
    }
}
