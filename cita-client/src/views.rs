//! Display views over fetched data
//!
//! Pure functions; nothing here talks to the API.

use chrono::{Datelike, NaiveDate, Weekday};
use shared::models::{Appointment, AppointmentStatus, BusinessSearchResult, Schedule};
use shared::{money, time};

// ============================================================================
// Weekly schedule
// ============================================================================

/// Opening hours of one weekday
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub weekday: Weekday,
    pub name: &'static str,
    pub is_closed: bool,
    /// `"09:00 - 13:00"` entries in record order
    pub intervals: Vec<String>,
    /// Whether any record exists for this day
    pub has_records: bool,
}

impl DaySchedule {
    pub fn summary(&self) -> String {
        if self.is_closed {
            "Closed".to_string()
        } else if self.intervals.is_empty() {
            "No schedule".to_string()
        } else {
            self.intervals.join(", ")
        }
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Monday-first week built from raw schedule records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: Vec<DaySchedule>,
}

impl WeeklySchedule {
    /// Group records by `day_of_week`
    ///
    /// The first record of a day decides whether it is closed; every open
    /// record contributes one interval.
    pub fn from_schedules(schedules: &[Schedule]) -> Self {
        let mut days: Vec<DaySchedule> = (0..7u8)
            .map(|idx| {
                let weekday = Weekday::try_from(idx).unwrap_or(Weekday::Mon);
                DaySchedule {
                    weekday,
                    name: weekday_name(weekday),
                    is_closed: false,
                    intervals: Vec::new(),
                    has_records: false,
                }
            })
            .collect();

        for schedule in schedules {
            let Some(day) = days.get_mut(usize::from(schedule.day_of_week)) else {
                tracing::warn!(day_of_week = schedule.day_of_week, "Ignoring schedule with invalid weekday");
                continue;
            };
            if !day.has_records {
                day.has_records = true;
                day.is_closed = schedule.is_closed;
            }
            if schedule.is_closed {
                continue;
            }
            match interval(schedule) {
                Some(interval) => day.intervals.push(interval),
                None => tracing::warn!(
                    day_of_week = schedule.day_of_week,
                    open = ?schedule.open_time,
                    close = ?schedule.close_time,
                    "Ignoring open schedule without valid times"
                ),
            }
        }

        Self { days }
    }

    pub fn days(&self) -> &[DaySchedule] {
        &self.days
    }

    pub fn day(&self, weekday: Weekday) -> &DaySchedule {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    pub fn today(&self, today: NaiveDate) -> &DaySchedule {
        self.day(today.weekday())
    }
}

fn interval(schedule: &Schedule) -> Option<String> {
    let open = time::parse_time_of_day(schedule.open_time.as_deref()?).ok()?;
    let close = time::parse_time_of_day(schedule.close_time.as_deref()?).ok()?;
    Some(format!("{} - {}", time::format_hhmm(open), time::format_hhmm(close)))
}

// ============================================================================
// Ticket
// ============================================================================

/// Confirmation ticket of a booked appointment
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentTicket {
    pub appointment_id: String,
    /// First group of the id
    pub reference: String,
    pub service_name: String,
    pub business_name: String,
    pub date: NaiveDate,
    /// `HH:MM`
    pub time: String,
    pub status: AppointmentStatus,
    pub total: f64,
    pub paid_online: f64,
    pub remaining_at_venue: f64,
}

impl From<&Appointment> for AppointmentTicket {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id.clone(),
            reference: appointment.short_reference().to_uppercase(),
            service_name: appointment
                .service
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| "Service".to_string()),
            business_name: appointment
                .business
                .as_ref()
                .map(|b| b.name.clone())
                .unwrap_or_default(),
            date: appointment.start_time.date(),
            time: time::format_hhmm(appointment.start_time.time()),
            status: appointment.status,
            total: appointment.total_amount,
            paid_online: appointment.paid_amount,
            remaining_at_venue: appointment.remaining_balance(),
        }
    }
}

impl AppointmentTicket {
    /// Printable lines, label and value
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Reference", format!("#{}", self.reference)),
            ("Service", self.service_name.clone()),
            ("Business", self.business_name.clone()),
            ("Date", self.date.format("%Y-%m-%d").to_string()),
            ("Time", self.time.clone()),
            ("Status", self.status.to_string()),
            ("Paid online", money::format_amount(self.paid_online)),
            ("To pay at venue", money::format_amount(self.remaining_at_venue)),
        ]
    }
}

// ============================================================================
// My appointments
// ============================================================================

/// "My appointments" split into status tabs
#[derive(Debug, Clone, Default)]
pub struct AppointmentTabs {
    appointments: Vec<Appointment>,
}

impl AppointmentTabs {
    /// Appointments are kept sorted by start time
    pub fn new(mut appointments: Vec<Appointment>) -> Self {
        appointments.sort_by_key(|a| a.start_time);
        Self { appointments }
    }

    pub fn all(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn tab(&self, status: AppointmentStatus) -> Vec<&Appointment> {
        self.appointments
            .iter()
            .filter(|a| a.status == status)
            .collect()
    }

    /// Tab order with counts
    pub fn counts(&self) -> Vec<(AppointmentStatus, usize)> {
        AppointmentStatus::ALL
            .iter()
            .map(|&status| (status, self.tab(status).len()))
            .collect()
    }

    /// Deep link lookup
    pub fn find(&self, id: &str) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    /// Deposit still owed, never negative
    pub fn outstanding_deposit(appointment: &Appointment) -> f64 {
        appointment.outstanding_deposit()
    }

    /// Pending appointments that still owe part of their deposit
    pub fn payable(&self) -> Vec<&Appointment> {
        self.tab(AppointmentStatus::Pending)
            .into_iter()
            .filter(|a| Self::outstanding_deposit(a) > 0.0)
            .collect()
    }
}

// ============================================================================
// Search
// ============================================================================

/// One line of business search results
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultRow {
    pub id: String,
    pub name: String,
    /// Slug used to open the business page
    pub slug: Option<String>,
    pub address: String,
    /// `"1.2 km"` when the search had coordinates
    pub distance: Option<String>,
}

impl From<&BusinessSearchResult> for SearchResultRow {
    fn from(result: &BusinessSearchResult) -> Self {
        Self {
            id: result.id.clone(),
            name: result.name.clone(),
            slug: result.slug.clone(),
            address: result.address.clone().unwrap_or_default(),
            distance: result.distance_km.map(|km| format!("{:.1} km", km)),
        }
    }
}
