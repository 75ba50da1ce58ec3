//! Appointment Model

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Appointment status, driven by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        Self::Confirmed,
        Self::Pending,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service fields embedded in appointment listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSummary {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Business fields embedded in appointment listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSummary {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Appointment entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub business_id: String,
    pub service_id: String,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(with = "crate::time::flexible_timestamp")]
    pub start_time: NaiveDateTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub paid_amount: f64,
    #[serde(default)]
    pub required_deposit: f64,
    #[serde(default)]
    pub service: Option<ServiceSummary>,
    #[serde(default)]
    pub business: Option<BusinessSummary>,
}

impl Appointment {
    /// Deposit still owed before the appointment counts as secured
    pub fn outstanding_deposit(&self) -> f64 {
        crate::money::remaining(self.required_deposit, self.paid_amount)
    }

    /// Amount left to pay at the venue
    pub fn remaining_balance(&self) -> f64 {
        crate::money::remaining(self.total_amount, self.paid_amount)
    }

    /// First group of the id, used as a short reference
    pub fn short_reference(&self) -> &str {
        self.id.split('-').next().unwrap_or(&self.id)
    }
}

/// Create appointment payload (`POST /appointments/place`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceAppointmentRequest {
    pub business_id: String,
    pub service_id: String,
    pub client_id: Option<String>,
    pub staff_id: String,
    /// `YYYY-MM-DDTHH:MM:SS`
    pub start_time: String,
    pub notes: String,
}

/// `POST /appointments/place` response; only the id is relied on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedAppointment {
    pub id: String,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}
