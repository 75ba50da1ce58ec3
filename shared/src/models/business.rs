//! Business Model

use serde::{Deserialize, Serialize};

/// Business entity with its weekly schedule and bookable services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Default deposit share (0-100) for services without an override
    #[serde(default)]
    pub deposit_percentage: Option<f64>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Business {
    /// Look up one of this business's services
    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == service_id)
    }
}

/// One weekly opening record
///
/// `day_of_week` is 0 for Monday through 6 for Sunday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub day_of_week: u8,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
}

/// Bookable service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "duration")]
    pub duration_minutes: Option<u32>,
    pub price: f64,
    /// Per-service deposit share (0-100), overrides the business default
    #[serde(default)]
    pub deposit_percentage: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Service {
    /// Deposit share for this service: service override, then business
    /// default, then zero
    pub fn effective_deposit_percentage(&self, business: &Business) -> f64 {
        self.deposit_percentage
            .or(business.deposit_percentage)
            .unwrap_or(0.0)
    }

    /// Minimum amount to pay upfront when booking this service
    pub fn minimum_deposit(&self, business: &Business) -> f64 {
        crate::money::deposit_amount(self.price, self.effective_deposit_percentage(business))
    }
}

/// Row of `GET /businesses/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSearchResult {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Distance from the query point, when coordinates were given
    #[serde(default)]
    pub distance_km: Option<f64>,
}

/// Query for `GET /businesses/search`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessSearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

impl BusinessSearchQuery {
    pub fn text(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Default::default()
        }
    }

    pub fn near(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }
}
