//! Availability resolver
//!
//! Fetches candidate slots for a service, one query in flight at a time.
//! A new query cancels the previous one; whatever the old one produces
//! afterwards is reported as [`AvailabilityOutcome::Superseded`].

mod bucket;

pub use bucket::{Bucket, BucketPolicy, Period, bucketize};

use std::sync::Mutex;

use chrono::NaiveDate;
use shared::models::AvailabilityDay;
use tokio_util::sync::CancellationToken;

use crate::processing::ProcessingFlag;
use crate::transport::Transport;
use crate::{ApiGateway, ClientError};

/// Result of one availability query
#[derive(Debug)]
pub enum AvailabilityOutcome {
    /// At least one day came back
    Days(Vec<AvailabilityDay>),
    /// The query succeeded and there is nothing to book
    Empty,
    /// The query failed; not the same as "no availability"
    Unavailable(ClientError),
    /// A newer query started before this one finished
    Superseded,
}

impl AvailabilityOutcome {
    pub fn days(&self) -> &[AvailabilityDay] {
        match self {
            Self::Days(days) => days,
            _ => &[],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Single-flight availability resolver
pub struct AvailabilityResolver<T: Transport> {
    gateway: ApiGateway<T>,
    processing: ProcessingFlag,
    state: Mutex<InFlight>,
}

impl<T: Transport> AvailabilityResolver<T> {
    pub fn new(gateway: ApiGateway<T>, processing: ProcessingFlag) -> Self {
        Self {
            gateway,
            processing,
            state: Mutex::new(InFlight::default()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.lock().cancel.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InFlight> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancel the in-flight query, if any
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
    }

    /// Query slots for `service_id` on `date`, or the server's default
    /// window when `date` is `None`
    pub async fn resolve(&self, service_id: &str, date: Option<NaiveDate>) -> AvailabilityOutcome {
        let (generation, token) = {
            let mut state = self.lock();
            if let Some(previous) = state.cancel.take() {
                previous.cancel();
            }
            state.generation += 1;
            let token = CancellationToken::new();
            state.cancel = Some(token.clone());
            (state.generation, token)
        };

        tracing::debug!(service_id, date = ?date, generation, "Resolving availability");
        let result = {
            let _busy = self.processing.begin();
            self.gateway.availability(service_id, date, Some(&token)).await
        };

        {
            let mut state = self.lock();
            if state.generation != generation {
                tracing::debug!(service_id, generation, "Availability result superseded");
                return AvailabilityOutcome::Superseded;
            }
            state.cancel = None;
        }

        match result {
            Ok(days) if days.is_empty() => AvailabilityOutcome::Empty,
            Ok(days) => {
                tracing::debug!(service_id, days = days.len(), "Availability resolved");
                AvailabilityOutcome::Days(days)
            }
            Err(ClientError::Cancelled) => AvailabilityOutcome::Superseded,
            Err(e) => {
                tracing::warn!(service_id, date = ?date, error = %e, "Availability unavailable");
                AvailabilityOutcome::Unavailable(e)
            }
        }
    }
}
