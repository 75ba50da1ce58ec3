//! Cita Client - booking client for the Cita API
//!
//! Session handling, a normalizing API gateway, and the two-step
//! schedule-then-pay booking flow built on top of it.

pub mod availability;
pub mod config;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod payment;
pub mod processing;
pub mod selection;
pub mod session;
pub mod transport;
pub mod views;

#[cfg(test)]
mod test_support;

pub use availability::{AvailabilityOutcome, AvailabilityResolver, Bucket, BucketPolicy, Period};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, ErrorCategory};
pub use flow::{BookingFlow, BookingStage, FlowState};
pub use gateway::ApiGateway;
pub use payment::{CardFormSubmission, LoadReport, PaymentState, PaymentStep, ProviderHandoff};
pub use processing::{ProcessingFlag, ProcessingGuard};
pub use selection::{ScheduleHandoff, Selection, SlotSelector};
pub use session::{
    FileSessionStore, InvalidationReason, MemorySessionStore, Session, SessionData, SessionEvent,
    SessionStore,
};
pub use transport::{NetworkTransport, Transport};
pub use views::{AppointmentTabs, AppointmentTicket, DaySchedule, SearchResultRow, WeeklySchedule};

// Re-export shared types for convenience
pub use shared::models;
