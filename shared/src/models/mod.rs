//! Data models
//!
//! Mirrors of the booking API payloads. IDs are opaque strings (the
//! server issues UUIDs), amounts are `f64`, dates are chrono types.

pub mod appointment;
pub mod availability;
pub mod business;
pub mod payment;
pub mod user;

// Re-exports
pub use appointment::*;
pub use availability::*;
pub use business::*;
pub use payment::*;
pub use user::*;
