//! Shared types for the cita booking client
//!
//! Wire models returned by the booking API, request DTOs sent to it,
//! and the money helpers used wherever amounts are compared or derived.
//! Every entity here is owned by the server; the client only holds
//! read-only snapshots.

pub mod error;
pub mod models;
pub mod money;
pub mod time;

// Re-exports
pub use error::{ModelError, ModelResult};
