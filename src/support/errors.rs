//! Error types shared across the crate.
//!
//! Validation outcomes are *values* ([`ProfileValidationResult`]), not
//! errors; the enums here cover the operational failures that unwind a
//! request without killing the process.
//!
//! [`ProfileValidationResult`]: crate::domain::charging::ProfileValidationResult

use thiserror::Error;

/// Failures at the durable storage seam.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt profile record: {0}")]
    Corrupt(String),
}

/// Operational failures surfaced to the caller.
///
/// These never reach the wire protocol directly; the OCPP adapter maps them
/// to a `Rejected` response with a generic reason.
#[derive(Debug, Error)]
pub enum OperationalError {
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),

    #[error("EVSE {0} is not available")]
    EvseUnavailable(i32),

    #[error("Composite schedule calculation exceeded its deadline")]
    Timeout,

    #[error("Internal invariant violated for profile {profile_id}: {detail}")]
    InternalInvariantViolated { profile_id: i32, detail: String },
}
