//! # Gridwell Charging
//!
//! OCPP 2.0.1 smart charging core (feature areas K01/K08) for a charging
//! station controller: accepts, validates and stores ChargingProfiles from
//! the CSMS, and flattens them into the composite schedule the station must
//! enforce.
//!
//! ## Architecture
//!
//! - **support**: Cross-cutting utilities (errors, clock)
//! - **domain**: Core entities (profiles, schedules, validation taxonomy,
//!   EVSE capability view) and the OCPP wire conversions
//! - **application**: Use-case logic (validator, profile store, composite
//!   schedule composer, façade)
//! - **infrastructure**: Durable profile persistence adapters
//! - **interfaces**: OCPP 2.0.1 message handlers
//! - **config**: Application configuration (TOML-based)
//!
//! Transport, metering, authorization and the EVSE hardware driver are the
//! embedding application's business; this crate consumes the narrow
//! [`EvseRegistry`] and [`ProfilePersistence`] interfaces and nothing else.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod support;

// Re-export commonly used types at crate root
pub use application::{
    ClearProfileCriteria, Composer, ProfileStore, ProfileValidator, ReportCriteria,
    SmartChargingService, TxDefaultScope,
};
pub use config::SmartChargingConfig;
pub use domain::charging::{
    ChargingProfile, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod, CompositePeriod,
    CompositeSchedule, ProfileKind, ProfilePurpose, ProfileValidationResult, RecurrencyKind,
    NO_LIMIT, STATION_WIDE_EVSE_ID,
};
pub use domain::evse::{
    CurrentPhaseType, EvseInfo, EvseRegistry, EvseTransaction, InMemoryEvseRegistry,
};
pub use infrastructure::persistence::{
    InMemoryPersistence, JsonFilePersistence, ProfilePersistence,
};
pub use interfaces::ocpp::OcppSmartCharging;
pub use support::clock::{Clock, FixedClock, SystemClock};
pub use support::errors::{OperationalError, PersistenceError};
