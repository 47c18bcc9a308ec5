//! Core business entities and the interfaces the core consumes.

pub mod charging;
pub mod evse;

pub use charging::{
    ChargingProfile, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod,
    CompositePeriod, CompositeSchedule, ProfileKind, ProfilePurpose, ProfileValidationResult,
    RecurrencyKind, NO_LIMIT, STATION_WIDE_EVSE_ID,
};
pub use evse::{CurrentPhaseType, EvseInfo, EvseRegistry, EvseTransaction, InMemoryEvseRegistry};
