//! Charging profile domain model (OCPP 2.0.1 K01/K08).

pub mod model;
pub mod validation;
pub mod wire;

pub use model::{
    ChargingProfile, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod,
    CompositePeriod, CompositeSchedule, ProfileKind, ProfilePurpose, RecurrencyKind,
    DAYS_PER_WEEK, DEFAULT_AND_MAX_NUMBER_PHASES, HOURS_PER_DAY, NO_LIMIT, SECONDS_PER_DAY,
    SECONDS_PER_HOUR, STATION_WIDE_EVSE_ID,
};
pub use validation::ProfileValidationResult;
pub use wire::WireError;
