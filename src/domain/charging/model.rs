//! ChargingProfile domain entities.
//!
//! The model mirrors the OCPP 2.0.1 `ChargingProfileType` family but keeps
//! the temporal mode as a tagged variant: `Recurring` carries its
//! recurrency, so a recurring profile without one cannot be represented at
//! all. Conversions to and from the wire schema live in
//! [`wire`](super::wire).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Profiles submitted with this EVSE id apply to the whole station.
pub const STATION_WIDE_EVSE_ID: i32 = 0;

pub const DEFAULT_AND_MAX_NUMBER_PHASES: i32 = 3;
pub const HOURS_PER_DAY: i64 = 24;
pub const SECONDS_PER_HOUR: i64 = 3600;
pub const SECONDS_PER_DAY: i64 = 86400;
pub const DAYS_PER_WEEK: i64 = 7;

/// Sentinel for "no imposed limit" inside composite calculations.
///
/// Never serialized: the OCPP adapter substitutes the configured default
/// limit before a composite schedule leaves the process.
pub const NO_LIMIT: f64 = f64::INFINITY;

/// Unit a charging-rate limit is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingRateUnit {
    Amps,
    Watts,
}

impl ChargingRateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amps => "A",
            Self::Watts => "W",
        }
    }
}

/// Category of a charging profile (K01: which layer of policy it belongs to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfilePurpose {
    ChargingStationExternalConstraints,
    ChargingStationMaxProfile,
    TxDefaultProfile,
    TxProfile,
}

impl ProfilePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChargingStationExternalConstraints => "ChargingStationExternalConstraints",
            Self::ChargingStationMaxProfile => "ChargingStationMaxProfile",
            Self::TxDefaultProfile => "TxDefaultProfile",
            Self::TxProfile => "TxProfile",
        }
    }
}

/// Recurrence cycle of a `Recurring` profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrencyKind {
    Daily,
    Weekly,
}

impl RecurrencyKind {
    pub fn cycle_seconds(&self) -> i64 {
        match self {
            Self::Daily => SECONDS_PER_DAY,
            Self::Weekly => DAYS_PER_WEEK * SECONDS_PER_DAY,
        }
    }
}

/// Temporal anchor mode of a profile's schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileKind {
    /// Schedules start at their literal `start_schedule`.
    Absolute,
    /// Schedules start when the target EVSE's transaction started.
    Relative,
    /// Schedules repeat daily or weekly from `start_schedule`.
    Recurring(RecurrencyKind),
}

/// One segment of a charging schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSchedulePeriod {
    /// Seconds since the owning schedule's start.
    pub start_period: i32,
    /// Charging-rate ceiling in the owning schedule's unit.
    pub limit: f64,
    /// 1..3; absent means 3 for AC EVSEs (defaulted at validation).
    pub number_phases: Option<i32>,
    /// Only meaningful when `number_phases == 1`.
    pub phase_to_use: Option<i32>,
}

/// One tariff curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSchedule {
    pub id: i32,
    pub charging_rate_unit: ChargingRateUnit,
    /// Non-empty, ordered by `start_period`; the first starts at 0.
    pub periods: Vec<ChargingSchedulePeriod>,
    /// Absent exactly when the owning profile is `Relative`.
    pub start_schedule: Option<DateTime<Utc>>,
    /// Seconds; absent means the last period extends indefinitely.
    pub duration: Option<i32>,
    pub min_charging_rate: Option<f64>,
}

/// One policy layer installed by the CSMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingProfile {
    /// Unique within the station.
    pub id: i32,
    /// Priority within a purpose; higher wins.
    pub stack_level: i32,
    pub purpose: ProfilePurpose,
    pub kind: ProfileKind,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    /// Required for `TxProfile`.
    pub transaction_id: Option<String>,
    /// At least one; the composite calculation consumes the first.
    pub schedules: Vec<ChargingSchedule>,
}

impl ChargingProfile {
    /// Whether the profile's validity window covers `t` (absent bounds are open).
    pub fn is_valid_at(&self, t: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if t < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if t >= to {
                return false;
            }
        }
        true
    }

    pub fn recurrency(&self) -> Option<RecurrencyKind> {
        match self.kind {
            ProfileKind::Recurring(kind) => Some(kind),
            _ => None,
        }
    }
}

/// One segment of a composite schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositePeriod {
    /// Seconds since `schedule_start`.
    pub start_period: i32,
    /// [`NO_LIMIT`] when no profile imposes a ceiling over this segment.
    pub limit: f64,
    pub number_phases: Option<i32>,
}

/// The flattened envelope derived from all applicable profiles for one EVSE
/// and time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSchedule {
    pub evse_id: i32,
    pub charging_rate_unit: ChargingRateUnit,
    pub schedule_start: DateTime<Utc>,
    /// Seconds covered by the schedule.
    pub duration: i32,
    /// Strictly increasing `start_period`, no two adjacent segments equal.
    pub periods: Vec<CompositePeriod>,
}

impl CompositeSchedule {
    pub fn end(&self) -> DateTime<Utc> {
        self.schedule_start + Duration::seconds(self.duration as i64)
    }
}
