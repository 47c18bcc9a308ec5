//! Conversions between the domain model and `rust_ocpp::v2_0_1` wire types.
//!
//! Encoding is total. Decoding is fallible: a payload that satisfies the
//! JSON schema can still be unrepresentable in the domain model (a
//! `Recurring` profile without a `recurrencyKind`, or an empty
//! `chargingSchedule` list). Those fail here, before validation ever runs.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_ocpp::v2_0_1::datatypes::charging_profile_type::ChargingProfileType;
use rust_ocpp::v2_0_1::datatypes::charging_schedule_period_type::ChargingSchedulePeriodType;
use rust_ocpp::v2_0_1::datatypes::charging_schedule_type::ChargingScheduleType;
use rust_ocpp::v2_0_1::datatypes::composite_schedule_type::CompositeScheduleType;
use rust_ocpp::v2_0_1::enumerations::charging_profile_kind_enum_type::ChargingProfileKindEnumType;
use rust_ocpp::v2_0_1::enumerations::charging_profile_purpose_enum_type::ChargingProfilePurposeEnumType;
use rust_ocpp::v2_0_1::enumerations::charging_rate_unit_enum_type::ChargingRateUnitEnumType;
use rust_ocpp::v2_0_1::enumerations::recurrency_kind_enum_type::RecurrencyKindEnumType;
use thiserror::Error;

use super::model::{
    ChargingProfile, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod,
    CompositeSchedule, ProfileKind, ProfilePurpose, RecurrencyKind,
};

/// A wire payload that cannot be represented in the domain model.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("profile {profile_id} is Recurring but carries no recurrencyKind")]
    MissingRecurrencyKind { profile_id: i32 },

    #[error("profile {profile_id} has no charging schedule")]
    EmptyChargingSchedule { profile_id: i32 },
}

pub fn unit_to_ocpp(unit: ChargingRateUnit) -> ChargingRateUnitEnumType {
    match unit {
        ChargingRateUnit::Amps => ChargingRateUnitEnumType::A,
        ChargingRateUnit::Watts => ChargingRateUnitEnumType::W,
    }
}

pub fn unit_from_ocpp(unit: ChargingRateUnitEnumType) -> ChargingRateUnit {
    match unit {
        ChargingRateUnitEnumType::A => ChargingRateUnit::Amps,
        ChargingRateUnitEnumType::W => ChargingRateUnit::Watts,
    }
}

pub fn purpose_to_ocpp(purpose: ProfilePurpose) -> ChargingProfilePurposeEnumType {
    match purpose {
        ProfilePurpose::ChargingStationExternalConstraints => {
            ChargingProfilePurposeEnumType::ChargingStationExternalConstraints
        }
        ProfilePurpose::ChargingStationMaxProfile => {
            ChargingProfilePurposeEnumType::ChargingStationMaxProfile
        }
        ProfilePurpose::TxDefaultProfile => ChargingProfilePurposeEnumType::TxDefaultProfile,
        ProfilePurpose::TxProfile => ChargingProfilePurposeEnumType::TxProfile,
    }
}

pub fn purpose_from_ocpp(purpose: ChargingProfilePurposeEnumType) -> ProfilePurpose {
    match purpose {
        ChargingProfilePurposeEnumType::ChargingStationExternalConstraints => {
            ProfilePurpose::ChargingStationExternalConstraints
        }
        ChargingProfilePurposeEnumType::ChargingStationMaxProfile => {
            ProfilePurpose::ChargingStationMaxProfile
        }
        ChargingProfilePurposeEnumType::TxDefaultProfile => ProfilePurpose::TxDefaultProfile,
        ChargingProfilePurposeEnumType::TxProfile => ProfilePurpose::TxProfile,
    }
}

fn rate(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::MAX)
}

fn period_to_ocpp(period: &ChargingSchedulePeriod) -> ChargingSchedulePeriodType {
    ChargingSchedulePeriodType {
        start_period: period.start_period,
        limit: rate(period.limit),
        number_phases: period.number_phases,
        phase_to_use: period.phase_to_use,
    }
}

fn period_from_ocpp(period: &ChargingSchedulePeriodType) -> ChargingSchedulePeriod {
    ChargingSchedulePeriod {
        start_period: period.start_period,
        limit: period.limit.to_f64().unwrap_or(f64::MAX),
        number_phases: period.number_phases,
        phase_to_use: period.phase_to_use,
    }
}

fn schedule_to_ocpp(schedule: &ChargingSchedule) -> ChargingScheduleType {
    ChargingScheduleType {
        id: schedule.id,
        start_schedule: schedule.start_schedule,
        duration: schedule.duration,
        charging_rate_unit: unit_to_ocpp(schedule.charging_rate_unit),
        min_charging_rate: schedule.min_charging_rate.map(rate),
        charging_schedule_period: schedule.periods.iter().map(period_to_ocpp).collect(),
        sales_tariff: None,
    }
}

fn schedule_from_ocpp(schedule: &ChargingScheduleType) -> ChargingSchedule {
    ChargingSchedule {
        id: schedule.id,
        charging_rate_unit: unit_from_ocpp(schedule.charging_rate_unit.clone()),
        periods: schedule
            .charging_schedule_period
            .iter()
            .map(period_from_ocpp)
            .collect(),
        start_schedule: schedule.start_schedule,
        duration: schedule.duration,
        min_charging_rate: schedule.min_charging_rate.and_then(|r| r.to_f64()),
    }
}

pub fn profile_to_ocpp(profile: &ChargingProfile) -> ChargingProfileType {
    let (kind, recurrency_kind) = match profile.kind {
        ProfileKind::Absolute => (ChargingProfileKindEnumType::Absolute, None),
        ProfileKind::Relative => (ChargingProfileKindEnumType::Relative, None),
        ProfileKind::Recurring(RecurrencyKind::Daily) => (
            ChargingProfileKindEnumType::Recurring,
            Some(RecurrencyKindEnumType::Daily),
        ),
        ProfileKind::Recurring(RecurrencyKind::Weekly) => (
            ChargingProfileKindEnumType::Recurring,
            Some(RecurrencyKindEnumType::Weekly),
        ),
    };

    ChargingProfileType {
        id: profile.id,
        stack_level: profile.stack_level,
        charging_profile_purpose: purpose_to_ocpp(profile.purpose),
        charging_profile_kind: kind,
        recurrency_kind,
        valid_from: profile.valid_from,
        valid_to: profile.valid_to,
        charging_schedule: profile.schedules.iter().map(schedule_to_ocpp).collect(),
        transaction_id: profile.transaction_id.clone(),
    }
}

pub fn profile_from_ocpp(profile: &ChargingProfileType) -> Result<ChargingProfile, WireError> {
    let kind = match profile.charging_profile_kind {
        ChargingProfileKindEnumType::Absolute => ProfileKind::Absolute,
        ChargingProfileKindEnumType::Relative => ProfileKind::Relative,
        ChargingProfileKindEnumType::Recurring => match profile.recurrency_kind {
            Some(RecurrencyKindEnumType::Daily) => ProfileKind::Recurring(RecurrencyKind::Daily),
            Some(RecurrencyKindEnumType::Weekly) => ProfileKind::Recurring(RecurrencyKind::Weekly),
            None => {
                return Err(WireError::MissingRecurrencyKind {
                    profile_id: profile.id,
                })
            }
        },
    };

    if profile.charging_schedule.is_empty() {
        return Err(WireError::EmptyChargingSchedule {
            profile_id: profile.id,
        });
    }

    Ok(ChargingProfile {
        id: profile.id,
        stack_level: profile.stack_level,
        purpose: purpose_from_ocpp(profile.charging_profile_purpose.clone()),
        kind,
        valid_from: profile.valid_from,
        valid_to: profile.valid_to,
        transaction_id: profile.transaction_id.clone(),
        schedules: profile
            .charging_schedule
            .iter()
            .map(schedule_from_ocpp)
            .collect(),
    })
}

/// Encodes a composite schedule for the wire.
///
/// Segments with no imposed limit carry `fallback_limit` — the wire format
/// has no way to say "unlimited".
pub fn composite_to_ocpp(
    composite: &CompositeSchedule,
    fallback_limit: f64,
) -> CompositeScheduleType {
    CompositeScheduleType {
        evse_id: composite.evse_id,
        duration: composite.duration,
        schedule_start: composite.schedule_start,
        charging_rate_unit: unit_to_ocpp(composite.charging_rate_unit),
        charging_schedule_period: composite
            .periods
            .iter()
            .map(|period| ChargingSchedulePeriodType {
                start_period: period.start_period,
                limit: rate(if period.limit.is_finite() {
                    period.limit
                } else {
                    fallback_limit
                }),
                number_phases: period.number_phases,
                phase_to_use: None,
            })
            .collect(),
    }
}
