//! Charging profile validation (OCPP 2.0.1 K01 functional requirements).
//!
//! The decision tree is evaluated in a fixed order and short-circuits on the
//! first failure, so the CSMS always sees the most specific diagnosis:
//! EVSE existence, then purpose-specific checks, then schedule structure.
//!
//! Validation never touches the store. Its single mutation is defaulting an
//! absent `numberPhases` to 3 on AC EVSEs (K01.FR.49); everything else is a
//! pure read.

use tracing::debug;

use crate::application::store::{ProfileStore, TxDefaultScope};
use crate::domain::charging::{
    ChargingProfile, ProfileKind, ProfilePurpose, ProfileValidationResult,
    DEFAULT_AND_MAX_NUMBER_PHASES, STATION_WIDE_EVSE_ID,
};
use crate::domain::evse::{CurrentPhaseType, EvseRegistry};

/// Validates submitted profiles against the registry and the stored set.
pub struct ProfileValidator<'a> {
    registry: &'a dyn EvseRegistry,
}

impl<'a> ProfileValidator<'a> {
    pub fn new(registry: &'a dyn EvseRegistry) -> Self {
        Self { registry }
    }

    /// Decides whether `profile`, submitted for `evse_id`, may be accepted.
    ///
    /// Total: exactly one result for every input. `store` is only read, for
    /// the stack-level conflict checks (I6/I7).
    pub fn validate(
        &self,
        profile: &mut ChargingProfile,
        evse_id: i32,
        store: &ProfileStore,
    ) -> ProfileValidationResult {
        let result = self.run(profile, evse_id, store);
        if !result.is_valid() {
            debug!(
                profile_id = profile.id,
                evse_id,
                reason = result.as_str(),
                "Charging profile failed validation"
            );
        }
        result
    }

    fn run(
        &self,
        profile: &mut ChargingProfile,
        evse_id: i32,
        store: &ProfileStore,
    ) -> ProfileValidationResult {
        if evse_id != STATION_WIDE_EVSE_ID && self.registry.info(evse_id).is_none() {
            return ProfileValidationResult::EvseDoesNotExist;
        }

        let purpose_result = match profile.purpose {
            ProfilePurpose::TxProfile => self.validate_tx_profile(profile, evse_id, store),
            ProfilePurpose::TxDefaultProfile => Self::validate_tx_default(profile, evse_id, store),
            _ => ProfileValidationResult::Valid,
        };
        if !purpose_result.is_valid() {
            return purpose_result;
        }

        self.validate_profile_schedules(profile, evse_id)
    }

    /// K01.FR.03 family: a TxProfile must name the transaction running on a
    /// real EVSE, and must not collide with a stored TxProfile at the same
    /// (transaction, stack level).
    fn validate_tx_profile(
        &self,
        profile: &ChargingProfile,
        evse_id: i32,
        store: &ProfileStore,
    ) -> ProfileValidationResult {
        let Some(transaction_id) = profile.transaction_id.as_deref() else {
            return ProfileValidationResult::TxProfileMissingTransactionId;
        };

        if evse_id <= STATION_WIDE_EVSE_ID {
            return ProfileValidationResult::TxProfileEvseIdNotGreaterThanZero;
        }

        if !self.registry.has_active_transaction(evse_id) {
            return ProfileValidationResult::TxProfileEvseHasNoActiveTransaction;
        }

        let on_evse = self
            .registry
            .transaction(evse_id)
            .map(|tx| tx.transaction_id == transaction_id)
            .unwrap_or(false);
        if !on_evse {
            return ProfileValidationResult::TxProfileTransactionNotOnEvse;
        }

        let conflict = store
            .list_tx(transaction_id)
            .iter()
            .any(|stored| stored.id != profile.id && stored.stack_level == profile.stack_level);
        if conflict {
            return ProfileValidationResult::TxProfileConflictingStackLevel;
        }

        ProfileValidationResult::Valid
    }

    /// K01.FR.53: within the side of the partition the profile targets, no
    /// other TxDefault profile may occupy the same stack level.
    fn validate_tx_default(
        profile: &ChargingProfile,
        evse_id: i32,
        store: &ProfileStore,
    ) -> ProfileValidationResult {
        let scope = if evse_id == STATION_WIDE_EVSE_ID {
            TxDefaultScope::StationWide
        } else {
            TxDefaultScope::EvseSpecific
        };

        let duplicate = store
            .list_tx_default(scope)
            .iter()
            .any(|stored| stored.id != profile.id && stored.stack_level == profile.stack_level);
        if duplicate {
            return ProfileValidationResult::DuplicateTxDefaultProfileFound;
        }

        ProfileValidationResult::Valid
    }

    /// Structural checks over every schedule of the profile
    /// (K01.FR.19/31/35/40/41/44/45/49).
    fn validate_profile_schedules(
        &self,
        profile: &mut ChargingProfile,
        evse_id: i32,
    ) -> ProfileValidationResult {
        let kind = profile.kind;
        let phase_type = if evse_id > STATION_WIDE_EVSE_ID {
            self.registry.info(evse_id).map(|info| info.current_phase_type)
        } else {
            None
        };

        for schedule in &mut profile.schedules {
            if schedule.periods.is_empty() {
                return ProfileValidationResult::ChargingProfileNoChargingSchedulePeriods;
            }

            if schedule.periods[0].start_period != 0 {
                return ProfileValidationResult::ChargingProfileFirstStartScheduleIsNotZero;
            }

            let out_of_order = schedule
                .periods
                .windows(2)
                .any(|pair| pair[1].start_period <= pair[0].start_period);
            if out_of_order {
                return ProfileValidationResult::ChargingSchedulePeriodsOutOfOrder;
            }

            for period in &mut schedule.periods {
                // phaseToUse only makes sense on a single-phase period
                if period.number_phases != Some(1) && period.phase_to_use.is_some() {
                    return ProfileValidationResult::ChargingSchedulePeriodInvalidPhaseToUse;
                }

                match phase_type {
                    Some(CurrentPhaseType::DC) => {
                        if period.number_phases.is_some() || period.phase_to_use.is_some() {
                            return ProfileValidationResult::ChargingSchedulePeriodExtraneousPhaseValues;
                        }
                    }
                    Some(CurrentPhaseType::AC) => match period.number_phases {
                        Some(n) if !(1..=DEFAULT_AND_MAX_NUMBER_PHASES).contains(&n) => {
                            return ProfileValidationResult::ChargingSchedulePeriodUnsupportedNumberPhases;
                        }
                        Some(_) => {}
                        None => period.number_phases = Some(DEFAULT_AND_MAX_NUMBER_PHASES),
                    },
                    None => {}
                }
            }

            match kind {
                ProfileKind::Relative => {
                    if schedule.start_schedule.is_some() {
                        return ProfileValidationResult::ChargingProfileExtraneousStartSchedule;
                    }
                }
                _ => {
                    if schedule.start_schedule.is_none() {
                        return ProfileValidationResult::ChargingProfileMissingRequiredStartSchedule;
                    }
                }
            }
        }

        ProfileValidationResult::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, Utc};

    use crate::domain::charging::{
        ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod, RecurrencyKind,
    };
    use crate::domain::evse::{EvseInfo, InMemoryEvseRegistry};
    use crate::infrastructure::persistence::InMemoryPersistence;

    const DEFAULT_EVSE_ID: i32 = 1;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn registry_with_ac_evse() -> InMemoryEvseRegistry {
        let registry = InMemoryEvseRegistry::new();
        registry.register(EvseInfo {
            id: DEFAULT_EVSE_ID,
            current_phase_type: CurrentPhaseType::AC,
        });
        registry
    }

    fn registry_with_dc_evse() -> InMemoryEvseRegistry {
        let registry = InMemoryEvseRegistry::new();
        registry.register(EvseInfo {
            id: DEFAULT_EVSE_ID,
            current_phase_type: CurrentPhaseType::DC,
        });
        registry
    }

    fn empty_store() -> ProfileStore {
        ProfileStore::new(Arc::new(InMemoryPersistence::new()))
    }

    fn schedule(periods: Vec<ChargingSchedulePeriod>) -> ChargingSchedule {
        ChargingSchedule {
            id: 1,
            charging_rate_unit: ChargingRateUnit::Amps,
            periods,
            start_schedule: Some(ts("2024-01-17T17:00:00Z")),
            duration: None,
            min_charging_rate: None,
        }
    }

    fn period(start_period: i32) -> ChargingSchedulePeriod {
        ChargingSchedulePeriod {
            start_period,
            limit: 16.0,
            number_phases: None,
            phase_to_use: None,
        }
    }

    fn tx_default_profile(id: i32, stack_level: i32) -> ChargingProfile {
        ChargingProfile {
            id,
            stack_level,
            purpose: ProfilePurpose::TxDefaultProfile,
            kind: ProfileKind::Absolute,
            valid_from: None,
            valid_to: None,
            transaction_id: None,
            schedules: vec![schedule(vec![period(0)])],
        }
    }

    fn tx_profile(id: i32, stack_level: i32, transaction_id: Option<&str>) -> ChargingProfile {
        ChargingProfile {
            transaction_id: transaction_id.map(str::to_string),
            purpose: ProfilePurpose::TxProfile,
            ..tx_default_profile(id, stack_level)
        }
    }

    #[test]
    fn test_unknown_evse_is_rejected() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);

        assert_eq!(
            validator.validate(&mut profile, 99, &empty_store()),
            ProfileValidationResult::EvseDoesNotExist
        );
    }

    #[test]
    fn test_station_wide_needs_no_evse() {
        let registry = InMemoryEvseRegistry::new();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);

        assert_eq!(
            validator.validate(&mut profile, STATION_WIDE_EVSE_ID, &empty_store()),
            ProfileValidationResult::Valid
        );
    }

    #[test]
    fn test_tx_profile_missing_transaction_id() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_profile(1, 1, None);

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::TxProfileMissingTransactionId
        );
    }

    #[test]
    fn test_tx_profile_station_wide_is_rejected() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_profile(1, 1, Some("tx-001"));

        assert_eq!(
            validator.validate(&mut profile, STATION_WIDE_EVSE_ID, &empty_store()),
            ProfileValidationResult::TxProfileEvseIdNotGreaterThanZero
        );
    }

    #[test]
    fn test_tx_profile_without_active_transaction() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_profile(1, 1, Some("abc"));

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::TxProfileEvseHasNoActiveTransaction
        );
    }

    #[test]
    fn test_tx_profile_wrong_transaction() {
        let registry = registry_with_ac_evse();
        registry.open_transaction(DEFAULT_EVSE_ID, "tx-other", ts("2024-01-17T17:00:00Z"));
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_profile(1, 1, Some("tx-001"));

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::TxProfileTransactionNotOnEvse
        );
    }

    #[tokio::test]
    async fn test_tx_profile_conflicting_stack_level() {
        let registry = registry_with_ac_evse();
        registry.open_transaction(DEFAULT_EVSE_ID, "tx-001", ts("2024-01-17T17:00:00Z"));
        let validator = ProfileValidator::new(&registry);

        let mut store = empty_store();
        store
            .add(DEFAULT_EVSE_ID, tx_profile(1, 1, Some("tx-001")))
            .await
            .unwrap();

        let mut conflicting = tx_profile(2, 1, Some("tx-001"));
        assert_eq!(
            validator.validate(&mut conflicting, DEFAULT_EVSE_ID, &store),
            ProfileValidationResult::TxProfileConflictingStackLevel
        );

        // same id is an overwrite, not a conflict
        let mut same = tx_profile(1, 1, Some("tx-001"));
        assert_eq!(
            validator.validate(&mut same, DEFAULT_EVSE_ID, &store),
            ProfileValidationResult::Valid
        );

        // a different stack level coexists
        let mut other_level = tx_profile(3, 2, Some("tx-001"));
        assert_eq!(
            validator.validate(&mut other_level, DEFAULT_EVSE_ID, &store),
            ProfileValidationResult::Valid
        );
    }

    #[tokio::test]
    async fn test_duplicate_tx_default_stack_level() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);

        let mut store = empty_store();
        store
            .add(DEFAULT_EVSE_ID, tx_default_profile(7, 1))
            .await
            .unwrap();

        let mut duplicate = tx_default_profile(8, 1);
        assert_eq!(
            validator.validate(&mut duplicate, DEFAULT_EVSE_ID, &store),
            ProfileValidationResult::DuplicateTxDefaultProfileFound
        );

        // re-validating the stored profile itself stays Valid (idempotence)
        let mut same = tx_default_profile(7, 1);
        assert_eq!(
            validator.validate(&mut same, DEFAULT_EVSE_ID, &store),
            ProfileValidationResult::Valid
        );
    }

    #[tokio::test]
    async fn test_tx_default_station_and_evse_sides_do_not_conflict() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);

        let mut store = empty_store();
        store
            .add(DEFAULT_EVSE_ID, tx_default_profile(7, 1))
            .await
            .unwrap();

        // same stack level, but installed station-wide: the per-EVSE profile
        // overrules it rather than conflicting with it
        let mut station_wide = tx_default_profile(8, 1);
        assert_eq!(
            validator.validate(&mut station_wide, STATION_WIDE_EVSE_ID, &store),
            ProfileValidationResult::Valid
        );
    }

    #[test]
    fn test_schedule_without_periods() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.schedules[0].periods.clear();

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingProfileNoChargingSchedulePeriods
        );
    }

    #[test]
    fn test_first_period_must_start_at_zero() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.schedules[0].periods = vec![period(60)];

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingProfileFirstStartScheduleIsNotZero
        );
    }

    #[test]
    fn test_periods_must_be_strictly_increasing() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.schedules[0].periods = vec![period(0), period(300), period(300)];

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingSchedulePeriodsOutOfOrder
        );
    }

    #[test]
    fn test_phase_to_use_requires_single_phase() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.schedules[0].periods[0].number_phases = Some(3);
        profile.schedules[0].periods[0].phase_to_use = Some(2);

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingSchedulePeriodInvalidPhaseToUse
        );

        let mut single_phase = tx_default_profile(1, 1);
        single_phase.schedules[0].periods[0].number_phases = Some(1);
        single_phase.schedules[0].periods[0].phase_to_use = Some(2);
        assert_eq!(
            validator.validate(&mut single_phase, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::Valid
        );
    }

    #[test]
    fn test_dc_evse_rejects_phase_values() {
        let registry = registry_with_dc_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.schedules[0].periods[0].number_phases = Some(3);

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingSchedulePeriodExtraneousPhaseValues
        );

        let mut bare = tx_default_profile(1, 1);
        assert_eq!(
            validator.validate(&mut bare, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::Valid
        );
        // no defaulting on DC
        assert_eq!(bare.schedules[0].periods[0].number_phases, None);
    }

    #[test]
    fn test_ac_evse_rejects_unsupported_phase_count() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.schedules[0].periods[0].number_phases = Some(4);

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingSchedulePeriodUnsupportedNumberPhases
        );

        profile.schedules[0].periods[0].number_phases = Some(0);
        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingSchedulePeriodUnsupportedNumberPhases
        );
    }

    #[test]
    fn test_ac_evse_defaults_absent_number_phases() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        assert_eq!(profile.schedules[0].periods[0].number_phases, None);

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::Valid
        );
        assert_eq!(
            profile.schedules[0].periods[0].number_phases,
            Some(DEFAULT_AND_MAX_NUMBER_PHASES)
        );
    }

    #[test]
    fn test_non_relative_requires_start_schedule() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);

        let mut absolute = tx_default_profile(1, 1);
        absolute.schedules[0].start_schedule = None;
        assert_eq!(
            validator.validate(&mut absolute, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingProfileMissingRequiredStartSchedule
        );

        let mut recurring = tx_default_profile(1, 1);
        recurring.kind = ProfileKind::Recurring(RecurrencyKind::Daily);
        recurring.schedules[0].start_schedule = None;
        assert_eq!(
            validator.validate(&mut recurring, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingProfileMissingRequiredStartSchedule
        );
    }

    #[test]
    fn test_relative_rejects_start_schedule() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.kind = ProfileKind::Relative;

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingProfileExtraneousStartSchedule
        );

        profile.schedules[0].start_schedule = None;
        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::Valid
        );
    }

    #[test]
    fn test_purpose_errors_win_over_schedule_errors() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        // both a missing transaction id and an empty period list
        let mut profile = tx_profile(1, 1, None);
        profile.schedules[0].periods.clear();

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::TxProfileMissingTransactionId
        );
    }

    #[test]
    fn test_every_schedule_is_checked() {
        let registry = registry_with_ac_evse();
        let validator = ProfileValidator::new(&registry);
        let mut profile = tx_default_profile(1, 1);
        profile.schedules.push(schedule(vec![period(30)]));

        assert_eq!(
            validator.validate(&mut profile, DEFAULT_EVSE_ID, &empty_store()),
            ProfileValidationResult::ChargingProfileFirstStartScheduleIsNotZero
        );
    }
}
