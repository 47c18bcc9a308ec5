//! Composite schedule calculation (OCPP 2.0.1 K08).
//!
//! A sweep over the query window visits only instants where some profile's
//! period boundary, validity bound, or recurrence edge falls, so the cost is
//! O(profiles × boundaries). At each visited instant the stacking rules
//! pick one winner per purpose (highest stack level, then lowest limit,
//! then lowest profile id) and the enforced value is the minimum across
//! purposes. Equal adjacent segments are merged on emission.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use crate::domain::charging::{
    ChargingProfile, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod,
    CompositePeriod, CompositeSchedule, ProfileKind, ProfilePurpose, RecurrencyKind, NO_LIMIT,
};
use crate::domain::evse::EvseRegistry;
use crate::support::clock::floor_to_seconds;
use crate::support::errors::OperationalError;

/// The instantaneous winner within one purpose.
#[derive(Debug, Clone, Copy)]
struct StackedLimit {
    stack_level: i32,
    limit: f64,
    number_phases: Option<i32>,
    profile_id: i32,
}

impl StackedLimit {
    fn outranks(&self, other: &StackedLimit) -> bool {
        if self.stack_level != other.stack_level {
            return self.stack_level > other.stack_level;
        }
        if self.limit != other.limit {
            return self.limit < other.limit;
        }
        self.profile_id < other.profile_id
    }
}

/// Calculates composite schedules from the currently-valid profile set.
pub struct Composer<'a> {
    registry: &'a dyn EvseRegistry,
}

impl<'a> Composer<'a> {
    pub fn new(registry: &'a dyn EvseRegistry) -> Self {
        Self { registry }
    }

    /// Flattens `valid_profiles` into the envelope enforced over
    /// `[start_time, end_time)` for `evse_id`, in `charging_rate_unit`.
    ///
    /// Profiles expressed in a different unit are skipped (converting would
    /// require hardware-specific voltage). A `deadline` in the past aborts
    /// with [`OperationalError::Timeout`]; no partial schedule is returned.
    pub fn calculate(
        &self,
        valid_profiles: &[ChargingProfile],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        evse_id: i32,
        charging_rate_unit: ChargingRateUnit,
        deadline: Option<Instant>,
    ) -> Result<CompositeSchedule, OperationalError> {
        let start_time = floor_to_seconds(start_time);
        let end_time = floor_to_seconds(end_time);

        let mut composite = CompositeSchedule {
            evse_id,
            charging_rate_unit,
            schedule_start: start_time,
            duration: (end_time - start_time).num_seconds().max(0) as i32,
            periods: Vec::new(),
        };
        if end_time <= start_time {
            return Ok(composite);
        }

        let tx_start = self
            .registry
            .transaction(evse_id)
            .map(|tx| floor_to_seconds(tx.started_at));

        let profiles: Vec<&ChargingProfile> = valid_profiles
            .iter()
            .filter(|p| {
                p.schedules
                    .first()
                    .map(|s| s.charging_rate_unit == charging_rate_unit)
                    .unwrap_or(false)
            })
            .collect();

        let mut any_limit = false;
        let mut t = start_time;
        while t < end_time {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    debug!(evse_id, "Composite schedule calculation hit its deadline");
                    return Err(OperationalError::Timeout);
                }
            }

            let (limit, number_phases) = self.sample_at(&profiles, t, tx_start);
            if limit != NO_LIMIT {
                any_limit = true;
            }

            let start_period = (t - start_time).num_seconds() as i32;
            let changed = composite
                .periods
                .last()
                .map(|prev| prev.limit != limit || prev.number_phases != number_phases)
                .unwrap_or(true);
            if changed {
                composite.periods.push(CompositePeriod {
                    start_period,
                    limit,
                    number_phases,
                });
            }

            t = self.next_event_time(&profiles, t, tx_start, end_time);
        }

        // nothing imposed a limit anywhere in the window: report "no periods"
        // and let the caller apply the station default
        if !any_limit {
            composite.periods.clear();
        }

        trace!(
            evse_id,
            periods = composite.periods.len(),
            duration = composite.duration,
            "Composite schedule calculated"
        );
        Ok(composite)
    }

    /// The (limit, numberPhases) in force at `t`: minimum over the
    /// per-purpose winners, [`NO_LIMIT`] if nothing applies.
    fn sample_at(
        &self,
        profiles: &[&ChargingProfile],
        t: DateTime<Utc>,
        tx_start: Option<DateTime<Utc>>,
    ) -> (f64, Option<i32>) {
        let mut winners: [Option<StackedLimit>; 4] = [None; 4];

        for profile in profiles {
            if !profile.is_valid_at(t) {
                continue;
            }
            let Some(schedule) = profile.schedules.first() else {
                continue;
            };
            let Some(effective_start) = effective_start(profile, schedule, t, tx_start) else {
                continue;
            };
            let Some(period) = find_period_at(schedule, effective_start, t, profile.recurrency())
            else {
                continue;
            };

            let candidate = StackedLimit {
                stack_level: profile.stack_level,
                limit: period.limit,
                number_phases: period.number_phases,
                profile_id: profile.id,
            };
            let slot = &mut winners[purpose_index(profile.purpose)];
            let wins = slot.map(|current| candidate.outranks(&current)).unwrap_or(true);
            if wins {
                *slot = Some(candidate);
            }
        }

        let mut limit = NO_LIMIT;
        let mut number_phases = None;
        for winner in winners.into_iter().flatten() {
            if winner.limit < limit {
                limit = winner.limit;
                number_phases = winner.number_phases;
            }
        }
        (limit, number_phases)
    }

    /// Earliest boundary strictly after `t` across all profiles, clipped to
    /// `end_time`.
    fn next_event_time(
        &self,
        profiles: &[&ChargingProfile],
        t: DateTime<Utc>,
        tx_start: Option<DateTime<Utc>>,
        end_time: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let mut next = end_time;
        let mut consider = |candidate: DateTime<Utc>| {
            let candidate = floor_to_seconds(candidate);
            if candidate > t && candidate < next {
                next = candidate;
            }
        };

        for profile in profiles {
            if let Some(valid_from) = profile.valid_from {
                consider(valid_from);
            }
            if let Some(valid_to) = profile.valid_to {
                consider(valid_to);
            }

            let Some(schedule) = profile.schedules.first() else {
                continue;
            };
            let Some(effective_start) = effective_start(profile, schedule, t, tx_start) else {
                continue;
            };

            if effective_start > t {
                // schedule not started yet; later boundaries are revisited then
                consider(effective_start);
                continue;
            }

            for period in &schedule.periods {
                consider(effective_start + Duration::seconds(period.start_period as i64));
            }
            if let Some(window) = coverage_seconds(schedule, profile.recurrency()) {
                consider(effective_start + Duration::seconds(window));
            }
            if let Some(recurrency) = profile.recurrency() {
                consider(effective_start + Duration::seconds(recurrency.cycle_seconds()));
            }
        }

        if next <= t {
            end_time
        } else {
            next
        }
    }
}

fn purpose_index(purpose: ProfilePurpose) -> usize {
    match purpose {
        ProfilePurpose::ChargingStationExternalConstraints => 0,
        ProfilePurpose::ChargingStationMaxProfile => 1,
        ProfilePurpose::TxDefaultProfile => 2,
        ProfilePurpose::TxProfile => 3,
    }
}

/// Resolves when `schedule` (of `profile`) starts, as observed at `t`.
///
/// `None` means the profile is inactive: a Relative profile with no running
/// transaction, or a schedule missing its anchor.
fn effective_start(
    profile: &ChargingProfile,
    schedule: &ChargingSchedule,
    t: DateTime<Utc>,
    tx_start: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match profile.kind {
        ProfileKind::Absolute => schedule.start_schedule.map(floor_to_seconds),
        ProfileKind::Relative => tx_start,
        ProfileKind::Recurring(recurrency) => {
            let anchor = floor_to_seconds(schedule.start_schedule?);
            let cycle = recurrency.cycle_seconds();
            let offset = (t - anchor).num_seconds().rem_euclid(cycle);
            Some(floor_to_seconds(t) - Duration::seconds(offset))
        }
    }
}

/// How many seconds from its effective start `schedule` stays in force, if
/// bounded. Recurring schedules never cover past their recurrence cycle.
fn coverage_seconds(
    schedule: &ChargingSchedule,
    recurrency: Option<RecurrencyKind>,
) -> Option<i64> {
    let duration = schedule.duration.map(|d| d as i64);
    match recurrency {
        Some(kind) => {
            let cycle = kind.cycle_seconds();
            Some(duration.map_or(cycle, |d| d.min(cycle)))
        }
        None => duration,
    }
}

/// The period of `schedule` covering `t`, given its resolved start.
fn find_period_at(
    schedule: &ChargingSchedule,
    effective_start: DateTime<Utc>,
    t: DateTime<Utc>,
    recurrency: Option<RecurrencyKind>,
) -> Option<&ChargingSchedulePeriod> {
    let elapsed = (t - effective_start).num_seconds();
    if elapsed < 0 {
        return None;
    }
    if let Some(window) = coverage_seconds(schedule, recurrency) {
        if elapsed >= window {
            return None;
        }
    }
    schedule
        .periods
        .iter()
        .rev()
        .find(|period| (period.start_period as i64) <= elapsed)
}
