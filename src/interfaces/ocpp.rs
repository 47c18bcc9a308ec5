//! OCPP 2.0.1 message adapter (K01/K08 actions).
//!
//! Maps the CSMS-facing messages onto the [`SmartChargingService`] façade.
//! Validation failures travel as `statusInfo.reasonCode` with the stable
//! taxonomy names; operational errors never leak details to the wire — the
//! response is `Rejected` with a generic reason and the incident is logged.
//!
//! The transport (websocket framing, call correlation) lives outside this
//! crate; handlers here take the deserialized request and return the
//! response payload.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use rust_ocpp::v2_0_1::datatypes::status_info_type::StatusInfoType;
use rust_ocpp::v2_0_1::enumerations::charging_limit_source_enum_type::ChargingLimitSourceEnumType;
use rust_ocpp::v2_0_1::enumerations::charging_profile_status_enum_type::ChargingProfileStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::clear_charging_profile_status_enum_type::ClearChargingProfileStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::generic_status_enum_type::GenericStatusEnumType;
use rust_ocpp::v2_0_1::enumerations::get_charging_profile_status_enum_type::GetChargingProfileStatusEnumType;
use rust_ocpp::v2_0_1::messages::clear_charging_profile::{
    ClearChargingProfileRequest, ClearChargingProfileResponse,
};
use rust_ocpp::v2_0_1::messages::get_charging_profiles::{
    GetChargingProfilesRequest, GetChargingProfilesResponse,
};
use rust_ocpp::v2_0_1::messages::get_composite_schedule::{
    GetCompositeScheduleRequest, GetCompositeScheduleResponse,
};
use rust_ocpp::v2_0_1::messages::report_charging_profiles::ReportChargingProfilesRequest;
use rust_ocpp::v2_0_1::messages::set_charging_profile::{
    SetChargingProfileRequest, SetChargingProfileResponse,
};
use tracing::{error, info, warn};

use crate::application::service::{ReportCriteria, SmartChargingService};
use crate::application::store::ClearProfileCriteria;
use crate::config::SmartChargingConfig;
use crate::domain::charging::{wire, ChargingRateUnit};

const REASON_INVALID_PROFILE: &str = "InvalidProfile";
const REASON_INTERNAL_ERROR: &str = "InternalError";

fn status_info(reason_code: &str) -> StatusInfoType {
    StatusInfoType {
        reason_code: reason_code.to_string(),
        additional_info: None,
    }
}

/// OCPP-facing entry points for the smart charging core.
pub struct OcppSmartCharging {
    service: Arc<SmartChargingService>,
    config: SmartChargingConfig,
}

impl OcppSmartCharging {
    pub fn new(service: Arc<SmartChargingService>, config: SmartChargingConfig) -> Self {
        Self { service, config }
    }

    /// K01: SetChargingProfile.
    pub async fn handle_set_charging_profile(
        &self,
        request: SetChargingProfileRequest,
    ) -> SetChargingProfileResponse {
        info!(
            evse_id = request.evse_id,
            profile_id = request.charging_profile.id,
            "SetChargingProfile received"
        );

        let profile = match wire::profile_from_ocpp(&request.charging_profile) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(
                    evse_id = request.evse_id,
                    profile_id = request.charging_profile.id,
                    error = %e,
                    "SetChargingProfile payload not representable"
                );
                return SetChargingProfileResponse {
                    status: ChargingProfileStatusEnumType::Rejected,
                    status_info: Some(status_info(REASON_INVALID_PROFILE)),
                };
            }
        };

        match self.service.set_profile(request.evse_id, profile).await {
            Ok(result) if result.is_valid() => SetChargingProfileResponse {
                status: ChargingProfileStatusEnumType::Accepted,
                status_info: None,
            },
            Ok(result) => SetChargingProfileResponse {
                status: ChargingProfileStatusEnumType::Rejected,
                status_info: Some(status_info(result.as_str())),
            },
            Err(e) => {
                error!(evse_id = request.evse_id, error = %e, "SetChargingProfile failed");
                SetChargingProfileResponse {
                    status: ChargingProfileStatusEnumType::Rejected,
                    status_info: Some(status_info(REASON_INTERNAL_ERROR)),
                }
            }
        }
    }

    /// K01: ClearChargingProfile.
    pub async fn handle_clear_charging_profile(
        &self,
        request: ClearChargingProfileRequest,
    ) -> ClearChargingProfileResponse {
        let criteria = ClearProfileCriteria {
            profile_id: request.charging_profile_id,
            evse_id: request
                .charging_profile_criteria
                .as_ref()
                .and_then(|c| c.evse_id),
            purpose: request
                .charging_profile_criteria
                .as_ref()
                .and_then(|c| c.charging_profile_purpose.clone())
                .map(wire::purpose_from_ocpp),
            stack_level: request
                .charging_profile_criteria
                .as_ref()
                .and_then(|c| c.stack_level),
            check_id_only: request.charging_profile_id.is_some()
                && request.charging_profile_criteria.is_none(),
        };
        info!(?criteria, "ClearChargingProfile received");

        match self.service.clear_profiles_matching(&criteria).await {
            Ok(cleared) if cleared > 0 => ClearChargingProfileResponse {
                status: ClearChargingProfileStatusEnumType::Accepted,
                status_info: None,
            },
            Ok(_) => ClearChargingProfileResponse {
                status: ClearChargingProfileStatusEnumType::Unknown,
                status_info: None,
            },
            Err(e) => {
                error!(error = %e, "ClearChargingProfile failed");
                ClearChargingProfileResponse {
                    status: ClearChargingProfileStatusEnumType::Unknown,
                    status_info: Some(status_info(REASON_INTERNAL_ERROR)),
                }
            }
        }
    }

    /// K08: GetCompositeSchedule. `duration` counts from now; an absent
    /// `chargingRateUnit` defaults to Amps.
    pub async fn handle_get_composite_schedule(
        &self,
        request: GetCompositeScheduleRequest,
    ) -> GetCompositeScheduleResponse {
        let unit = request
            .charging_rate_unit
            .map(wire::unit_from_ocpp)
            .unwrap_or(ChargingRateUnit::Amps);
        let start = self.service.clock().now();
        let end = start + Duration::seconds(request.duration as i64);
        info!(
            evse_id = request.evse_id,
            duration = request.duration,
            unit = unit.as_str(),
            "GetCompositeSchedule received"
        );

        let budget = self
            .config
            .composer
            .deadline_ms
            .map(StdDuration::from_millis);
        let result = self
            .service
            .get_composite_schedule_with_deadline(request.evse_id, start, end, unit, budget)
            .await;

        match result {
            Ok(composite) => {
                let fallback = self.config.limits.fallback_for(unit);
                GetCompositeScheduleResponse {
                    status: GenericStatusEnumType::Accepted,
                    status_info: None,
                    schedule: Some(wire::composite_to_ocpp(&composite, fallback)),
                }
            }
            Err(e) => {
                error!(evse_id = request.evse_id, error = %e, "GetCompositeSchedule failed");
                GetCompositeScheduleResponse {
                    status: GenericStatusEnumType::Rejected,
                    status_info: Some(status_info(REASON_INTERNAL_ERROR)),
                    schedule: None,
                }
            }
        }
    }

    /// K09: GetChargingProfiles. Returns the response plus the
    /// ReportChargingProfiles notifications (one per EVSE) for the
    /// transport to stream back.
    pub async fn handle_get_charging_profiles(
        &self,
        request: GetChargingProfilesRequest,
    ) -> (GetChargingProfilesResponse, Vec<ReportChargingProfilesRequest>) {
        let criteria = ReportCriteria {
            evse_id: request.evse_id,
            purpose: request
                .charging_profile
                .charging_profile_purpose
                .map(wire::purpose_from_ocpp),
            stack_level: request.charging_profile.stack_level,
            profile_ids: request.charging_profile.charging_profile_id.clone(),
        };
        let rows = self.service.get_reported_profiles(&criteria).await;
        info!(
            request_id = request.request_id,
            profiles = rows.len(),
            "GetChargingProfiles received"
        );

        if rows.is_empty() {
            return (
                GetChargingProfilesResponse {
                    status: GetChargingProfileStatusEnumType::NoProfiles,
                    status_info: None,
                },
                Vec::new(),
            );
        }

        // one report per EVSE; rows arrive sorted by (evse_id, profile id)
        let mut reports: Vec<ReportChargingProfilesRequest> = Vec::new();
        for (evse_id, profile) in rows {
            let encoded = wire::profile_to_ocpp(&profile);
            match reports.last_mut() {
                Some(report) if report.evse_id == evse_id => {
                    report.charging_profile.push(encoded);
                }
                _ => reports.push(ReportChargingProfilesRequest {
                    request_id: request.request_id,
                    charging_limit_source: ChargingLimitSourceEnumType::CSO,
                    charging_profile: vec![encoded],
                    tbc: Some(true),
                    evse_id,
                }),
            }
        }
        if let Some(last) = reports.last_mut() {
            last.tbc = None;
        }

        (
            GetChargingProfilesResponse {
                status: GetChargingProfileStatusEnumType::Accepted,
                status_info: None,
            },
            reports,
        )
    }
}
