use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use common::db::repositories::HealthcareSystemRepository;
use common::models::{HealthcareSystem, SystemType, UserClaims};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSystemRequest {
    pub name: String,
    pub system_type: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub emergency_services: bool,
    pub bed_capacity: Option<i32>,
    #[serde(default = "default_plan")]
    pub subscription_plan: String,
    #[serde(default)]
    pub monthly_fee: f64,
    pub contract_start_date: NaiveDate,
    pub contract_end_date: NaiveDate,
}

fn default_plan() -> String {
    "basic".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateSystemRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub emr_system: Option<String>,
    pub api_endpoint: Option<String>,
    pub operating_hours: Option<serde_json::Value>,
    pub emergency_services: Option<bool>,
    pub bed_capacity: Option<i32>,
    pub current_occupancy: Option<i32>,
    pub subscription_plan: Option<String>,
    pub is_active: Option<bool>,
}

/// List active healthcare systems
#[tracing::instrument(skip(state))]
pub async fn list_systems(
    State(state): State<AppState>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<HealthcareSystem>>>, ErrorResponse> {
    let systems = HealthcareSystemRepository::new(state.db_pool.clone())
        .find_all_active()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list healthcare systems");
            ErrorResponse::new("internal_error", "Failed to list healthcare systems")
        })?;

    Ok(Json(SuccessResponse::new(systems)))
}

/// Get a healthcare system by ID
#[tracing::instrument(skip(state))]
pub async fn get_system(
    State(state): State<AppState>,
    Path(system_id): Path<Uuid>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<HealthcareSystem>>, ErrorResponse> {
    let system = HealthcareSystemRepository::new(state.db_pool.clone())
        .find_by_id(system_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get healthcare system");
            ErrorResponse::new("internal_error", "Failed to get healthcare system")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Healthcare system not found"))?;

    Ok(Json(SuccessResponse::new(system)))
}

/// Register a healthcare system (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn create_system(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<CreateSystemRequest>,
) -> Result<Json<SuccessResponse<HealthcareSystem>>, ErrorResponse> {
    if req.name.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Name is required"));
    }

    let system_type = SystemType::from_str(&req.system_type)
        .map_err(|e| ErrorResponse::new("validation_error", e))?;

    if req.contract_end_date < req.contract_start_date {
        return Err(ErrorResponse::new(
            "validation_error",
            "Contract end date cannot precede start date",
        ));
    }

    let now = Utc::now();
    let system = HealthcareSystem {
        id: Uuid::new_v4(),
        name: req.name,
        system_type,
        address: req.address,
        city: req.city,
        state: req.state,
        zip_code: req.zip_code,
        phone_number: req.phone_number,
        email: req.email,
        website: req.website,
        emr_system: String::new(),
        api_endpoint: String::new(),
        api_credentials: serde_json::json!({}),
        operating_hours: serde_json::json!({}),
        emergency_services: req.emergency_services,
        bed_capacity: req.bed_capacity,
        current_occupancy: 0,
        subscription_plan: req.subscription_plan,
        monthly_fee: req.monthly_fee,
        contract_start_date: req.contract_start_date,
        contract_end_date: req.contract_end_date,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    HealthcareSystemRepository::new(state.db_pool.clone())
        .create(&system)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create healthcare system");
            ErrorResponse::new("internal_error", "Failed to create healthcare system")
        })?;

    tracing::info!(
        system_id = %system.id,
        created_by = %claims.username,
        "Healthcare system created"
    );

    Ok(Json(SuccessResponse::new(system)))
}

/// Update a healthcare system (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn update_system(
    State(state): State<AppState>,
    Path(system_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<UpdateSystemRequest>,
) -> Result<Json<SuccessResponse<HealthcareSystem>>, ErrorResponse> {
    let repository = HealthcareSystemRepository::new(state.db_pool.clone());

    let mut system = repository
        .find_by_id(system_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get healthcare system");
            ErrorResponse::new("internal_error", "Failed to get healthcare system")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Healthcare system not found"))?;

    if let Some(name) = req.name {
        system.name = name;
    }
    if let Some(address) = req.address {
        system.address = address;
    }
    if let Some(phone_number) = req.phone_number {
        system.phone_number = phone_number;
    }
    if let Some(email) = req.email {
        system.email = email;
    }
    if let Some(website) = req.website {
        system.website = website;
    }
    if let Some(emr_system) = req.emr_system {
        system.emr_system = emr_system;
    }
    if let Some(api_endpoint) = req.api_endpoint {
        system.api_endpoint = api_endpoint;
    }
    if let Some(operating_hours) = req.operating_hours {
        system.operating_hours = operating_hours;
    }
    if let Some(emergency_services) = req.emergency_services {
        system.emergency_services = emergency_services;
    }
    if let Some(bed_capacity) = req.bed_capacity {
        system.bed_capacity = Some(bed_capacity);
    }
    if let Some(current_occupancy) = req.current_occupancy {
        system.current_occupancy = current_occupancy;
    }
    if let Some(subscription_plan) = req.subscription_plan {
        system.subscription_plan = subscription_plan;
    }
    if let Some(is_active) = req.is_active {
        system.is_active = is_active;
    }
    system.updated_at = Utc::now();

    repository.update(&system).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to update healthcare system");
        ErrorResponse::new("internal_error", "Failed to update healthcare system")
    })?;

    tracing::info!(
        system_id = %system_id,
        updated_by = %claims.username,
        "Healthcare system updated"
    );

    Ok(Json(SuccessResponse::new(system)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_system_request_defaults() {
        let json = r#"{
            "name": "Mercy General",
            "system_type": "hospital",
            "address": "1 Hospital Way",
            "city": "Springfield",
            "state": "IL",
            "zip_code": "62701",
            "phone_number": "555-0100",
            "email": "info@mercy.example.com",
            "contract_start_date": "2025-01-01",
            "contract_end_date": "2026-01-01"
        }"#;
        let req: CreateSystemRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.subscription_plan, "basic");
        assert!(!req.emergency_services);
        assert_eq!(req.monthly_fee, 0.0);
    }

    #[test]
    fn test_invalid_system_type_is_parse_error() {
        assert!(SystemType::from_str("pharmacy").is_err());
        assert!(SystemType::from_str("urgent_care").is_ok());
    }
}
