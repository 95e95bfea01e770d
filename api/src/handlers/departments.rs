use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use common::db::repositories::DepartmentRepository;
use common::models::{Department, UrgencyLevel, UserClaims};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub specialization_keywords: Vec<String>,
    #[serde(default)]
    pub icd_code_ranges: Vec<String>,
    pub urgency_level: String,
    #[serde(default = "default_wait_time")]
    pub average_wait_time: i32,
    #[serde(default = "default_consultation_duration")]
    pub consultation_duration: i32,
}

fn default_wait_time() -> i32 {
    30
}

fn default_consultation_duration() -> i32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub description: Option<String>,
    pub specialization_keywords: Option<Vec<String>>,
    pub icd_code_ranges: Option<Vec<String>>,
    pub urgency_level: Option<String>,
    pub average_wait_time: Option<i32>,
    pub consultation_duration: Option<i32>,
    pub is_active: Option<bool>,
}

/// List active departments
#[tracing::instrument(skip(state))]
pub async fn list_departments(
    State(state): State<AppState>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<Department>>>, ErrorResponse> {
    let departments = DepartmentRepository::new(state.db_pool.clone())
        .find_all_active()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list departments");
            ErrorResponse::new("internal_error", "Failed to list departments")
        })?;

    Ok(Json(SuccessResponse::new(departments)))
}

/// Get a department by ID
#[tracing::instrument(skip(state))]
pub async fn get_department(
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Department>>, ErrorResponse> {
    let department = DepartmentRepository::new(state.db_pool.clone())
        .find_by_id(department_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get department");
            ErrorResponse::new("internal_error", "Failed to get department")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Department not found"))?;

    Ok(Json(SuccessResponse::new(department)))
}

/// Create a department (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn create_department(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<Json<SuccessResponse<Department>>, ErrorResponse> {
    if req.name.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Name is required"));
    }

    let urgency_level = UrgencyLevel::from_str(&req.urgency_level)
        .map_err(|e| ErrorResponse::new("validation_error", e))?;

    let now = Utc::now();
    let department = Department {
        id: Uuid::new_v4(),
        name: req.name,
        description: req.description,
        specialization_keywords: req.specialization_keywords,
        icd_code_ranges: req.icd_code_ranges,
        urgency_level,
        average_wait_time: req.average_wait_time,
        consultation_duration: req.consultation_duration,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    DepartmentRepository::new(state.db_pool.clone())
        .create(&department)
        .await
        .map_err(|e| match e {
            common::errors::DatabaseError::DuplicateKey(_) => {
                ErrorResponse::new("conflict", "Department name already exists")
            }
            _ => {
                tracing::error!(error = %e, "Failed to create department");
                ErrorResponse::new("internal_error", "Failed to create department")
            }
        })?;

    tracing::info!(
        department_id = %department.id,
        created_by = %claims.username,
        "Department created"
    );

    Ok(Json(SuccessResponse::new(department)))
}

/// Update a department (admin only)
#[tracing::instrument(skip(state, req))]
pub async fn update_department(
    State(state): State<AppState>,
    Path(department_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> Result<Json<SuccessResponse<Department>>, ErrorResponse> {
    let repository = DepartmentRepository::new(state.db_pool.clone());

    let mut department = repository
        .find_by_id(department_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get department");
            ErrorResponse::new("internal_error", "Failed to get department")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Department not found"))?;

    if let Some(urgency) = req.urgency_level.as_deref() {
        department.urgency_level = UrgencyLevel::from_str(urgency)
            .map_err(|e| ErrorResponse::new("validation_error", e))?;
    }
    if let Some(description) = req.description {
        department.description = description;
    }
    if let Some(keywords) = req.specialization_keywords {
        department.specialization_keywords = keywords;
    }
    if let Some(ranges) = req.icd_code_ranges {
        department.icd_code_ranges = ranges;
    }
    if let Some(wait) = req.average_wait_time {
        department.average_wait_time = wait;
    }
    if let Some(duration) = req.consultation_duration {
        department.consultation_duration = duration;
    }
    if let Some(is_active) = req.is_active {
        department.is_active = is_active;
    }
    department.updated_at = Utc::now();

    repository.update(&department).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to update department");
        ErrorResponse::new("internal_error", "Failed to update department")
    })?;

    tracing::info!(
        department_id = %department_id,
        updated_by = %claims.username,
        "Department updated"
    );

    Ok(Json(SuccessResponse::new(department)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_department_request_defaults() {
        let json = r#"{
            "name": "Cardiology",
            "description": "Heart and cardiovascular conditions",
            "urgency_level": "high"
        }"#;
        let req: CreateDepartmentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.average_wait_time, 30);
        assert_eq!(req.consultation_duration, 20);
        assert!(req.specialization_keywords.is_empty());
    }

    #[test]
    fn test_invalid_urgency_level_is_parse_error() {
        assert!(UrgencyLevel::from_str("critical").is_err());
        assert!(UrgencyLevel::from_str("emergency").is_ok());
    }
}
