use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use common::db::repositories::{DepartmentRepository, UserRepository};
use common::models::{DoctorProfile, User, UserClaims, UserRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_verified: user.is_verified,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorProfileRequest {
    pub license_number: String,
    pub specialization_id: Uuid,
    pub years_of_experience: i32,
    pub education: String,
    #[serde(default)]
    pub certifications: String,
    pub consultation_fee: f64,
    #[serde(default)]
    pub available_hours: Option<serde_json::Value>,
}

fn is_admin(claims: &UserClaims) -> bool {
    claims.permissions.contains(&"user:manage".to_string())
}

/// List all users (admin only)
#[tracing::instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<UserResponse>>>, ErrorResponse> {
    let users = UserRepository::new(state.db_pool.clone())
        .find_all()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list users");
            ErrorResponse::new("internal_error", "Failed to list users")
        })?;

    Ok(Json(SuccessResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
    )))
}

/// Get user by ID (admin, or a user viewing their own record)
#[tracing::instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<UserResponse>>, ErrorResponse> {
    let is_own_record = claims.sub == user_id.to_string();

    if !is_own_record && !is_admin(&claims) {
        return Err(ErrorResponse::new(
            "forbidden",
            "You can only view your own record",
        ));
    }

    let user = UserRepository::new(state.db_pool.clone())
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to get user");
            ErrorResponse::new("internal_error", "Failed to get user")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "User not found"))?;

    Ok(Json(SuccessResponse::new(UserResponse::from(user))))
}

/// Update a user. Admins can activate/deactivate and verify accounts;
/// users can update their own email.
#[tracing::instrument(skip(state, req))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<SuccessResponse<UserResponse>>, ErrorResponse> {
    let is_own_record = claims.sub == user_id.to_string();
    let admin = is_admin(&claims);

    if !admin && !is_own_record {
        return Err(ErrorResponse::new(
            "forbidden",
            "You can only update your own record",
        ));
    }

    if !admin && (req.is_active.is_some() || req.is_verified.is_some()) {
        return Err(ErrorResponse::new(
            "forbidden",
            "Only admins can change account status",
        ));
    }

    let repository = UserRepository::new(state.db_pool.clone());

    let mut user = repository
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to get user");
            ErrorResponse::new("internal_error", "Failed to get user")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "User not found"))?;

    if let Some(email) = req.email {
        user.email = email;
    }
    if let Some(is_active) = req.is_active {
        user.is_active = is_active;
    }
    if let Some(is_verified) = req.is_verified {
        user.is_verified = is_verified;
    }
    user.updated_at = Utc::now();

    repository.update(&user).await.map_err(|e| {
        tracing::error!(error = %e, user_id = %user_id, "Failed to update user");
        ErrorResponse::new("internal_error", "Failed to update user")
    })?;

    tracing::info!(user_id = %user_id, updated_by = %claims.username, "User updated");

    Ok(Json(SuccessResponse::new(UserResponse::from(user))))
}

/// Delete a user (admin only); self-deletion is rejected
#[tracing::instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<()>>, ErrorResponse> {
    if claims.sub == user_id.to_string() {
        return Err(ErrorResponse::new(
            "forbidden",
            "You cannot delete your own account",
        ));
    }

    UserRepository::new(state.db_pool.clone())
        .delete(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to delete user");
            match e {
                common::errors::DatabaseError::NotFound(_) => {
                    ErrorResponse::new("not_found", "User not found")
                }
                _ => ErrorResponse::new("internal_error", "Failed to delete user"),
            }
        })?;

    tracing::info!(user_id = %user_id, deleted_by = %claims.username, "User deleted");

    Ok(Json(SuccessResponse::new(())))
}

/// Register a doctor's professional profile (admin only).
///
/// The target account must already exist with the doctor role.
#[tracing::instrument(skip(state, req))]
pub async fn create_doctor_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<CreateDoctorProfileRequest>,
) -> Result<Json<SuccessResponse<DoctorProfile>>, ErrorResponse> {
    if req.license_number.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "License number is required",
        ));
    }
    if req.years_of_experience < 0 {
        return Err(ErrorResponse::new(
            "validation_error",
            "Years of experience cannot be negative",
        ));
    }
    if req.consultation_fee < 0.0 {
        return Err(ErrorResponse::new(
            "validation_error",
            "Consultation fee cannot be negative",
        ));
    }

    let repository = UserRepository::new(state.db_pool.clone());

    let user = repository
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to get user");
            ErrorResponse::new("internal_error", "Failed to get user")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "User not found"))?;

    if user.role != UserRole::Doctor {
        return Err(ErrorResponse::new(
            "validation_error",
            "User is not a doctor account",
        ));
    }

    DepartmentRepository::new(state.db_pool.clone())
        .find_by_id(req.specialization_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up department");
            ErrorResponse::new("internal_error", "Failed to look up department")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Specialization department not found"))?;

    let now = Utc::now();
    let profile = DoctorProfile {
        user_id,
        license_number: req.license_number,
        specialization_id: req.specialization_id,
        years_of_experience: req.years_of_experience,
        education: req.education,
        certifications: req.certifications,
        consultation_fee: req.consultation_fee,
        available_hours: req.available_hours.unwrap_or_else(|| serde_json::json!({})),
        is_available: true,
        rating: 0.0,
        total_consultations: 0,
        created_at: now,
        updated_at: now,
    };

    repository.create_doctor_profile(&profile).await.map_err(|e| {
        tracing::error!(error = %e, user_id = %user_id, "Failed to create doctor profile");
        match e {
            common::errors::DatabaseError::DuplicateKey(_) => {
                ErrorResponse::new("conflict", "Doctor profile already exists")
            }
            _ => ErrorResponse::new("internal_error", "Failed to create doctor profile"),
        }
    })?;

    tracing::info!(user_id = %user_id, created_by = %claims.username, "Doctor profile created");

    Ok(Json(SuccessResponse::new(profile)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_user_request_deserialization() {
        let json = r#"{"email": "new@example.com", "is_active": false}"#;
        let req: UpdateUserRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.email, Some("new@example.com".to_string()));
        assert_eq!(req.is_active, Some(false));
        assert!(req.is_verified.is_none());
    }

    #[test]
    fn test_create_doctor_profile_request_defaults() {
        let json = r#"{
            "license_number": "MD-12345",
            "specialization_id": "550e8400-e29b-41d4-a716-446655440000",
            "years_of_experience": 7,
            "education": "State Medical University",
            "consultation_fee": 120.0
        }"#;
        let req: CreateDoctorProfileRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.certifications, "");
        assert!(req.available_hours.is_none());
    }
}
