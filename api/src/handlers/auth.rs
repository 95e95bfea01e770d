use axum::{extract::State, Extension, Json};
use chrono::{Duration, NaiveDate, Utc};
use common::auth::{AuthService, JwtService, NewUser};
use common::db::repositories::UserRepository;
use common::errors::AuthError;
use common::models::{User, UserClaims, UserRole};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_verified: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            is_verified: user.is_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: UserSummary,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenResponse {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub emergency_contact: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub preferred_language: Option<String>,
    // Patient-profile fields, ignored for non-patient accounts
    pub insurance_provider: Option<String>,
    pub insurance_number: Option<String>,
    pub primary_care_physician: Option<String>,
    pub preferred_system_id: Option<uuid::Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Validate a new password against length and confirmation rules
fn validate_new_password(password: &str, confirm: &str) -> Result<(), ErrorResponse> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ErrorResponse::new(
            "validation_error",
            "Password must be at least 8 characters",
        ));
    }
    if password != confirm {
        return Err(ErrorResponse::new(
            "validation_error",
            "Passwords don't match",
        ));
    }
    Ok(())
}

fn auth_service(state: &AppState) -> AuthService {
    let jwt_service = JwtService::new(
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_expiration_hours,
    );
    AuthService::new(jwt_service, UserRepository::new(state.db_pool.clone()))
}

/// Register a new user with role-based setup
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SuccessResponse<RegisterResponse>>, ErrorResponse> {
    if req.username.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Username is required"));
    }
    if req.email.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Email is required"));
    }
    if req.first_name.is_empty() || req.last_name.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "First and last name are required",
        ));
    }
    validate_new_password(&req.password, &req.password_confirm)?;

    let role = match req.role.as_deref() {
        None | Some("") => UserRole::Patient,
        Some(raw) => UserRole::from_str(raw)
            .map_err(|e| ErrorResponse::new("validation_error", e))?,
    };

    // Only patient and doctor accounts may self-register; staff accounts are
    // provisioned by an administrator.
    if !matches!(role, UserRole::Patient | UserRole::Doctor) {
        return Err(ErrorResponse::new(
            "validation_error",
            "Only patient and doctor accounts can self-register",
        ));
    }

    if let Some(gender) = req.gender.as_deref() {
        if common::models::Gender::from_str(gender).is_err() {
            return Err(ErrorResponse::new("validation_error", "Invalid gender"));
        }
    }

    let user = auth_service(&state)
        .register(NewUser {
            username: req.username,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            role,
            phone_number: req.phone_number.unwrap_or_default(),
            date_of_birth: req.date_of_birth,
            gender: req.gender,
        })
        .await
        .map_err(|e| match e {
            AuthError::AuthenticationFailed(msg) if msg.contains("already exists") => {
                ErrorResponse::new("conflict", "Username already exists")
            }
            _ => {
                tracing::error!(error = %e, "Registration failed");
                ErrorResponse::new("internal_error", "Failed to register user")
            }
        })?;

    Ok(Json(SuccessResponse::new(RegisterResponse {
        user_id: user.id,
        username: user.username,
        email: user.email,
        role: user.role,
    })))
}

/// Login endpoint: validates credentials and returns a JWT with user summary
#[tracing::instrument(skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SuccessResponse<LoginResponse>>, ErrorResponse> {
    if req.username.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Username is required"));
    }
    if req.password.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Password is required"));
    }

    let (token, user) = auth_service(&state)
        .login(&req.username, &req.password)
        .await
        .map_err(|e| {
            tracing::warn!(username = %req.username, error = %e, "Login failed");
            match e {
                AuthError::InvalidCredentials => {
                    ErrorResponse::new("unauthorized", "Invalid username or password")
                }
                AuthError::AccountDisabled => {
                    ErrorResponse::new("forbidden", "Account is disabled")
                }
                _ => ErrorResponse::new("internal_error", "Authentication failed"),
            }
        })?;

    let expires_at = (Utc::now()
        + Duration::hours(state.config.auth.jwt_expiration_hours as i64))
    .timestamp();

    Ok(Json(SuccessResponse::new(LoginResponse {
        token,
        expires_at,
        user: UserSummary::from(&user),
    })))
}

/// Refresh token endpoint: issues a new JWT from a valid existing one
#[tracing::instrument(skip(state, req))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<SuccessResponse<RefreshTokenResponse>>, ErrorResponse> {
    if req.token.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Token is required"));
    }

    let jwt_service = JwtService::new(
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_expiration_hours,
    );

    let claims = jwt_service.decode_token(&req.token).map_err(|e| {
        tracing::warn!(error = %e, "Token refresh failed");
        match e {
            AuthError::TokenExpired => ErrorResponse::new("unauthorized", "Token has expired"),
            AuthError::InvalidToken(msg) => ErrorResponse::new("unauthorized", msg),
            _ => ErrorResponse::new("unauthorized", "Invalid token"),
        }
    })?;

    let new_token = jwt_service
        .encode_token(&claims.sub, &claims.username, claims.role)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to generate new token");
            ErrorResponse::new("internal_error", "Failed to generate new token")
        })?;

    let expires_at = (Utc::now()
        + Duration::hours(state.config.auth.jwt_expiration_hours as i64))
    .timestamp();

    tracing::info!(user_id = %claims.sub, "Token refreshed");

    Ok(Json(SuccessResponse::new(RefreshTokenResponse {
        token: new_token,
        expires_at,
    })))
}

/// Profile response with role-based sections: the patient block only for
/// patients, the doctor block only for doctors.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_profile: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_profile: Option<serde_json::Value>,
}

async fn load_profile(state: &AppState, user: &User) -> Result<ProfileResponse, ErrorResponse> {
    let repository = UserRepository::new(state.db_pool.clone());

    let user_block = serde_json::json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "role": user.role,
        "phone_number": user.phone_number,
        "date_of_birth": user.date_of_birth,
        "gender": user.gender,
        "emergency_contact": user.emergency_contact,
        "medical_history": user.medical_history,
        "allergies": user.allergies,
        "current_medications": user.current_medications,
        "preferred_language": user.preferred_language,
        "is_verified": user.is_verified,
    });

    let patient_profile = if user.role == UserRole::Patient {
        repository
            .find_patient_profile(user.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to load patient profile");
                ErrorResponse::new("internal_error", "Failed to load profile")
            })?
            .map(|p| {
                serde_json::json!({
                    "insurance_provider": p.insurance_provider,
                    "insurance_number": p.insurance_number,
                    "primary_care_physician": p.primary_care_physician,
                    "preferred_system_id": p.preferred_system_id,
                })
            })
    } else {
        None
    };

    let doctor_profile = if user.role == UserRole::Doctor {
        repository
            .find_doctor_profile(user.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to load doctor profile");
                ErrorResponse::new("internal_error", "Failed to load profile")
            })?
            .map(|p| {
                serde_json::json!({
                    "license_number": p.license_number,
                    "specialization_id": p.specialization_id,
                    "years_of_experience": p.years_of_experience,
                    "consultation_fee": p.consultation_fee,
                    "is_available": p.is_available,
                    "rating": p.rating,
                })
            })
    } else {
        None
    };

    Ok(ProfileResponse {
        user: user_block,
        patient_profile,
        doctor_profile,
    })
}

async fn current_user(state: &AppState, claims: &UserClaims) -> Result<User, ErrorResponse> {
    let user_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| ErrorResponse::new("unauthorized", "Invalid token subject"))?;

    UserRepository::new(state.db_pool.clone())
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load user");
            ErrorResponse::new("internal_error", "Failed to load user")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "User not found"))
}

/// Get the current user's profile
#[tracing::instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<ProfileResponse>>, ErrorResponse> {
    let user = current_user(&state, &claims).await?;
    let profile = load_profile(&state, &user).await?;
    Ok(Json(SuccessResponse::new(profile)))
}

/// Partial update of the current user's contact and medical fields.
/// Username and role are immutable.
#[tracing::instrument(skip(state, req))]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<SuccessResponse<ProfileResponse>>, ErrorResponse> {
    let mut user = current_user(&state, &claims).await?;

    if let Some(gender) = req.gender.as_deref() {
        if common::models::Gender::from_str(gender).is_err() {
            return Err(ErrorResponse::new("validation_error", "Invalid gender"));
        }
    }

    if let Some(email) = req.email {
        user.email = email;
    }
    if let Some(first_name) = req.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        user.last_name = last_name;
    }
    if let Some(phone_number) = req.phone_number {
        user.phone_number = phone_number;
    }
    if let Some(date_of_birth) = req.date_of_birth {
        user.date_of_birth = Some(date_of_birth);
    }
    if let Some(gender) = req.gender {
        user.gender = Some(gender);
    }
    if let Some(emergency_contact) = req.emergency_contact {
        user.emergency_contact = emergency_contact;
    }
    if let Some(medical_history) = req.medical_history {
        user.medical_history = medical_history;
    }
    if let Some(allergies) = req.allergies {
        user.allergies = allergies;
    }
    if let Some(current_medications) = req.current_medications {
        user.current_medications = current_medications;
    }
    if let Some(preferred_language) = req.preferred_language {
        user.preferred_language = preferred_language;
    }
    user.updated_at = Utc::now();

    let repository = UserRepository::new(state.db_pool.clone());
    repository.update(&user).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to update profile");
        ErrorResponse::new("internal_error", "Failed to update profile")
    })?;

    // Patient-profile fields live on the 1:1 extension record
    let touches_patient_profile = req.insurance_provider.is_some()
        || req.insurance_number.is_some()
        || req.primary_care_physician.is_some()
        || req.preferred_system_id.is_some();

    if user.role == UserRole::Patient && touches_patient_profile {
        let existing = repository
            .find_patient_profile(user.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to load patient profile");
                ErrorResponse::new("internal_error", "Failed to load patient profile")
            })?;

        let is_new = existing.is_none();
        let mut profile =
            existing.unwrap_or_else(|| common::models::PatientProfile::new(user.id));

        if let Some(insurance_provider) = req.insurance_provider {
            profile.insurance_provider = insurance_provider;
        }
        if let Some(insurance_number) = req.insurance_number {
            profile.insurance_number = insurance_number;
        }
        if let Some(primary_care_physician) = req.primary_care_physician {
            profile.primary_care_physician = primary_care_physician;
        }
        if let Some(preferred_system_id) = req.preferred_system_id {
            profile.preferred_system_id = Some(preferred_system_id);
        }

        let result = if is_new {
            repository.create_patient_profile(&profile).await
        } else {
            repository.update_patient_profile(&profile).await
        };
        result.map_err(|e| {
            tracing::error!(error = %e, "Failed to update patient profile");
            ErrorResponse::new("internal_error", "Failed to update patient profile")
        })?;
    }

    let profile = load_profile(&state, &user).await?;
    Ok(Json(SuccessResponse::new(profile)))
}

/// Change password after verifying the current one
#[tracing::instrument(skip(state, req))]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse<()>>, ErrorResponse> {
    validate_new_password(&req.new_password, &req.new_password_confirm)?;

    let user_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| ErrorResponse::new("unauthorized", "Invalid token subject"))?;

    auth_service(&state)
        .change_password(user_id, &req.old_password, &req.new_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                ErrorResponse::new("validation_error", "Old password is incorrect")
            }
            _ => {
                tracing::error!(error = %e, "Password change failed");
                ErrorResponse::new("internal_error", "Failed to change password")
            }
        })?;

    Ok(Json(SuccessResponse::new(())))
}

/// Mark the account verified.
///
/// Placeholder for a document-review pipeline; in production this would gate
/// on uploaded documentation and an admin decision.
#[tracing::instrument(skip(state))]
pub async fn verify_account(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<serde_json::Value>>, ErrorResponse> {
    let mut user = current_user(&state, &claims).await?;

    if user.is_verified {
        return Ok(Json(SuccessResponse::new(serde_json::json!({
            "message": "User already verified"
        }))));
    }

    user.is_verified = true;
    user.updated_at = Utc::now();

    UserRepository::new(state.db_pool.clone())
        .update(&user)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to verify account");
            ErrorResponse::new("internal_error", "Failed to verify account")
        })?;

    tracing::info!(user_id = %user.id, "Account verified");

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "message": "User verification initiated",
        "status": "pending_review"
    }))))
}

/// Current account status and derived permissions
#[tracing::instrument(skip(state))]
pub async fn account_status(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<serde_json::Value>>, ErrorResponse> {
    let user = current_user(&state, &claims).await?;

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "user_id": user.id,
        "username": user.username,
        "role": user.role,
        "is_verified": user.is_verified,
        "is_active": user.is_active,
        "permissions": user.role.permissions(),
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_deserialization() {
        let json = r#"{"username": "pat.doe", "password": "hunter22"}"#;
        let req: LoginRequest = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(req.username, "pat.doe");
        assert_eq!(req.password, "hunter22");
    }

    #[test]
    fn test_register_request_defaults_role() {
        let json = r#"{
            "username": "pat.doe",
            "email": "pat@example.com",
            "password": "secret-password",
            "password_confirm": "secret-password",
            "first_name": "Pat",
            "last_name": "Doe"
        }"#;
        let req: RegisterRequest = serde_json::from_str(json).expect("Failed to deserialize");
        assert!(req.role.is_none());
        assert!(req.date_of_birth.is_none());
    }

    #[test]
    fn test_validate_new_password_rejects_short() {
        assert!(validate_new_password("short", "short").is_err());
    }

    #[test]
    fn test_validate_new_password_rejects_mismatch() {
        assert!(validate_new_password("long-enough-1", "long-enough-2").is_err());
    }

    #[test]
    fn test_validate_new_password_accepts_valid() {
        assert!(validate_new_password("long-enough", "long-enough").is_ok());
    }

    #[test]
    fn test_user_summary_from_user() {
        let user = User {
            id: uuid::Uuid::new_v4(),
            username: "dr.smith".into(),
            email: "smith@example.com".into(),
            password_hash: "hash".into(),
            first_name: "Ada".into(),
            last_name: "Smith".into(),
            role: UserRole::Doctor,
            phone_number: String::new(),
            date_of_birth: None,
            gender: None,
            emergency_contact: String::new(),
            medical_history: String::new(),
            allergies: String::new(),
            current_medications: String::new(),
            preferred_language: "en".into(),
            is_verified: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let summary = UserSummary::from(&user);
        assert_eq!(summary.id, user.id);
        assert_eq!(summary.role, UserRole::Doctor);
        assert!(summary.is_verified);
    }
}
