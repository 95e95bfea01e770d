// Authentication and JWT token handling

use crate::db::repositories::UserRepository;
use crate::errors::{AuthError, DatabaseError};
use crate::models::{PatientProfile, User, UserClaims, UserRole};
use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

/// JWT token service for encoding and decoding tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    expiration_hours: i64,
}

impl JwtService {
    #[instrument(skip(secret))]
    pub fn new(secret: &str, expiration_hours: u64) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            expiration_hours: expiration_hours as i64,
        }
    }

    /// Encode claims for a user into a JWT token
    #[instrument(skip(self))]
    pub fn encode_token(
        &self,
        user_id: &str,
        username: &str,
        role: UserRole,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.expiration_hours)).timestamp();
        let iat = now.timestamp();

        let claims = UserClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            permissions: role.permissions(),
            exp,
            iat,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to encode JWT token");
            AuthError::AuthenticationFailed(format!("Failed to encode token: {}", e))
        })
    }

    /// Decode and validate a JWT token
    #[instrument(skip(self, token))]
    pub fn decode_token(&self, token: &str) -> Result<UserClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(format!("Token validation failed: {}", e)),
                }
            })?;

        Ok(token_data.claims)
    }

    pub fn expiration_hours(&self) -> i64 {
        self.expiration_hours
    }
}

/// Parameters for a new account registration
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

/// Account service: registration, login, and password management
#[derive(Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    user_repository: Arc<UserRepository>,
}

impl AuthService {
    pub fn new(jwt_service: JwtService, user_repository: UserRepository) -> Self {
        Self {
            jwt_service,
            user_repository: Arc::new(user_repository),
        }
    }

    /// Register a new account with a bcrypt-hashed password.
    ///
    /// Patients get an empty patient profile automatically; doctor profiles
    /// are registered separately with professional credentials.
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub async fn register(&self, new_user: NewUser) -> Result<User, AuthError> {
        let password_hash = bcrypt::hash(&new_user.password, bcrypt::DEFAULT_COST).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            AuthError::AuthenticationFailed(format!("Password hashing failed: {}", e))
        })?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            role: new_user.role,
            phone_number: new_user.phone_number,
            date_of_birth: new_user.date_of_birth,
            gender: new_user.gender,
            emergency_contact: String::new(),
            medical_history: String::new(),
            allergies: String::new(),
            current_medications: String::new(),
            preferred_language: "en".to_string(),
            is_verified: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.user_repository.create(&user).await.map_err(|e| match e {
            DatabaseError::DuplicateKey(_) => {
                AuthError::AuthenticationFailed("Username already exists".to_string())
            }
            _ => {
                error!(error = %e, "Failed to create user");
                AuthError::AuthenticationFailed(format!("Failed to create user: {}", e))
            }
        })?;

        if user.role == UserRole::Patient {
            self.user_repository
                .create_patient_profile(&PatientProfile::new(user.id))
                .await
                .map_err(|e| {
                    error!(error = %e, user_id = %user.id, "Failed to create patient profile");
                    AuthError::AuthenticationFailed(format!(
                        "Failed to create patient profile: {}",
                        e
                    ))
                })?;
        }

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Authenticate with username and password, returning a token and the user
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(String, User), AuthError> {
        let user = self
            .user_repository
            .find_by_username(username)
            .await
            .map_err(|e| {
                error!(error = %e, username = %username, "Database error during login");
                AuthError::AuthenticationFailed(format!("Database error: {}", e))
            })?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active {
            tracing::warn!(username = %username, "Login attempt for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let password_valid = bcrypt::verify(password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            AuthError::AuthenticationFailed(format!("Password verification failed: {}", e))
        })?;

        if !password_valid {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .jwt_service
            .encode_token(&user.id.to_string(), &user.username, user.role)?;

        tracing::info!(user_id = %user.id, username = %user.username, "User logged in");
        Ok((token, user))
    }

    /// Change password after verifying the current one
    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self
            .user_repository
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::AuthenticationFailed(format!("Database error: {}", e)))?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;

        let old_valid = bcrypt::verify(old_password, &user.password_hash).map_err(|e| {
            AuthError::AuthenticationFailed(format!("Password verification failed: {}", e))
        })?;

        if !old_valid {
            return Err(AuthError::InvalidCredentials);
        }

        user.password_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST).map_err(|e| {
            AuthError::AuthenticationFailed(format!("Password hashing failed: {}", e))
        })?;
        user.updated_at = Utc::now();

        self.user_repository.update(&user).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to update password");
            AuthError::AuthenticationFailed(format!("Failed to update password: {}", e))
        })?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_service_encode_decode() {
        let service = JwtService::new("test-secret", 24);

        let token = service
            .encode_token("user-123", "pat.doe", UserRole::Patient)
            .expect("Failed to encode token");

        let claims = service.decode_token(&token).expect("Failed to decode token");

        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.username, "pat.doe");
        assert_eq!(claims.role, UserRole::Patient);
        assert!(claims.permissions.contains(&"consultation:create".to_string()));
    }

    #[test]
    fn test_jwt_service_expired_token() {
        let service = JwtService::new("test-secret", 1);

        let now = Utc::now();
        let claims = UserClaims {
            sub: "user-123".to_string(),
            username: "pat.doe".to_string(),
            role: UserRole::Patient,
            permissions: vec![],
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::hours(2)).timestamp(),
        };

        let encoding_key = EncodingKey::from_secret("test-secret".as_bytes());
        let token =
            encode(&Header::default(), &claims, &encoding_key).expect("Failed to encode token");

        let result = service.decode_token(&token);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_jwt_service_invalid_token() {
        let service = JwtService::new("test-secret", 24);
        let result = service.decode_token("invalid.token.here");
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_jwt_service_wrong_secret_rejected() {
        let service = JwtService::new("secret-a", 24);
        let other = JwtService::new("secret-b", 24);

        let token = service
            .encode_token("user-123", "pat.doe", UserRole::Doctor)
            .unwrap();

        assert!(matches!(
            other.decode_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
