// Error handling framework

use thiserror::Error;

/// Authentication and authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Insufficient permissions: required {0}")]
    InsufficientPermissions(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Workflow-engine integration errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No active workflow registered for kind: {0}")]
    NoActiveWorkflow(String),

    #[error("Workflow trigger failed with status {status}: {body}")]
    TriggerRejected { status: u16, body: String },

    #[error("Workflow engine unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),
}

/// Inbound webhook callback errors
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid callback signature")]
    InvalidSignature,

    #[error("Callback rate limit exceeded")]
    RateLimitExceeded,

    #[error("Rate limit check failed: {0}")]
    RateLimitCheckFailed(String),

    #[error("Unknown execution: {0}")]
    UnknownExecution(String),

    #[error("Invalid callback payload: {0}")]
    InvalidPayload(String),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken(_) | AuthError::TokenExpired => {
                "UNAUTHORIZED"
            }
            AuthError::InsufficientPermissions(_) | AuthError::AccountDisabled => "FORBIDDEN",
            _ => "AUTH_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new("VALIDATION_ERROR", err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        let code = match err {
            DatabaseError::NotFound(_) => "NOT_FOUND",
            DatabaseError::DuplicateKey(_) => "CONFLICT",
            _ => "DATABASE_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let code = match err {
            EngineError::NoActiveWorkflow(_) | EngineError::Unreachable(_) => "ENGINE_UNAVAILABLE",
            _ => "ENGINE_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        let code = match err {
            WebhookError::InvalidSignature => "UNAUTHORIZED",
            WebhookError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            WebhookError::UnknownExecution(_) => "NOT_FOUND",
            _ => "WEBHOOK_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Check for specific database error codes
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            EngineError::Unreachable(err.to_string())
        } else {
            EngineError::InvalidResponse(err.to_string())
        }
    }
}

impl From<redis::RedisError> for WebhookError {
    fn from(err: redis::RedisError) -> Self {
        WebhookError::RateLimitCheckFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::InvalidJson(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_to_api_error() {
        let err = AuthError::InvalidCredentials;
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "UNAUTHORIZED");
    }

    #[test]
    fn test_not_found_maps_to_not_found_code() {
        let err = DatabaseError::NotFound("consultation".to_string());
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "NOT_FOUND");
    }

    #[test]
    fn test_engine_unreachable_maps_to_unavailable() {
        let err = EngineError::Unreachable("connection refused".to_string());
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "ENGINE_UNAVAILABLE");
    }

    #[test]
    fn test_api_error_with_details() {
        let err = ApiError::new("TEST_ERROR", "Test message")
            .with_details(serde_json::json!({"field": "value"}));
        assert!(err.details.is_some());
    }
}
