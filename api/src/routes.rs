use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{auth_middleware, rbac_middleware};
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/info", get(handlers::index::service_info))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token));

    // Inbound engine callbacks, authenticated by HMAC signature
    let webhook_routes = Router::new()
        .route(
            "/webhooks/engine/symptom-analysis",
            post(handlers::webhooks::symptom_analysis_callback),
        )
        .route(
            "/webhooks/engine/appointment-booking",
            post(handlers::webhooks::appointment_booking_callback),
        )
        .route(
            "/webhooks/engine/workflow-error",
            post(handlers::webhooks::workflow_error_callback),
        );

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        // Account endpoints
        .route("/api/auth/profile", get(handlers::auth::get_profile))
        .route("/api/auth/profile", put(handlers::auth::update_profile))
        .route("/api/auth/change-password", post(handlers::auth::change_password))
        .route("/api/auth/verify", post(handlers::auth::verify_account))
        .route("/api/auth/status", get(handlers::auth::account_status))
        // User management endpoints
        .route("/api/users", get(handlers::users::list_users))
        .route("/api/users/:id", get(handlers::users::get_user))
        .route("/api/users/:id", put(handlers::users::update_user))
        .route("/api/users/:id", delete(handlers::users::delete_user))
        .route(
            "/api/users/:id/doctor-profile",
            post(handlers::users::create_doctor_profile),
        )
        // Reference data endpoints
        .route("/api/departments", get(handlers::departments::list_departments))
        .route("/api/departments", post(handlers::departments::create_department))
        .route("/api/departments/:id", get(handlers::departments::get_department))
        .route("/api/departments/:id", put(handlers::departments::update_department))
        .route(
            "/api/healthcare-systems",
            get(handlers::healthcare_systems::list_systems),
        )
        .route(
            "/api/healthcare-systems",
            post(handlers::healthcare_systems::create_system),
        )
        .route(
            "/api/healthcare-systems/:id",
            get(handlers::healthcare_systems::get_system),
        )
        .route(
            "/api/healthcare-systems/:id",
            put(handlers::healthcare_systems::update_system),
        )
        .route("/api/symptoms", get(handlers::symptoms::list_symptoms))
        .route("/api/symptoms/categories", get(handlers::symptoms::list_categories))
        // Consultation endpoints
        .route(
            "/api/consultations/analyze",
            post(handlers::consultations::analyze_symptoms),
        )
        .route("/api/consultations", get(handlers::consultations::list_consultations))
        .route("/api/consultations/:id", get(handlers::consultations::get_consultation))
        .route(
            "/api/consultations/:id/status",
            get(handlers::consultations::analysis_status),
        )
        .route(
            "/api/consultations/:id/results",
            get(handlers::consultations::analysis_results),
        )
        .route(
            "/api/consultations/:id/feedback",
            post(handlers::consultations::submit_feedback),
        )
        // Appointment endpoints
        .route("/api/appointments", post(handlers::appointments::book_appointment))
        .route("/api/appointments", get(handlers::appointments::list_appointments))
        .route("/api/appointments/:id", get(handlers::appointments::get_appointment))
        .route(
            "/api/appointments/:id/reminders",
            get(handlers::appointments::list_reminders),
        )
        .route(
            "/api/appointments/:id/status",
            put(handlers::appointments::update_status),
        )
        .route(
            "/api/appointments/:id/cancel",
            put(handlers::appointments::cancel_appointment),
        )
        // Workflow administration endpoints
        .route("/api/workflows", get(handlers::workflows::list_workflows))
        .route("/api/workflows", post(handlers::workflows::register_workflow))
        .route("/api/workflows/:id", put(handlers::workflows::update_workflow))
        .route(
            "/api/workflows/executions",
            get(handlers::workflows::list_executions),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    rbac_middleware,
                )),
        );

    // Metrics endpoint (no authentication for Prometheus scraping)
    let metrics_routes = Router::new().route("/metrics", get(handlers::metrics::metrics_handler));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
