use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use common::db::repositories::{
    AppointmentRepository, ConsultationRepository, DepartmentRepository,
    HealthcareSystemRepository, UserRepository, WorkflowRepository,
};
use common::engine::{BookingRequest, WorkflowEngine};
use common::models::{
    Appointment, AppointmentReminder, AppointmentStatus, AppointmentType, ConsultationStatus,
    ReminderChannel, UserClaims, UserRole, WorkflowKind,
};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub consultation_id: Uuid,
    pub doctor_id: Uuid,
    pub healthcare_system_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[serde(default)]
    pub appointment_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

fn parse_user_id(claims: &UserClaims) -> Result<Uuid, ErrorResponse> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| ErrorResponse::new("unauthorized", "Invalid token subject"))
}

/// Reminders scheduled by default for a new appointment: email a day
/// ahead, SMS two hours ahead.
fn default_reminders(appointment: &Appointment) -> Vec<AppointmentReminder> {
    let Some(time) = appointment
        .scheduled_date
        .and_time(appointment.scheduled_time)
        .and_local_timezone(Utc)
        .single()
    else {
        return Vec::new();
    };

    [
        (ReminderChannel::Email, chrono::Duration::hours(24)),
        (ReminderChannel::Sms, chrono::Duration::hours(2)),
    ]
    .into_iter()
    .filter_map(|(channel, lead)| {
        let scheduled_time = time - lead;
        (scheduled_time > Utc::now()).then(|| AppointmentReminder {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            channel,
            scheduled_time,
            sent_time: None,
            is_sent: false,
            engine_execution_id: String::new(),
            created_at: Utc::now(),
        })
    })
    .collect()
}

/// Book an appointment from a completed consultation.
///
/// Validates ownership and the doctor's slot, persists the appointment,
/// triggers the engine's booking workflow, and schedules default reminders.
#[tracing::instrument(skip(state, req))]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<SuccessResponse<Appointment>>), ErrorResponse> {
    let caller_id = parse_user_id(&claims)?;

    let consultation = ConsultationRepository::new(state.db_pool.clone())
        .find_by_id(req.consultation_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load consultation");
            ErrorResponse::new("internal_error", "Failed to load consultation")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Consultation not found"))?;

    // Staff may book on a patient's behalf; patients only for themselves
    if consultation.patient_id != caller_id && !claims.role.is_clinical_staff() {
        return Err(ErrorResponse::new(
            "forbidden",
            "You can only book appointments for your own consultations",
        ));
    }

    if consultation.status != ConsultationStatus::Completed {
        return Err(ErrorResponse::new(
            "validation_error",
            "Consultation analysis must be completed before booking",
        ));
    }

    let department_id = consultation.recommended_department_id.ok_or_else(|| {
        ErrorResponse::new(
            "validation_error",
            "Consultation has no recommended department",
        )
    })?;

    if req.scheduled_date < Utc::now().date_naive() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Appointment date cannot be in the past",
        ));
    }

    let appointment_type = match req.appointment_type.as_deref() {
        None | Some("") => AppointmentType::Consultation,
        Some(raw) => AppointmentType::from_str(raw)
            .map_err(|e| ErrorResponse::new("validation_error", e))?,
    };

    let users = UserRepository::new(state.db_pool.clone());
    let doctor = users
        .find_by_id(req.doctor_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load doctor");
            ErrorResponse::new("internal_error", "Failed to load doctor")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Doctor not found"))?;

    if doctor.role != UserRole::Doctor {
        return Err(ErrorResponse::new("validation_error", "User is not a doctor"));
    }

    if let Some(profile) = users.find_doctor_profile(doctor.id).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load doctor profile");
        ErrorResponse::new("internal_error", "Failed to load doctor profile")
    })? {
        if !profile.is_available {
            return Err(ErrorResponse::new(
                "validation_error",
                "Doctor is not accepting appointments",
            ));
        }
    }

    HealthcareSystemRepository::new(state.db_pool.clone())
        .find_by_id(req.healthcare_system_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load healthcare system");
            ErrorResponse::new("internal_error", "Failed to load healthcare system")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Healthcare system not found"))?;

    let appointments = AppointmentRepository::new(state.db_pool.clone());

    let slot_taken = appointments
        .slot_taken(req.doctor_id, req.scheduled_date, req.scheduled_time)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to check slot");
            ErrorResponse::new("internal_error", "Failed to check appointment slot")
        })?;

    if slot_taken {
        return Err(ErrorResponse::new(
            "conflict",
            "The doctor already has an appointment in that slot",
        ));
    }

    let estimated_duration = DepartmentRepository::new(state.db_pool.clone())
        .find_by_id(department_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load department");
            ErrorResponse::new("internal_error", "Failed to load department")
        })?
        .map(|d| d.consultation_duration)
        .unwrap_or(20);

    let now = Utc::now();
    let mut appointment = Appointment {
        id: Uuid::new_v4(),
        consultation_id: consultation.id,
        patient_id: consultation.patient_id,
        doctor_id: req.doctor_id,
        department_id,
        healthcare_system_id: req.healthcare_system_id,
        scheduled_date: req.scheduled_date,
        scheduled_time: req.scheduled_time,
        estimated_duration,
        appointment_type,
        status: AppointmentStatus::Scheduled,
        notes: req.notes.unwrap_or_default(),
        cancellation_reason: String::new(),
        emr_appointment_id: String::new(),
        engine_execution_id: String::new(),
        created_at: now,
        updated_at: now,
    };

    appointments.create(&appointment).await.map_err(|e| match e {
        common::errors::DatabaseError::DuplicateKey(_) => {
            ErrorResponse::new("conflict", "The doctor already has an appointment in that slot")
        }
        _ => {
            tracing::error!(error = %e, "Failed to create appointment");
            ErrorResponse::new("internal_error", "Failed to create appointment")
        }
    })?;

    if let Err(e) = ConsultationRepository::new(state.db_pool.clone())
        .set_status(consultation.id, ConsultationStatus::Scheduled)
        .await
    {
        tracing::warn!(error = %e, "Failed to mark consultation scheduled");
    }

    // Trigger the engine's booking workflow for EMR propagation; booking
    // confirmation arrives via the appointment-booking callback.
    let workflows = WorkflowRepository::new(state.db_pool.clone());
    if let Ok(Some(workflow)) = workflows
        .find_active_by_kind(WorkflowKind::AppointmentBooking)
        .await
    {
        let booking_request = BookingRequest {
            consultation_id: consultation.id,
            appointment_id: appointment.id,
            patient_id: consultation.patient_id,
            department_id,
            preferred_date: req.scheduled_date.to_string(),
            preferred_time: req.scheduled_time.format("%H:%M").to_string(),
        };

        match state
            .engine
            .trigger_appointment_booking(&workflow, &booking_request)
            .await
        {
            Ok(receipt) => {
                let execution = common::models::WorkflowExecution::new_running(
                    workflow.id,
                    receipt.execution_id.clone(),
                    receipt.input,
                )
                .for_appointment(appointment.id);
                let _ = workflows.create_execution(&execution).await;

                appointment.engine_execution_id = receipt.execution_id;
                appointments.update(&appointment).await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to store booking execution id");
                    ErrorResponse::new("internal_error", "Failed to update appointment")
                })?;
            }
            Err(e) => {
                // The appointment stands; EMR sync is retried out of band
                tracing::warn!(
                    appointment_id = %appointment.id,
                    error = %e,
                    "Booking workflow trigger failed"
                );
            }
        }
    }

    for reminder in default_reminders(&appointment) {
        if let Err(e) = appointments.create_reminder(&reminder).await {
            tracing::warn!(
                appointment_id = %appointment.id,
                error = %e,
                "Failed to schedule reminder"
            );
        }
    }

    tracing::info!(
        appointment_id = %appointment.id,
        patient_id = %appointment.patient_id,
        doctor_id = %appointment.doctor_id,
        "Appointment booked"
    );

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(appointment))))
}

/// List appointments: patients see their own, doctors their schedule,
/// other staff everything (with optional filters).
#[tracing::instrument(skip(state))]
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<AppointmentListQuery>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<Appointment>>>, ErrorResponse> {
    let caller_id = parse_user_id(&claims)?;
    let repository = AppointmentRepository::new(state.db_pool.clone());

    let appointments = match claims.role {
        UserRole::Patient => repository.find_by_patient(caller_id).await,
        UserRole::Doctor => repository.find_by_doctor(caller_id).await,
        _ => {
            let status = match query.status.as_deref() {
                None | Some("") => None,
                Some(raw) => Some(
                    AppointmentStatus::from_str(raw)
                        .map_err(|e| ErrorResponse::new("validation_error", e))?,
                ),
            };
            repository.find_all(status.as_ref(), query.date).await
        }
    }
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to list appointments");
        ErrorResponse::new("internal_error", "Failed to list appointments")
    })?;

    Ok(Json(SuccessResponse::new(appointments)))
}

async fn load_visible_appointment(
    state: &AppState,
    claims: &UserClaims,
    appointment_id: Uuid,
) -> Result<Appointment, ErrorResponse> {
    let appointment = AppointmentRepository::new(state.db_pool.clone())
        .find_by_id(appointment_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load appointment");
            ErrorResponse::new("internal_error", "Failed to load appointment")
        })?
        .ok_or_else(|| ErrorResponse::new("not_found", "Appointment not found"))?;

    let caller_id = parse_user_id(claims)?;
    let is_participant = appointment.patient_id == caller_id || appointment.doctor_id == caller_id;

    if !is_participant && !claims.role.is_clinical_staff() {
        return Err(ErrorResponse::new(
            "forbidden",
            "You can only view your own appointments",
        ));
    }

    Ok(appointment)
}

/// Appointment detail (participant or staff)
#[tracing::instrument(skip(state))]
pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Appointment>>, ErrorResponse> {
    let appointment = load_visible_appointment(&state, &claims, appointment_id).await?;
    Ok(Json(SuccessResponse::new(appointment)))
}

/// Reminders scheduled for an appointment (participant or staff)
#[tracing::instrument(skip(state))]
pub async fn list_reminders(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<Vec<AppointmentReminder>>>, ErrorResponse> {
    let appointment = load_visible_appointment(&state, &claims, appointment_id).await?;

    let reminders = AppointmentRepository::new(state.db_pool.clone())
        .find_reminders(appointment.id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list reminders");
            ErrorResponse::new("internal_error", "Failed to list reminders")
        })?;

    Ok(Json(SuccessResponse::new(reminders)))
}

/// Update appointment lifecycle status (staff only, via RBAC)
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<SuccessResponse<Appointment>>, ErrorResponse> {
    let status = AppointmentStatus::from_str(&req.status)
        .map_err(|e| ErrorResponse::new("validation_error", e))?;

    if status == AppointmentStatus::Cancelled {
        return Err(ErrorResponse::new(
            "validation_error",
            "Use the cancel endpoint to cancel appointments",
        ));
    }

    let mut appointment = load_visible_appointment(&state, &claims, appointment_id).await?;

    appointment.status = status;
    if let Some(notes) = req.notes {
        appointment.notes = notes;
    }
    appointment.updated_at = Utc::now();

    AppointmentRepository::new(state.db_pool.clone())
        .update(&appointment)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update appointment");
            ErrorResponse::new("internal_error", "Failed to update appointment")
        })?;

    tracing::info!(
        appointment_id = %appointment_id,
        status = %appointment.status,
        updated_by = %claims.username,
        "Appointment status updated"
    );

    Ok(Json(SuccessResponse::new(appointment)))
}

/// Cancel an appointment with a reason (patient or staff)
#[tracing::instrument(skip(state, req))]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<SuccessResponse<Appointment>>, ErrorResponse> {
    if req.reason.trim().is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Cancellation reason is required",
        ));
    }

    let mut appointment = load_visible_appointment(&state, &claims, appointment_id).await?;

    if matches!(
        appointment.status,
        AppointmentStatus::Completed | AppointmentStatus::Cancelled
    ) {
        return Err(ErrorResponse::new(
            "validation_error",
            "Appointment can no longer be cancelled",
        ));
    }

    appointment.status = AppointmentStatus::Cancelled;
    appointment.cancellation_reason = req.reason;
    appointment.updated_at = Utc::now();

    AppointmentRepository::new(state.db_pool.clone())
        .update(&appointment)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to cancel appointment");
            ErrorResponse::new("internal_error", "Failed to cancel appointment")
        })?;

    // Fire-and-forget cancellation notice through the notification workflow
    let workflows = WorkflowRepository::new(state.db_pool.clone());
    if let Ok(Some(workflow)) = workflows.find_active_by_kind(WorkflowKind::Notification).await {
        let payload = serde_json::json!({
            "notification_type": "appointment_cancelled",
            "appointment_id": appointment.id,
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "reason": appointment.cancellation_reason,
        });
        if let Err(e) = state.engine.trigger_notification(&workflow, payload).await {
            tracing::warn!(
                appointment_id = %appointment.id,
                error = %e,
                "Cancellation notification failed"
            );
        }
    }

    tracing::info!(
        appointment_id = %appointment_id,
        cancelled_by = %claims.username,
        "Appointment cancelled"
    );

    Ok(Json(SuccessResponse::new(appointment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_request_defaults_type() {
        let json = r#"{
            "consultation_id": "550e8400-e29b-41d4-a716-446655440000",
            "doctor_id": "550e8400-e29b-41d4-a716-446655440001",
            "healthcare_system_id": "550e8400-e29b-41d4-a716-446655440002",
            "scheduled_date": "2027-03-01",
            "scheduled_time": "10:30:00"
        }"#;
        let req: BookAppointmentRequest = serde_json::from_str(json).unwrap();
        assert!(req.appointment_type.is_none());
        assert!(req.notes.is_none());
    }

    #[test]
    fn test_default_reminders_precede_appointment() {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            consultation_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            department_id: Uuid::new_v4(),
            healthcare_system_id: Uuid::new_v4(),
            scheduled_date: (now + chrono::Duration::days(7)).date_naive(),
            scheduled_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            estimated_duration: 20,
            appointment_type: AppointmentType::Consultation,
            status: AppointmentStatus::Scheduled,
            notes: String::new(),
            cancellation_reason: String::new(),
            emr_appointment_id: String::new(),
            engine_execution_id: String::new(),
            created_at: now,
            updated_at: now,
        };

        let reminders = default_reminders(&appointment);
        assert_eq!(reminders.len(), 2);

        let appointment_time = appointment
            .scheduled_date
            .and_time(appointment.scheduled_time)
            .and_local_timezone(Utc)
            .single()
            .unwrap();
        for reminder in &reminders {
            assert!(reminder.scheduled_time < appointment_time);
            assert!(!reminder.is_sent);
        }
    }

    #[test]
    fn test_default_reminders_skip_past_times() {
        let now = Utc::now();
        let soon = now + chrono::Duration::hours(1);
        let appointment = Appointment {
            id: Uuid::new_v4(),
            consultation_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            department_id: Uuid::new_v4(),
            healthcare_system_id: Uuid::new_v4(),
            scheduled_date: soon.date_naive(),
            scheduled_time: soon.time(),
            estimated_duration: 20,
            appointment_type: AppointmentType::Emergency,
            status: AppointmentStatus::Scheduled,
            notes: String::new(),
            cancellation_reason: String::new(),
            emr_appointment_id: String::new(),
            engine_execution_id: String::new(),
            created_at: now,
            updated_at: now,
        };

        // Both lead times fall before now for an appointment one hour out
        assert!(default_reminders(&appointment).is_empty());
    }
}
