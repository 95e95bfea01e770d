// Appointment repository: scheduling records and reminders

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Appointment, AppointmentReminder, AppointmentStatus};
use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppointmentRepository {
    pool: DbPool,
}

impl AppointmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, appointment))]
    pub async fn create(&self, appointment: &Appointment) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, consultation_id, patient_id, doctor_id, department_id,
                healthcare_system_id, scheduled_date, scheduled_time,
                estimated_duration, appointment_type, status, notes,
                cancellation_reason, emr_appointment_id, engine_execution_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(appointment.id)
        .bind(appointment.consultation_id)
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.department_id)
        .bind(appointment.healthcare_system_id)
        .bind(appointment.scheduled_date)
        .bind(appointment.scheduled_time)
        .bind(appointment.estimated_duration)
        .bind(appointment.appointment_type.to_string())
        .bind(appointment.status.to_string())
        .bind(&appointment.notes)
        .bind(&appointment.cancellation_reason)
        .bind(&appointment.emr_appointment_id)
        .bind(&appointment.engine_execution_id)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(
            appointment_id = %appointment.id,
            doctor_id = %appointment.doctor_id,
            "Appointment created"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let appointment =
            sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await?;

        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE patient_id = $1
            ORDER BY scheduled_date, scheduled_time
            "#,
        )
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(appointments)
    }

    #[instrument(skip(self))]
    pub async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE doctor_id = $1
            ORDER BY scheduled_date, scheduled_time
            "#,
        )
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(appointments)
    }

    /// Staff listing with optional status and date filters
    #[instrument(skip(self))]
    pub async fn find_all(
        &self,
        status: Option<&AppointmentStatus>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let appointments = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::date IS NULL OR scheduled_date = $2)
            ORDER BY scheduled_date, scheduled_time
            "#,
        )
        .bind(status.map(|s| s.to_string()))
        .bind(date)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(appointments)
    }

    /// Whether the doctor already has a non-cancelled appointment in the slot
    #[instrument(skip(self))]
    pub async fn slot_taken(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM appointments
            WHERE doctor_id = $1
              AND scheduled_date = $2
              AND scheduled_time = $3
              AND status NOT IN ('cancelled', 'rescheduled')
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .bind(time)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(count > 0)
    }

    #[instrument(skip(self, appointment))]
    pub async fn update(&self, appointment: &Appointment) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET scheduled_date = $2,
                scheduled_time = $3,
                estimated_duration = $4,
                appointment_type = $5,
                status = $6,
                notes = $7,
                cancellation_reason = $8,
                emr_appointment_id = $9,
                engine_execution_id = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(appointment.id)
        .bind(appointment.scheduled_date)
        .bind(appointment.scheduled_time)
        .bind(appointment.estimated_duration)
        .bind(appointment.appointment_type.to_string())
        .bind(appointment.status.to_string())
        .bind(&appointment.notes)
        .bind(&appointment.cancellation_reason)
        .bind(&appointment.emr_appointment_id)
        .bind(&appointment.engine_execution_id)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Appointment not found: {}",
                appointment.id
            )));
        }

        Ok(())
    }

    #[instrument(skip(self, reminder))]
    pub async fn create_reminder(
        &self,
        reminder: &AppointmentReminder,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO appointment_reminders (
                id, appointment_id, channel, scheduled_time, sent_time,
                is_sent, engine_execution_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reminder.id)
        .bind(reminder.appointment_id)
        .bind(reminder.channel.to_string())
        .bind(reminder.scheduled_time)
        .bind(reminder.sent_time)
        .bind(reminder.is_sent)
        .bind(&reminder.engine_execution_id)
        .bind(reminder.created_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_reminders(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<AppointmentReminder>, DatabaseError> {
        let reminders = sqlx::query_as::<_, AppointmentReminder>(
            r#"
            SELECT * FROM appointment_reminders
            WHERE appointment_id = $1
            ORDER BY scheduled_time
            "#,
        )
        .bind(appointment_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(reminders)
    }
}
