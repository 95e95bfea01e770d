// Consultation repository: symptom-intake records and patient feedback

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{AnalysisOutcome, Consultation, ConsultationFeedback, ConsultationStatus};
use chrono::Utc;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ConsultationRepository {
    pool: DbPool,
}

impl ConsultationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, consultation))]
    pub async fn create(&self, consultation: &Consultation) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO consultations (
                id, patient_id, healthcare_system_id, symptom_description,
                symptom_duration, pain_level, additional_info,
                recommended_department_id, confidence_score, urgency_level,
                icd_suggestions, alternative_departments, engine_execution_id,
                analysis_start_time, analysis_end_time, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(consultation.id)
        .bind(consultation.patient_id)
        .bind(consultation.healthcare_system_id)
        .bind(&consultation.symptom_description)
        .bind(&consultation.symptom_duration)
        .bind(consultation.pain_level)
        .bind(&consultation.additional_info)
        .bind(consultation.recommended_department_id)
        .bind(consultation.confidence_score)
        .bind(&consultation.urgency_level)
        .bind(Json(&consultation.icd_suggestions))
        .bind(&consultation.alternative_departments)
        .bind(&consultation.engine_execution_id)
        .bind(consultation.analysis_start_time)
        .bind(consultation.analysis_end_time)
        .bind(consultation.status.to_string())
        .bind(consultation.created_at)
        .bind(consultation.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(
            consultation_id = %consultation.id,
            patient_id = %consultation.patient_id,
            "Consultation created"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Consultation>, DatabaseError> {
        let consultation =
            sqlx::query_as::<_, Consultation>("SELECT * FROM consultations WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await?;

        Ok(consultation)
    }

    #[instrument(skip(self))]
    pub async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Consultation>, DatabaseError> {
        let consultations = sqlx::query_as::<_, Consultation>(
            "SELECT * FROM consultations WHERE patient_id = $1 ORDER BY created_at DESC",
        )
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(consultations)
    }

    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE consultations SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Consultation not found: {}",
                id
            )));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_execution_id(&self, id: Uuid, execution_id: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE consultations SET engine_execution_id = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(execution_id)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    /// Fold a finished analysis into the consultation and mark it completed
    #[instrument(skip(self, outcome))]
    pub async fn complete_with_outcome(
        &self,
        id: Uuid,
        outcome: &AnalysisOutcome,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE consultations
            SET recommended_department_id = $2,
                confidence_score = $3,
                urgency_level = $4,
                icd_suggestions = $5,
                alternative_departments = $6,
                status = $7,
                analysis_end_time = $8,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(outcome.department_id)
        .bind(outcome.confidence_score)
        .bind(&outcome.urgency_level)
        .bind(Json(&outcome.icd_codes))
        .bind(serde_json::to_value(&outcome.alternatives).unwrap_or_else(|_| serde_json::json!([])))
        .bind(ConsultationStatus::Completed.to_string())
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Consultation not found: {}",
                id
            )));
        }

        tracing::info!(consultation_id = %id, "Consultation completed with analysis results");
        Ok(())
    }

    /// Mark a consultation failed, stamping the analysis end time
    #[instrument(skip(self))]
    pub async fn mark_error(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE consultations
            SET status = $2, analysis_end_time = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(ConsultationStatus::Error.to_string())
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self, feedback))]
    pub async fn create_feedback(
        &self,
        feedback: &ConsultationFeedback,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO consultation_feedback (
                consultation_id, accuracy_rating, helpfulness_rating,
                speed_rating, comments, would_recommend, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(feedback.consultation_id)
        .bind(feedback.accuracy_rating)
        .bind(feedback.helpfulness_rating)
        .bind(feedback.speed_rating)
        .bind(&feedback.comments)
        .bind(feedback.would_recommend)
        .bind(feedback.created_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_feedback(
        &self,
        consultation_id: Uuid,
    ) -> Result<Option<ConsultationFeedback>, DatabaseError> {
        let feedback = sqlx::query_as::<_, ConsultationFeedback>(
            "SELECT * FROM consultation_feedback WHERE consultation_id = $1",
        )
        .bind(consultation_id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(feedback)
    }
}
