// Workflow repository: engine workflow registrations and execution audit trail

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{ExecutionStatus, Workflow, WorkflowExecution, WorkflowKind};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct WorkflowRepository {
    pool: DbPool,
}

impl WorkflowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, workflow))]
    pub async fn create(&self, workflow: &Workflow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO workflows (
                id, name, kind, engine_workflow_id, version, description,
                is_active, webhook_url, callback_secret, configuration,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(workflow.id)
        .bind(&workflow.name)
        .bind(workflow.kind.to_string())
        .bind(&workflow.engine_workflow_id)
        .bind(&workflow.version)
        .bind(&workflow.description)
        .bind(workflow.is_active)
        .bind(&workflow.webhook_url)
        .bind(&workflow.callback_secret)
        .bind(&workflow.configuration)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "Workflow registered");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Workflow>, DatabaseError> {
        let workflow = sqlx::query_as::<_, Workflow>("SELECT * FROM workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(workflow)
    }

    /// The active workflow for a kind; at most one is honored per kind
    #[instrument(skip(self))]
    pub async fn find_active_by_kind(
        &self,
        kind: WorkflowKind,
    ) -> Result<Option<Workflow>, DatabaseError> {
        let workflow = sqlx::query_as::<_, Workflow>(
            r#"
            SELECT * FROM workflows
            WHERE kind = $1 AND is_active = TRUE
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(kind.to_string())
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(workflow)
    }

    #[instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<Workflow>, DatabaseError> {
        let workflows = sqlx::query_as::<_, Workflow>("SELECT * FROM workflows ORDER BY name")
            .fetch_all(self.pool.pool())
            .await?;

        Ok(workflows)
    }

    #[instrument(skip(self, workflow))]
    pub async fn update(&self, workflow: &Workflow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET name = $2,
                kind = $3,
                engine_workflow_id = $4,
                version = $5,
                description = $6,
                is_active = $7,
                webhook_url = $8,
                callback_secret = $9,
                configuration = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(workflow.id)
        .bind(&workflow.name)
        .bind(workflow.kind.to_string())
        .bind(&workflow.engine_workflow_id)
        .bind(&workflow.version)
        .bind(&workflow.description)
        .bind(workflow.is_active)
        .bind(&workflow.webhook_url)
        .bind(&workflow.callback_secret)
        .bind(&workflow.configuration)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Workflow not found: {}",
                workflow.id
            )));
        }

        Ok(())
    }

    #[instrument(skip(self, execution))]
    pub async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_executions (
                id, workflow_id, engine_execution_id, consultation_id,
                appointment_id, input_data, output_data, status, error_message,
                start_time, end_time, execution_time_ms, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(execution.id)
        .bind(execution.workflow_id)
        .bind(&execution.engine_execution_id)
        .bind(execution.consultation_id)
        .bind(execution.appointment_id)
        .bind(&execution.input_data)
        .bind(&execution.output_data)
        .bind(execution.status.to_string())
        .bind(&execution.error_message)
        .bind(execution.start_time)
        .bind(execution.end_time)
        .bind(execution.execution_time_ms)
        .bind(execution.created_at)
        .bind(execution.updated_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_execution_by_engine_id(
        &self,
        engine_execution_id: &str,
    ) -> Result<Option<WorkflowExecution>, DatabaseError> {
        let execution = sqlx::query_as::<_, WorkflowExecution>(
            "SELECT * FROM workflow_executions WHERE engine_execution_id = $1",
        )
        .bind(engine_execution_id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(execution)
    }

    /// Record the outcome of a finished execution
    #[instrument(skip(self, output_data))]
    pub async fn finish_execution(
        &self,
        engine_execution_id: &str,
        status: ExecutionStatus,
        output_data: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $2,
                output_data = $3,
                error_message = COALESCE($4, error_message),
                end_time = $5,
                execution_time_ms = (EXTRACT(EPOCH FROM ($5 - start_time)) * 1000)::BIGINT,
                updated_at = $5
            WHERE engine_execution_id = $1
            "#,
        )
        .bind(engine_execution_id)
        .bind(status.to_string())
        .bind(output_data)
        .bind(error_message)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Execution not found: {}",
                engine_execution_id
            )));
        }

        Ok(())
    }

    /// Execution audit trail, optionally filtered by kind and status
    #[instrument(skip(self))]
    pub async fn list_executions(
        &self,
        kind: Option<WorkflowKind>,
        status: Option<ExecutionStatus>,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, DatabaseError> {
        let executions = sqlx::query_as::<_, WorkflowExecution>(
            r#"
            SELECT e.*
            FROM workflow_executions e
            JOIN workflows w ON w.id = e.workflow_id
            WHERE ($1::text IS NULL OR w.kind = $1)
              AND ($2::text IS NULL OR e.status = $2)
            ORDER BY e.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(kind.map(|k| k.to_string()))
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(executions)
    }
}
