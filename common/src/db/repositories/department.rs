// Department repository

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::Department;
use chrono::Utc;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct DepartmentRepository {
    pool: DbPool,
}

impl DepartmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, department))]
    pub async fn create(&self, department: &Department) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO departments (
                id, name, description, specialization_keywords, icd_code_ranges,
                urgency_level, average_wait_time, consultation_duration,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(Json(&department.specialization_keywords))
        .bind(Json(&department.icd_code_ranges))
        .bind(department.urgency_level.to_string())
        .bind(department.average_wait_time)
        .bind(department.consultation_duration)
        .bind(department.is_active)
        .bind(department.created_at)
        .bind(department.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(department_id = %department.id, name = %department.name, "Department created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Department>, DatabaseError> {
        let department = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(department)
    }

    /// Case-insensitive name lookup, used by the fallback analyzer
    #[instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Department>, DatabaseError> {
        let department = sqlx::query_as::<_, Department>(
            "SELECT * FROM departments WHERE name ILIKE $1 LIMIT 1",
        )
        .bind(format!("%{}%", name))
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(department)
    }

    #[instrument(skip(self))]
    pub async fn find_all_active(&self) -> Result<Vec<Department>, DatabaseError> {
        let departments = sqlx::query_as::<_, Department>(
            "SELECT * FROM departments WHERE is_active = TRUE ORDER BY name",
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(departments)
    }

    #[instrument(skip(self, department))]
    pub async fn update(&self, department: &Department) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE departments
            SET name = $2,
                description = $3,
                specialization_keywords = $4,
                icd_code_ranges = $5,
                urgency_level = $6,
                average_wait_time = $7,
                consultation_duration = $8,
                is_active = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(Json(&department.specialization_keywords))
        .bind(Json(&department.icd_code_ranges))
        .bind(department.urgency_level.to_string())
        .bind(department.average_wait_time)
        .bind(department.consultation_duration)
        .bind(department.is_active)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Department not found: {}",
                department.id
            )));
        }

        Ok(())
    }
}
