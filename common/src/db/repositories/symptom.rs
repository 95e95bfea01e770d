// Symptom taxonomy repository: categories, symptoms, department mappings

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Symptom, SymptomCategory, SymptomDepartmentMapping};
use sqlx::types::Json;
use tracing::instrument;

#[derive(Clone)]
pub struct SymptomRepository {
    pool: DbPool,
}

impl SymptomRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, category))]
    pub async fn create_category(&self, category: &SymptomCategory) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO symptom_categories (
                id, name, description, parent_category_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.parent_category_id)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_categories(&self) -> Result<Vec<SymptomCategory>, DatabaseError> {
        let categories = sqlx::query_as::<_, SymptomCategory>(
            "SELECT * FROM symptom_categories ORDER BY name",
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(categories)
    }

    #[instrument(skip(self, symptom))]
    pub async fn create_symptom(&self, symptom: &Symptom) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO symptoms (
                id, name, description, category_id, keywords, severity_indicators,
                icd_codes, is_emergency_indicator, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(symptom.id)
        .bind(&symptom.name)
        .bind(&symptom.description)
        .bind(symptom.category_id)
        .bind(Json(&symptom.keywords))
        .bind(Json(&symptom.severity_indicators))
        .bind(Json(&symptom.icd_codes))
        .bind(symptom.is_emergency_indicator)
        .bind(symptom.created_at)
        .bind(symptom.updated_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    /// Browse symptoms, optionally narrowed by category name and a free-text
    /// search over name, description, and alternative keywords.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Symptom>, DatabaseError> {
        let category_filter = category.map(|c| format!("%{}%", c));
        let search_filter = search.map(|s| format!("%{}%", s));

        let symptoms = sqlx::query_as::<_, Symptom>(
            r#"
            SELECT s.*
            FROM symptoms s
            JOIN symptom_categories c ON c.id = s.category_id
            WHERE ($1::text IS NULL OR c.name ILIKE $1)
              AND ($2::text IS NULL
                   OR s.name ILIKE $2
                   OR s.description ILIKE $2
                   OR s.keywords::text ILIKE $2)
            ORDER BY s.name
            "#,
        )
        .bind(category_filter)
        .bind(search_filter)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(symptoms)
    }

    #[instrument(skip(self, mapping))]
    pub async fn create_mapping(
        &self,
        mapping: &SymptomDepartmentMapping,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO symptom_department_mappings (
                id, symptom_id, department_id, confidence_score, priority_order, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (symptom_id, department_id) DO NOTHING
            "#,
        )
        .bind(mapping.id)
        .bind(mapping.symptom_id)
        .bind(mapping.department_id)
        .bind(mapping.confidence_score)
        .bind(mapping.priority_order)
        .bind(mapping.created_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

}
