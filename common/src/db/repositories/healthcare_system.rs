// Healthcare system repository

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::HealthcareSystem;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct HealthcareSystemRepository {
    pool: DbPool,
}

impl HealthcareSystemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, system))]
    pub async fn create(&self, system: &HealthcareSystem) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO healthcare_systems (
                id, name, system_type, address, city, state, zip_code,
                phone_number, email, website, emr_system, api_endpoint,
                api_credentials, operating_hours, emergency_services,
                bed_capacity, current_occupancy, subscription_plan, monthly_fee,
                contract_start_date, contract_end_date, is_active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(system.id)
        .bind(&system.name)
        .bind(system.system_type.to_string())
        .bind(&system.address)
        .bind(&system.city)
        .bind(&system.state)
        .bind(&system.zip_code)
        .bind(&system.phone_number)
        .bind(&system.email)
        .bind(&system.website)
        .bind(&system.emr_system)
        .bind(&system.api_endpoint)
        .bind(&system.api_credentials)
        .bind(&system.operating_hours)
        .bind(system.emergency_services)
        .bind(system.bed_capacity)
        .bind(system.current_occupancy)
        .bind(&system.subscription_plan)
        .bind(system.monthly_fee)
        .bind(system.contract_start_date)
        .bind(system.contract_end_date)
        .bind(system.is_active)
        .bind(system.created_at)
        .bind(system.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(system_id = %system.id, name = %system.name, "Healthcare system created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<HealthcareSystem>, DatabaseError> {
        let system =
            sqlx::query_as::<_, HealthcareSystem>("SELECT * FROM healthcare_systems WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await?;

        Ok(system)
    }

    #[instrument(skip(self))]
    pub async fn find_all_active(&self) -> Result<Vec<HealthcareSystem>, DatabaseError> {
        let systems = sqlx::query_as::<_, HealthcareSystem>(
            "SELECT * FROM healthcare_systems WHERE is_active = TRUE ORDER BY name",
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(systems)
    }

    #[instrument(skip(self, system))]
    pub async fn update(&self, system: &HealthcareSystem) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE healthcare_systems
            SET name = $2,
                system_type = $3,
                address = $4,
                city = $5,
                state = $6,
                zip_code = $7,
                phone_number = $8,
                email = $9,
                website = $10,
                emr_system = $11,
                api_endpoint = $12,
                api_credentials = $13,
                operating_hours = $14,
                emergency_services = $15,
                bed_capacity = $16,
                current_occupancy = $17,
                subscription_plan = $18,
                monthly_fee = $19,
                contract_start_date = $20,
                contract_end_date = $21,
                is_active = $22,
                updated_at = $23
            WHERE id = $1
            "#,
        )
        .bind(system.id)
        .bind(&system.name)
        .bind(system.system_type.to_string())
        .bind(&system.address)
        .bind(&system.city)
        .bind(&system.state)
        .bind(&system.zip_code)
        .bind(&system.phone_number)
        .bind(&system.email)
        .bind(&system.website)
        .bind(&system.emr_system)
        .bind(&system.api_endpoint)
        .bind(&system.api_credentials)
        .bind(&system.operating_hours)
        .bind(system.emergency_services)
        .bind(system.bed_capacity)
        .bind(system.current_occupancy)
        .bind(&system.subscription_plan)
        .bind(system.monthly_fee)
        .bind(system.contract_start_date)
        .bind(system.contract_end_date)
        .bind(system.is_active)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Healthcare system not found: {}",
                system.id
            )));
        }

        Ok(())
    }
}
