// User repository: accounts plus the 1:1 patient/doctor profile extensions

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{DoctorProfile, PatientProfile, User};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

/// Repository for user-related database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, user))]
    pub async fn create(&self, user: &User) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, first_name, last_name, role,
                phone_number, date_of_birth, gender, emergency_contact,
                medical_history, allergies, current_medications, preferred_language,
                is_verified, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.to_string())
        .bind(&user.phone_number)
        .bind(user.date_of_birth)
        .bind(&user.gender)
        .bind(&user.emergency_contact)
        .bind(&user.medical_history)
        .bind(&user.allergies)
        .bind(&user.current_medications)
        .bind(&user.preferred_language)
        .bind(user.is_verified)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(self.pool.pool())
            .await?;

        Ok(users)
    }

    /// Update mutable account fields; username and role are immutable
    #[instrument(skip(self, user))]
    pub async fn update(&self, user: &User) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2,
                password_hash = $3,
                first_name = $4,
                last_name = $5,
                phone_number = $6,
                date_of_birth = $7,
                gender = $8,
                emergency_contact = $9,
                medical_history = $10,
                allergies = $11,
                current_medications = $12,
                preferred_language = $13,
                is_verified = $14,
                is_active = $15,
                updated_at = $16
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(user.date_of_birth)
        .bind(&user.gender)
        .bind(&user.emergency_contact)
        .bind(&user.medical_history)
        .bind(&user.allergies)
        .bind(&user.current_medications)
        .bind(&user.preferred_language)
        .bind(user.is_verified)
        .bind(user.is_active)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "User not found: {}",
                user.id
            )));
        }

        tracing::info!(user_id = %user.id, "User updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User not found: {}", id)));
        }

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    #[instrument(skip(self, profile))]
    pub async fn create_patient_profile(
        &self,
        profile: &PatientProfile,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO patient_profiles (
                user_id, insurance_provider, insurance_number,
                primary_care_physician, preferred_system_id, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.insurance_provider)
        .bind(&profile.insurance_number)
        .bind(&profile.primary_care_physician)
        .bind(profile.preferred_system_id)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_patient_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PatientProfile>, DatabaseError> {
        let profile = sqlx::query_as::<_, PatientProfile>(
            "SELECT * FROM patient_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(profile)
    }

    #[instrument(skip(self, profile))]
    pub async fn update_patient_profile(
        &self,
        profile: &PatientProfile,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE patient_profiles
            SET insurance_provider = $2,
                insurance_number = $3,
                primary_care_physician = $4,
                preferred_system_id = $5,
                updated_at = $6
            WHERE user_id = $1
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.insurance_provider)
        .bind(&profile.insurance_number)
        .bind(&profile.primary_care_physician)
        .bind(profile.preferred_system_id)
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Patient profile not found: {}",
                profile.user_id
            )));
        }

        Ok(())
    }

    #[instrument(skip(self, profile))]
    pub async fn create_doctor_profile(
        &self,
        profile: &DoctorProfile,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO doctor_profiles (
                user_id, license_number, specialization_id, years_of_experience,
                education, certifications, consultation_fee, available_hours,
                is_available, rating, total_consultations, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.license_number)
        .bind(profile.specialization_id)
        .bind(profile.years_of_experience)
        .bind(&profile.education)
        .bind(&profile.certifications)
        .bind(profile.consultation_fee)
        .bind(&profile.available_hours)
        .bind(profile.is_available)
        .bind(profile.rating)
        .bind(profile.total_consultations)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(user_id = %profile.user_id, "Doctor profile created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_doctor_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DoctorProfile>, DatabaseError> {
        let profile = sqlx::query_as::<_, DoctorProfile>(
            "SELECT * FROM doctor_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(profile)
    }
}
