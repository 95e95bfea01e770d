use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Defines an enum stored as TEXT in the database, with matching
/// serde, Display, FromStr and TryFrom<String> implementations.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($name::$variant => write!(f, $text)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!(concat!("Invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_str(&s)
            }
        }
    };
}

// ============================================================================
// User Models
// ============================================================================

text_enum! {
    /// Account role, which determines the derived permission set
    UserRole {
        Patient => "patient",
        Doctor => "doctor",
        Admin => "admin",
        ClinicAdmin => "clinic_admin",
        Nurse => "nurse",
        Receptionist => "receptionist",
    }
}

impl UserRole {
    /// Derive the permission set for a role.
    ///
    /// Permission strings are consumed by the RBAC middleware; every role
    /// carries the base set for browsing reference data and its own records.
    pub fn permissions(&self) -> Vec<String> {
        let mut permissions: Vec<&str> = vec![
            "profile:read",
            "profile:write",
            "symptom:read",
            "department:read",
            "system:read",
            "consultation:read",
            "appointment:read",
        ];

        match self {
            UserRole::Patient => {
                permissions.extend(["consultation:create", "appointment:create", "appointment:cancel"]);
            }
            UserRole::Doctor | UserRole::Nurse | UserRole::ClinicAdmin => {
                permissions.extend(["appointment:manage", "appointment:cancel"]);
            }
            UserRole::Receptionist => {
                permissions.extend(["appointment:manage", "appointment:create", "appointment:cancel"]);
            }
            UserRole::Admin => {
                permissions.extend([
                    "appointment:manage",
                    "appointment:cancel",
                    "user:manage",
                    "department:write",
                    "system:write",
                    "workflow:manage",
                ]);
            }
        }

        let mut permissions: Vec<String> = permissions.into_iter().map(String::from).collect();
        permissions.sort();
        permissions.dedup();
        permissions
    }

    /// Roles allowed to view consultations and appointments of other users
    pub fn is_clinical_staff(&self) -> bool {
        matches!(
            self,
            UserRole::Doctor
                | UserRole::Nurse
                | UserRole::Receptionist
                | UserRole::ClinicAdmin
                | UserRole::Admin
        )
    }
}

text_enum! {
    Gender {
        Male => "male",
        Female => "female",
        Other => "other",
    }
}

/// Role-tagged account with healthcare-specific metadata
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub emergency_contact: String,
    pub medical_history: String,
    pub allergies: String,
    pub current_medications: String,
    pub preferred_language: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Age in whole years as of `today`, if a date of birth is recorded
    pub fn age(&self, today: NaiveDate) -> Option<i32> {
        let dob = self.date_of_birth?;
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        Some(age)
    }
}

/// Extended profile for patients with insurance and care preferences
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PatientProfile {
    pub user_id: Uuid,
    pub insurance_provider: String,
    pub insurance_number: String,
    pub primary_care_physician: String,
    pub preferred_system_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientProfile {
    /// Empty profile created automatically at patient registration
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            insurance_provider: String::new(),
            insurance_number: String::new(),
            primary_care_physician: String::new(),
            preferred_system_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Extended profile for doctors with professional information
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DoctorProfile {
    pub user_id: Uuid,
    pub license_number: String,
    pub specialization_id: Uuid,
    pub years_of_experience: i32,
    pub education: String,
    pub certifications: String,
    pub consultation_fee: f64,
    pub available_hours: serde_json::Value,
    pub is_available: bool,
    pub rating: f64,
    pub total_consultations: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Reference Data Models
// ============================================================================

text_enum! {
    SystemType {
        Hospital => "hospital",
        Clinic => "clinic",
        UrgentCare => "urgent_care",
        SpecialtyCenter => "specialty_center",
    }
}

/// Healthcare systems (hospitals, clinics, etc.) served by the platform
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HealthcareSystem {
    pub id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub system_type: SystemType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
    pub email: String,
    pub website: String,
    pub emr_system: String,
    pub api_endpoint: String,
    pub api_credentials: serde_json::Value,
    pub operating_hours: serde_json::Value,
    pub emergency_services: bool,
    pub bed_capacity: Option<i32>,
    pub current_occupancy: i32,
    pub subscription_plan: String,
    pub monthly_fee: f64,
    pub contract_start_date: NaiveDate,
    pub contract_end_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

text_enum! {
    UrgencyLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Emergency => "emergency",
    }
}

/// Patient-facing guidance text attached to an urgency level
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UrgencyGuidance {
    pub level: &'static str,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl UrgencyLevel {
    pub fn guidance(&self) -> UrgencyGuidance {
        match self {
            UrgencyLevel::Low => UrgencyGuidance {
                level: "Low Priority",
                description: "Non-urgent condition that can be scheduled normally",
                recommended_action: "Schedule an appointment within 1-2 weeks",
            },
            UrgencyLevel::Medium => UrgencyGuidance {
                level: "Medium Priority",
                description: "Condition that should be addressed soon",
                recommended_action: "Schedule an appointment within 2-3 days",
            },
            UrgencyLevel::High => UrgencyGuidance {
                level: "High Priority",
                description: "Urgent condition requiring prompt attention",
                recommended_action: "Seek medical attention within 24 hours",
            },
            UrgencyLevel::Emergency => UrgencyGuidance {
                level: "Emergency",
                description: "Critical condition requiring immediate attention",
                recommended_action: "Seek emergency care immediately",
            },
        }
    }
}

/// Medical department/specialty a patient may be routed to
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[sqlx(json)]
    pub specialization_keywords: Vec<String>,
    #[sqlx(json)]
    pub icd_code_ranges: Vec<String>,
    #[sqlx(try_from = "String")]
    pub urgency_level: UrgencyLevel,
    pub average_wait_time: i32,
    pub consultation_duration: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category for organizing symptoms (e.g. Respiratory, Cardiovascular)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SymptomCategory {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub parent_category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Individual symptom patients can report
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Symptom {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category_id: Uuid,
    #[sqlx(json)]
    pub keywords: Vec<String>,
    #[sqlx(json)]
    pub severity_indicators: Vec<String>,
    #[sqlx(json)]
    pub icd_codes: Vec<String>,
    pub is_emergency_indicator: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mapping between a symptom and a department with a confidence score
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SymptomDepartmentMapping {
    pub id: Uuid,
    pub symptom_id: Uuid,
    pub department_id: Uuid,
    pub confidence_score: f64,
    pub priority_order: i32,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Consultation Models
// ============================================================================

text_enum! {
    ConsultationStatus {
        Initiated => "initiated",
        Analyzing => "analyzing",
        Completed => "completed",
        Scheduled => "scheduled",
        InProgress => "in_progress",
        Finished => "finished",
        Cancelled => "cancelled",
        Error => "error",
    }
}

/// Patient symptom-intake record and its eventual department recommendation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub healthcare_system_id: Option<Uuid>,
    pub symptom_description: String,
    pub symptom_duration: String,
    pub pain_level: Option<i16>,
    pub additional_info: String,
    pub recommended_department_id: Option<Uuid>,
    pub confidence_score: Option<f64>,
    pub urgency_level: Option<String>,
    #[sqlx(json)]
    pub icd_suggestions: Vec<String>,
    pub alternative_departments: serde_json::Value,
    pub engine_execution_id: String,
    pub analysis_start_time: Option<DateTime<Utc>>,
    pub analysis_end_time: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    /// Create a consultation for a freshly submitted symptom description,
    /// with analysis already marked as started.
    pub fn new_analyzing(
        patient_id: Uuid,
        symptom_description: String,
        symptom_duration: String,
        pain_level: Option<i16>,
        additional_info: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            healthcare_system_id: None,
            symptom_description,
            symptom_duration,
            pain_level,
            additional_info,
            recommended_department_id: None,
            confidence_score: None,
            urgency_level: None,
            icd_suggestions: Vec::new(),
            alternative_departments: serde_json::json!([]),
            engine_execution_id: String::new(),
            analysis_start_time: Some(now),
            analysis_end_time: None,
            status: ConsultationStatus::Analyzing,
            created_at: now,
            updated_at: now,
        }
    }

    /// Wall-clock analysis duration, available once analysis has finished
    pub fn analysis_duration(&self) -> Option<chrono::Duration> {
        match (self.analysis_start_time, self.analysis_end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Validate a reported pain level (inclusive 1-10 scale)
pub fn pain_level_in_range(value: i64) -> bool {
    (1..=10).contains(&value)
}

/// Patient feedback on consultation accuracy and helpfulness
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsultationFeedback {
    pub consultation_id: Uuid,
    pub accuracy_rating: i32,
    pub helpfulness_rating: i32,
    pub speed_rating: i32,
    pub comments: String,
    pub would_recommend: bool,
    pub created_at: DateTime<Utc>,
}

/// Analysis result payload as delivered by the engine (or the fallback)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub department_id: Option<Uuid>,
    pub confidence_score: Option<f64>,
    pub urgency_level: Option<String>,
    #[serde(default)]
    pub icd_codes: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<AlternativeDepartment>,
}

/// One alternative department suggestion inside an analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeDepartment {
    pub id: Uuid,
    pub name: String,
    pub confidence: f64,
}

// ============================================================================
// Appointment Models
// ============================================================================

text_enum! {
    AppointmentStatus {
        Scheduled => "scheduled",
        Confirmed => "confirmed",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
        Rescheduled => "rescheduled",
    }
}

text_enum! {
    AppointmentType {
        Consultation => "consultation",
        FollowUp => "follow_up",
        Emergency => "emergency",
        RoutineCheckup => "routine_checkup",
    }
}

/// Scheduled appointment between a patient and a doctor
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Uuid,
    pub healthcare_system_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub estimated_duration: i32,
    #[sqlx(try_from = "String")]
    pub appointment_type: AppointmentType,
    #[sqlx(try_from = "String")]
    pub status: AppointmentStatus,
    pub notes: String,
    pub cancellation_reason: String,
    pub emr_appointment_id: String,
    pub engine_execution_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

text_enum! {
    ReminderChannel {
        Sms => "sms",
        Email => "email",
        Push => "push",
        Call => "call",
    }
}

/// Reminder for an upcoming appointment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppointmentReminder {
    pub id: Uuid,
    pub appointment_id: Uuid,
    #[sqlx(try_from = "String")]
    pub channel: ReminderChannel,
    pub scheduled_time: DateTime<Utc>,
    pub sent_time: Option<DateTime<Utc>>,
    pub is_sent: bool,
    pub engine_execution_id: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Workflow Engine Models
// ============================================================================

text_enum! {
    WorkflowKind {
        SymptomAnalysis => "symptom_analysis",
        VoiceProcessing => "voice_processing",
        AppointmentBooking => "appointment_booking",
        EmrIntegration => "emr_integration",
        Notification => "notification",
        Analytics => "analytics",
    }
}

/// Registration of a workflow hosted on the external automation engine
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub kind: WorkflowKind,
    pub engine_workflow_id: String,
    pub version: String,
    pub description: String,
    pub is_active: bool,
    pub webhook_url: String,
    /// Shared secret the engine uses to sign inbound callbacks
    pub callback_secret: String,
    pub configuration: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

text_enum! {
    ExecutionStatus {
        Running => "running",
        Success => "success",
        Error => "error",
        Waiting => "waiting",
        Cancelled => "cancelled",
    }
}

/// Audit record for a single call into the automation engine
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub engine_execution_id: String,
    pub consultation_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub input_data: serde_json::Value,
    pub output_data: Option<serde_json::Value>,
    #[sqlx(try_from = "String")]
    pub status: ExecutionStatus,
    pub error_message: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowExecution {
    /// Create a running execution record for a just-triggered workflow
    pub fn new_running(
        workflow_id: Uuid,
        engine_execution_id: String,
        input_data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            engine_execution_id,
            consultation_id: None,
            appointment_id: None,
            input_data,
            output_data: None,
            status: ExecutionStatus::Running,
            error_message: String::new(),
            start_time: now,
            end_time: None,
            execution_time_ms: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_consultation(mut self, consultation_id: Uuid) -> Self {
        self.consultation_id = Some(consultation_id);
        self
    }

    pub fn for_appointment(mut self, appointment_id: Uuid) -> Self {
        self.appointment_id = Some(appointment_id);
        self
    }

    /// Mark the execution finished, stamping the end time and duration
    pub fn finish(&mut self, status: ExecutionStatus, output_data: Option<serde_json::Value>) {
        let end = Utc::now();
        self.execution_time_ms = Some((end - self.start_time).num_milliseconds());
        self.end_time = Some(end);
        self.status = status;
        self.output_data = output_data;
        self.updated_at = end;
    }
}

// ============================================================================
// Authentication Models
// ============================================================================

/// JWT claims carried by every authenticated request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub username: String,
    pub role: UserRole,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_round_trip() {
        for role in [
            UserRole::Patient,
            UserRole::Doctor,
            UserRole::Admin,
            UserRole::ClinicAdmin,
            UserRole::Nurse,
            UserRole::Receptionist,
        ] {
            let text = role.to_string();
            assert_eq!(UserRole::from_str(&text).unwrap(), role);
        }
    }

    #[test]
    fn test_invalid_role_rejected() {
        assert!(UserRole::from_str("superuser").is_err());
    }

    #[test]
    fn test_only_patients_can_create_consultations() {
        let create = "consultation:create".to_string();
        assert!(UserRole::Patient.permissions().contains(&create));
        for role in [
            UserRole::Doctor,
            UserRole::Admin,
            UserRole::ClinicAdmin,
            UserRole::Nurse,
            UserRole::Receptionist,
        ] {
            assert!(!role.permissions().contains(&create), "{role} should not create consultations");
        }
    }

    #[test]
    fn test_only_admin_manages_users() {
        let manage = "user:manage".to_string();
        assert!(UserRole::Admin.permissions().contains(&manage));
        assert!(!UserRole::Doctor.permissions().contains(&manage));
        assert!(!UserRole::Patient.permissions().contains(&manage));
    }

    #[test]
    fn test_age_calculation_respects_birthday() {
        let user = User {
            id: Uuid::new_v4(),
            username: "p".into(),
            email: "p@example.com".into(),
            password_hash: "hash".into(),
            first_name: "Pat".into(),
            last_name: "Doe".into(),
            role: UserRole::Patient,
            phone_number: String::new(),
            date_of_birth: Some(NaiveDate::from_ymd_opt(1990, 6, 15).unwrap()),
            gender: None,
            emergency_contact: String::new(),
            medical_history: String::new(),
            allergies: String::new(),
            current_medications: String::new(),
            preferred_language: "en".into(),
            is_verified: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let before_birthday = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let after_birthday = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(user.age(before_birthday), Some(33));
        assert_eq!(user.age(after_birthday), Some(34));
    }

    #[test]
    fn test_pain_level_bounds() {
        assert!(!pain_level_in_range(0));
        assert!(pain_level_in_range(1));
        assert!(pain_level_in_range(10));
        assert!(!pain_level_in_range(11));
    }

    #[test]
    fn test_consultation_analysis_duration() {
        let mut consultation = Consultation::new_analyzing(
            Uuid::new_v4(),
            "persistent cough".into(),
            "3 days".into(),
            Some(4),
            String::new(),
        );
        assert!(consultation.analysis_duration().is_none());

        consultation.analysis_end_time =
            Some(consultation.analysis_start_time.unwrap() + chrono::Duration::seconds(42));
        assert_eq!(
            consultation.analysis_duration().unwrap().num_seconds(),
            42
        );
    }

    #[test]
    fn test_execution_finish_stamps_duration() {
        let mut execution = WorkflowExecution::new_running(
            Uuid::new_v4(),
            "exec_123".into(),
            serde_json::json!({"symptoms": "fever"}),
        );
        execution.finish(ExecutionStatus::Success, Some(serde_json::json!({"ok": true})));

        assert_eq!(execution.status, ExecutionStatus::Success);
        assert!(execution.end_time.is_some());
        assert!(execution.execution_time_ms.unwrap() >= 0);
    }

    #[test]
    fn test_urgency_guidance_is_total() {
        for level in [
            UrgencyLevel::Low,
            UrgencyLevel::Medium,
            UrgencyLevel::High,
            UrgencyLevel::Emergency,
        ] {
            let guidance = level.guidance();
            assert!(!guidance.recommended_action.is_empty());
        }
    }

    #[test]
    fn test_status_enum_serde_matches_display() {
        let json = serde_json::to_string(&ConsultationStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(ConsultationStatus::InProgress.to_string(), "in_progress");
    }
}
