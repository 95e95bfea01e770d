// Repository implementations for database access

pub mod appointment;
pub mod consultation;
pub mod department;
pub mod healthcare_system;
pub mod symptom;
pub mod user;
pub mod workflow;

pub use appointment::AppointmentRepository;
pub use consultation::ConsultationRepository;
pub use department::DepartmentRepository;
pub use healthcare_system::HealthcareSystemRepository;
pub use symptom::SymptomRepository;
pub use user::UserRepository;
pub use workflow::WorkflowRepository;
