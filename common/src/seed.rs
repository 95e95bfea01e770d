// Reference-data seeding for development and fresh deployments.
//
// Inserts the department/category/symptom taxonomy the triage flow expects.
// Idempotent: rows are keyed by their unique names and skipped when present.

use crate::db::repositories::{DepartmentRepository, SymptomRepository};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Department, Symptom, SymptomCategory, SymptomDepartmentMapping, UrgencyLevel};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

struct DepartmentSeed {
    name: &'static str,
    description: &'static str,
    urgency: UrgencyLevel,
    wait_minutes: i32,
    keywords: &'static [&'static str],
    icd_ranges: &'static [&'static str],
}

const DEPARTMENTS: &[DepartmentSeed] = &[
    DepartmentSeed {
        name: "Internal Medicine",
        description: "General internal medicine and primary care",
        urgency: UrgencyLevel::Medium,
        wait_minutes: 30,
        keywords: &["general", "primary care", "internal", "fever", "fatigue", "cough", "flu", "cold"],
        icd_ranges: &["R50-R69", "J00-J06"],
    },
    DepartmentSeed {
        name: "Cardiology",
        description: "Heart and cardiovascular conditions",
        urgency: UrgencyLevel::High,
        wait_minutes: 45,
        keywords: &["heart", "chest pain", "cardiac", "cardiovascular", "palpitations"],
        icd_ranges: &["I20-I25", "R07"],
    },
    DepartmentSeed {
        name: "Neurology",
        description: "Brain and nervous system disorders",
        urgency: UrgencyLevel::High,
        wait_minutes: 60,
        keywords: &["headache", "migraine", "seizure", "neurological", "numbness", "dizziness"],
        icd_ranges: &["G40-G47", "R51"],
    },
    DepartmentSeed {
        name: "Orthopedics",
        description: "Bone, joint, and muscle conditions",
        urgency: UrgencyLevel::Medium,
        wait_minutes: 40,
        keywords: &["bone", "joint", "muscle", "fracture", "sprain", "back pain"],
        icd_ranges: &["M00-M25", "S00-S99"],
    },
    DepartmentSeed {
        name: "Dermatology",
        description: "Skin conditions and disorders",
        urgency: UrgencyLevel::Low,
        wait_minutes: 25,
        keywords: &["skin", "rash", "acne", "dermatitis", "itch"],
        icd_ranges: &["L00-L99"],
    },
    DepartmentSeed {
        name: "Emergency Medicine",
        description: "Emergency and urgent care",
        urgency: UrgencyLevel::Emergency,
        wait_minutes: 15,
        keywords: &["emergency", "urgent", "trauma", "critical", "severe bleeding"],
        icd_ranges: &["R57", "T07"],
    },
];

const CATEGORIES: &[(&str, &str)] = &[
    ("Cardiovascular", "Heart and blood vessel related symptoms"),
    ("Respiratory", "Breathing and lung related symptoms"),
    ("Neurological", "Brain and nervous system symptoms"),
    ("Musculoskeletal", "Bone, joint, and muscle symptoms"),
    ("Dermatological", "Skin related symptoms"),
    ("Gastrointestinal", "Digestive system symptoms"),
    ("General", "General symptoms and systemic conditions"),
];

struct SymptomSeed {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    department: &'static str,
    keywords: &'static [&'static str],
    icd_codes: &'static [&'static str],
    emergency: bool,
}

const SYMPTOMS: &[SymptomSeed] = &[
    SymptomSeed {
        name: "Chest Pain",
        description: "Pain or discomfort in the chest area",
        category: "Cardiovascular",
        department: "Cardiology",
        keywords: &["chest pain", "heart pain", "cardiac pain"],
        icd_codes: &["R07.89"],
        emergency: true,
    },
    SymptomSeed {
        name: "Headache",
        description: "Pain in the head or upper neck",
        category: "Neurological",
        department: "Neurology",
        keywords: &["headache", "migraine", "head pain"],
        icd_codes: &["R51"],
        emergency: false,
    },
    SymptomSeed {
        name: "Fever",
        description: "Elevated body temperature",
        category: "General",
        department: "Internal Medicine",
        keywords: &["fever", "high temperature", "chills"],
        icd_codes: &["R50.9"],
        emergency: false,
    },
    SymptomSeed {
        name: "Skin Rash",
        description: "Irritated or inflamed area of skin",
        category: "Dermatological",
        department: "Dermatology",
        keywords: &["rash", "hives", "itchy skin"],
        icd_codes: &["R21"],
        emergency: false,
    },
    SymptomSeed {
        name: "Joint Pain",
        description: "Aches and soreness in joints",
        category: "Musculoskeletal",
        department: "Orthopedics",
        keywords: &["joint pain", "arthralgia", "stiff joint"],
        icd_codes: &["M25.50"],
        emergency: false,
    },
];

/// Seed the reference taxonomy if it is not already present
#[instrument(skip(pool))]
pub async fn seed_reference_data(pool: &DbPool) -> Result<(), DatabaseError> {
    let departments = DepartmentRepository::new(pool.clone());
    let symptoms = SymptomRepository::new(pool.clone());

    let now = Utc::now();
    let mut created = 0usize;

    for seed in DEPARTMENTS {
        if departments.find_by_name(seed.name).await?.is_some() {
            continue;
        }
        departments
            .create(&Department {
                id: Uuid::new_v4(),
                name: seed.name.to_string(),
                description: seed.description.to_string(),
                specialization_keywords: seed.keywords.iter().map(|s| s.to_string()).collect(),
                icd_code_ranges: seed.icd_ranges.iter().map(|s| s.to_string()).collect(),
                urgency_level: seed.urgency,
                average_wait_time: seed.wait_minutes,
                consultation_duration: 20,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
        created += 1;
    }

    let existing_categories = symptoms.find_categories().await?;
    for (name, description) in CATEGORIES {
        if existing_categories.iter().any(|c| c.name == *name) {
            continue;
        }
        symptoms
            .create_category(&SymptomCategory {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: description.to_string(),
                parent_category_id: None,
                created_at: now,
                updated_at: now,
            })
            .await?;
        created += 1;
    }

    let categories = symptoms.find_categories().await?;
    let existing_symptoms = symptoms.search(None, None).await?;
    for seed in SYMPTOMS {
        if existing_symptoms.iter().any(|s| s.name == seed.name) {
            continue;
        }
        let Some(category) = categories.iter().find(|c| c.name == seed.category) else {
            continue;
        };
        let symptom = Symptom {
            id: Uuid::new_v4(),
            name: seed.name.to_string(),
            description: seed.description.to_string(),
            category_id: category.id,
            keywords: seed.keywords.iter().map(|s| s.to_string()).collect(),
            severity_indicators: Vec::new(),
            icd_codes: seed.icd_codes.iter().map(|s| s.to_string()).collect(),
            is_emergency_indicator: seed.emergency,
            created_at: now,
            updated_at: now,
        };
        symptoms.create_symptom(&symptom).await?;

        if let Some(department) = departments.find_by_name(seed.department).await? {
            symptoms
                .create_mapping(&SymptomDepartmentMapping {
                    id: Uuid::new_v4(),
                    symptom_id: symptom.id,
                    department_id: department.id,
                    confidence_score: 0.9,
                    priority_order: 1,
                    created_at: now,
                })
                .await?;
        }
        created += 1;
    }

    tracing::info!(created = created, "Reference data seeding finished");
    Ok(())
}
