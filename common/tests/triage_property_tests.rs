// Property-based tests for the keyword fallback analyzer

use chrono::Utc;
use common::models::{Department, UrgencyLevel};
use common::triage::analyze;
use proptest::prelude::*;
use uuid::Uuid;

fn department(name: &str, keywords: &[&str], urgency: UrgencyLevel) -> Department {
    Department {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: String::new(),
        specialization_keywords: keywords.iter().map(|s| s.to_string()).collect(),
        icd_code_ranges: vec!["R00-R99".to_string()],
        urgency_level: urgency,
        average_wait_time: 30,
        consultation_duration: 20,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn taxonomy() -> Vec<Department> {
    vec![
        department("Cardiology", &["heart", "chest pain"], UrgencyLevel::High),
        department("Dermatology", &["skin", "rash"], UrgencyLevel::Low),
        department(
            "Internal Medicine",
            &["fever", "fatigue"],
            UrgencyLevel::Medium,
        ),
    ]
}

// Property: as long as at least one active department exists, analysis is
// total: every text yields a recommendation with a confidence in [0, 1].
#[test]
fn property_analysis_is_total_over_arbitrary_text() {
    proptest!(|(text in ".{0,400}")| {
        let departments = taxonomy();
        let recommendation = analyze(&text, &departments).expect("non-empty taxonomy");

        prop_assert!((0.0..=1.0).contains(&recommendation.confidence_score));
        prop_assert!(departments
            .iter()
            .any(|d| d.id == recommendation.department_id));
    });
}

// Property: appending an emergency term forces emergency urgency without
// changing totality.
#[test]
fn property_emergency_terms_dominate() {
    proptest!(|(prefix in "[a-z ]{0,80}")| {
        let departments = taxonomy();
        let text = format!("{} severe bleeding", prefix);
        let recommendation = analyze(&text, &departments).expect("non-empty taxonomy");

        prop_assert_eq!(recommendation.urgency_level, UrgencyLevel::Emergency);
    });
}

// Property: a recommendation never lists itself among the alternatives,
// and alternative confidences stay in [0, 1].
#[test]
fn property_alternatives_are_distinct_and_bounded() {
    proptest!(|(text in "[a-z ]{0,120}")| {
        let departments = taxonomy();
        let recommendation = analyze(&text, &departments).expect("non-empty taxonomy");

        for alternative in &recommendation.alternatives {
            prop_assert_ne!(alternative.id, recommendation.department_id);
            prop_assert!((0.0..=1.0).contains(&alternative.confidence));
        }
    });
}

// Property: more matching keywords never lowers confidence.
#[test]
fn property_confidence_monotone_in_keyword_hits() {
    let departments = vec![department(
        "Cardiology",
        &["heart", "chest pain", "palpitations"],
        UrgencyLevel::High,
    )];

    let one = analyze("my heart", &departments).unwrap();
    let two = analyze("my heart and chest pain", &departments).unwrap();
    let three = analyze("my heart, chest pain and palpitations", &departments).unwrap();

    assert!(one.confidence_score <= two.confidence_score);
    assert!(two.confidence_score <= three.confidence_score);
}
