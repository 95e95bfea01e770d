// Property-based tests for API-facing validation rules.
//
// These exercise the shared validation and model logic the handlers rely
// on; handler-level request parsing is covered by unit tests next to the
// handlers themselves.

use common::models::{
    pain_level_in_range, ConsultationStatus, UrgencyLevel, UserRole,
};
use proptest::prelude::*;
use std::str::FromStr;

// Property: the pain scale accepts exactly the integers 1 through 10.
#[test]
fn property_pain_level_bounds() {
    proptest!(|(value in -1000i64..1000)| {
        let accepted = pain_level_in_range(value);
        prop_assert_eq!(accepted, (1..=10).contains(&value));
    });
}

// Property: every consultation status round-trips through its text form,
// and unknown strings are rejected.
#[test]
fn property_consultation_status_round_trip() {
    let statuses = [
        ConsultationStatus::Initiated,
        ConsultationStatus::Analyzing,
        ConsultationStatus::Completed,
        ConsultationStatus::Scheduled,
        ConsultationStatus::InProgress,
        ConsultationStatus::Finished,
        ConsultationStatus::Cancelled,
        ConsultationStatus::Error,
    ];

    for status in statuses {
        let text = status.to_string();
        assert_eq!(ConsultationStatus::from_str(&text).unwrap(), status);

        // serde and Display agree on the wire format
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, format!("\"{}\"", text));
    }

    assert!(ConsultationStatus::from_str("unknown").is_err());
}

// Property: arbitrary strings parse as an urgency level only when they are
// one of the four canonical forms.
#[test]
fn property_urgency_parsing_is_closed() {
    proptest!(|(raw in "[a-z_]{0,12}")| {
        let parsed = UrgencyLevel::from_str(&raw);
        let canonical = ["low", "medium", "high", "emergency"].contains(&raw.as_str());
        prop_assert_eq!(parsed.is_ok(), canonical);
    });
}

// Property: urgency guidance always includes a recommended action.
#[test]
fn property_urgency_guidance_total() {
    for level in [
        UrgencyLevel::Low,
        UrgencyLevel::Medium,
        UrgencyLevel::High,
        UrgencyLevel::Emergency,
    ] {
        let guidance = level.guidance();
        assert!(!guidance.level.is_empty());
        assert!(!guidance.description.is_empty());
        assert!(!guidance.recommended_action.is_empty());
    }
}

// Property: role parsing is the inverse of Display for all roles.
#[test]
fn property_role_round_trip() {
    for role in [
        UserRole::Patient,
        UserRole::Doctor,
        UserRole::Admin,
        UserRole::ClinicAdmin,
        UserRole::Nurse,
        UserRole::Receptionist,
    ] {
        assert_eq!(UserRole::from_str(&role.to_string()).unwrap(), role);
    }
}

// Property: permission checks that gate the consultation intake flow hold
// for every role: only patients may create, everyone authenticated with the
// base set may read their own.
#[test]
fn property_intake_permissions() {
    for role in [
        UserRole::Patient,
        UserRole::Doctor,
        UserRole::Admin,
        UserRole::ClinicAdmin,
        UserRole::Nurse,
        UserRole::Receptionist,
    ] {
        let permissions = role.permissions();
        assert_eq!(
            permissions.contains(&"consultation:create".to_string()),
            role == UserRole::Patient
        );
        assert!(permissions.contains(&"consultation:read".to_string()));
    }
}
