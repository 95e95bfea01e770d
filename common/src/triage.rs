// Development fallback analyzer.
//
// When the workflow engine is unreachable, consultations are completed
// locally with a keyword match of the symptom text against each active
// department's specialization keywords. This is a stand-in for the engine's
// analysis, not a diagnostic tool.

use crate::db::repositories::{ConsultationRepository, DepartmentRepository};
use crate::db::DbPool;
use crate::models::{AlternativeDepartment, AnalysisOutcome, Department, UrgencyLevel};
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

/// Department every unmatched consultation is routed to
const DEFAULT_DEPARTMENT: &str = "internal medicine";

/// Terms that force emergency urgency regardless of the matched department
const EMERGENCY_TERMS: &[&str] = &[
    "unconscious",
    "not breathing",
    "severe bleeding",
    "overdose",
    "stroke",
    "seizure",
    "suicidal",
];

/// Synthesized recommendation produced by the keyword matcher
#[derive(Debug, Clone)]
pub struct FallbackRecommendation {
    pub department_id: Uuid,
    pub department_name: String,
    pub confidence_score: f64,
    pub urgency_level: UrgencyLevel,
    pub icd_codes: Vec<String>,
    pub alternatives: Vec<AlternativeDepartment>,
}

impl FallbackRecommendation {
    pub fn into_outcome(self) -> AnalysisOutcome {
        AnalysisOutcome {
            department_id: Some(self.department_id),
            confidence_score: Some(self.confidence_score),
            urgency_level: Some(self.urgency_level.to_string()),
            icd_codes: self.icd_codes,
            alternatives: self.alternatives,
        }
    }
}

/// Count how many of a department's keywords appear in the symptom text.
///
/// Multi-word keywords match as substrings of the normalized text; single
/// words must appear as whole words.
fn keyword_hits(normalized: &str, words: &HashSet<&str>, keywords: &[String]) -> usize {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .filter(|k| {
            if k.contains(' ') {
                normalized.contains(k.as_str())
            } else {
                words.contains(k.as_str())
            }
        })
        .count()
}

fn confidence_for_hits(hits: usize) -> f64 {
    (0.6 + 0.08 * hits as f64).clamp(0.0, 0.95)
}

/// Match a symptom description against active departments.
///
/// Returns `None` only when no department is usable at all (empty table and
/// no default to fall back to).
pub fn analyze(symptom_text: &str, departments: &[Department]) -> Option<FallbackRecommendation> {
    let normalized = symptom_text.to_lowercase();
    let word_re = Regex::new(r"[a-z0-9]+").expect("static pattern");
    let words: HashSet<&str> = word_re
        .find_iter(&normalized)
        .map(|m| m.as_str())
        .collect();

    let active: Vec<&Department> = departments.iter().filter(|d| d.is_active).collect();
    if active.is_empty() {
        return None;
    }

    let mut scored: Vec<(&Department, usize)> = active
        .iter()
        .map(|d| (*d, keyword_hits(&normalized, &words, &d.specialization_keywords)))
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.name.cmp(&b.0.name)));

    let (best, hits) = scored[0];
    let (department, hits) = if hits > 0 {
        (best, hits)
    } else {
        // Nothing matched: route to general medicine
        let default = active
            .iter()
            .find(|d| d.name.to_lowercase().contains(DEFAULT_DEPARTMENT))
            .copied()
            .unwrap_or(active[0]);
        (default, 0)
    };

    let urgency_level = if EMERGENCY_TERMS.iter().any(|t| normalized.contains(t)) {
        UrgencyLevel::Emergency
    } else {
        department.urgency_level
    };

    let alternatives: Vec<AlternativeDepartment> = scored
        .iter()
        .filter(|(d, alt_hits)| *alt_hits > 0 && d.id != department.id)
        .take(2)
        .map(|(d, alt_hits)| AlternativeDepartment {
            id: d.id,
            name: d.name.clone(),
            confidence: confidence_for_hits(*alt_hits) * 0.8,
        })
        .collect();

    Some(FallbackRecommendation {
        department_id: department.id,
        department_name: department.name.clone(),
        confidence_score: confidence_for_hits(hits),
        urgency_level,
        icd_codes: department.icd_code_ranges.iter().take(3).cloned().collect(),
        alternatives,
    })
}

/// Complete a consultation in the background after a simulated processing
/// delay, standing in for the engine's asynchronous callback.
///
/// The task owns its own pool handle and updates the consultation exactly
/// once; failures are logged and the consultation marked as errored.
pub fn spawn_delayed_fallback(pool: DbPool, consultation_id: Uuid, symptom_text: String, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let departments = DepartmentRepository::new(pool.clone());
        let consultations = ConsultationRepository::new(pool);

        let result = async {
            let all = departments.find_all_active().await?;
            match analyze(&symptom_text, &all) {
                Some(recommendation) => {
                    tracing::info!(
                        consultation_id = %consultation_id,
                        department = %recommendation.department_name,
                        "Fallback analysis completed"
                    );
                    consultations
                        .complete_with_outcome(consultation_id, &recommendation.into_outcome())
                        .await
                }
                None => {
                    tracing::warn!(
                        consultation_id = %consultation_id,
                        "No departments available for fallback analysis"
                    );
                    consultations.mark_error(consultation_id).await
                }
            }
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                consultation_id = %consultation_id,
                error = %e,
                "Fallback analysis failed"
            );
            let _ = consultations.mark_error(consultation_id).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn department(name: &str, keywords: &[&str], urgency: UrgencyLevel) -> Department {
        Department {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{} department", name),
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

    fn sample_departments() -> Vec<Department> {
        vec![
            department(
                "Cardiology",
                &["heart", "chest pain", "cardiac"],
                UrgencyLevel::High,
            ),
            department(
                "Dermatology",
                &["skin", "rash", "itch"],
                UrgencyLevel::Low,
            ),
            department(
                "Internal Medicine",
                &["fever", "fatigue", "general"],
                UrgencyLevel::Medium,
            ),
        ]
    }

    #[test]
    fn test_keyword_match_routes_to_best_department() {
        let departments = sample_departments();
        let recommendation =
            analyze("sharp chest pain and a racing heart", &departments).unwrap();

        assert_eq!(recommendation.department_name, "Cardiology");
        assert_eq!(recommendation.urgency_level, UrgencyLevel::High);
        assert!(recommendation.confidence_score > 0.6);
    }

    #[test]
    fn test_unmatched_text_routes_to_internal_medicine() {
        let departments = sample_departments();
        let recommendation = analyze("I feel off somehow", &departments).unwrap();

        assert_eq!(recommendation.department_name, "Internal Medicine");
        assert_eq!(recommendation.urgency_level, UrgencyLevel::Medium);
    }

    #[test]
    fn test_emergency_terms_force_emergency_urgency() {
        let departments = sample_departments();
        let recommendation =
            analyze("my father had a stroke and has chest pain", &departments).unwrap();

        assert_eq!(recommendation.urgency_level, UrgencyLevel::Emergency);
    }

    #[test]
    fn test_multi_word_keywords_match_as_substring() {
        let departments = sample_departments();
        let recommendation = analyze("severe chest pain since morning", &departments).unwrap();

        assert_eq!(recommendation.department_name, "Cardiology");
    }

    #[test]
    fn test_single_word_keywords_require_whole_words() {
        let departments = sample_departments();
        // "heartburn" contains "heart" as a substring but not as a word
        let recommendation = analyze("heartburn after meals", &departments).unwrap();

        assert_eq!(recommendation.department_name, "Internal Medicine");
    }

    #[test]
    fn test_inactive_departments_are_ignored() {
        let mut departments = sample_departments();
        departments[0].is_active = false;
        let recommendation = analyze("chest pain", &departments).unwrap();

        assert_ne!(recommendation.department_name, "Cardiology");
    }

    #[test]
    fn test_no_departments_yields_none() {
        assert!(analyze("chest pain", &[]).is_none());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let departments = vec![department(
            "Cardiology",
            &["a", "b", "c", "d", "e", "f", "g", "h"],
            UrgencyLevel::High,
        )];
        let recommendation = analyze("a b c d e f g h", &departments).unwrap();

        assert!(recommendation.confidence_score <= 0.95);
    }

    #[test]
    fn test_alternatives_exclude_the_recommended_department() {
        let departments = sample_departments();
        let recommendation = analyze("chest pain and an itchy rash", &departments).unwrap();

        assert!(recommendation
            .alternatives
            .iter()
            .all(|a| a.id != recommendation.department_id));
        assert!(!recommendation.alternatives.is_empty());
    }
}
