//! Deterministic red-flag detection over patient-reported text.
//!
//! The scanner normalizes the chief complaint and medical history,
//! substring-matches them against the static rule table, keeps one flag
//! per category (highest severity wins, rule order breaks ties), and
//! returns the result most severe first. No AI is involved: the same
//! intake always produces the same flags.

pub mod rules;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::enums::FlagCategory;
use crate::models::{Intake, RedFlag};
use rules::{Rule, RULES};

/// Lowercase with runs of whitespace collapsed to single spaces, so
/// patterns match regardless of the patient's casing and formatting.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scan an intake and produce its red flags.
pub fn detect(intake: &Intake, now: DateTime<Utc>) -> Vec<RedFlag> {
    let mut fields = vec![normalize(&intake.chief_complaint)];
    fields.extend(intake.medical_history.iter().map(|h| normalize(h)));

    // One slot per category; a later rule replaces an earlier one only
    // with strictly higher severity.
    let mut matched: Vec<(FlagCategory, &'static Rule)> = Vec::new();
    for rule in RULES {
        if !fields.iter().any(|f| f.contains(rule.pattern)) {
            continue;
        }
        match matched.iter_mut().find(|(c, _)| *c == rule.category) {
            Some((_, kept)) if rule.severity > kept.severity => *kept = rule,
            Some(_) => {}
            None => matched.push((rule.category, rule)),
        }
    }

    // Stable sort keeps rule order within a severity band.
    matched.sort_by(|a, b| b.1.severity.cmp(&a.1.severity));

    matched
        .into_iter()
        .map(|(category, rule)| RedFlag {
            id: Uuid::new_v4(),
            intake_id: intake.id,
            category,
            description: rule.description.to_string(),
            severity: rule.severity,
            detected_at: now,
            acknowledged: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{FlagSeverity, IntakeStatus};
    use crate::models::Demographics;
    use chrono::NaiveDate;

    fn intake(chief_complaint: &str, history: &[&str]) -> Intake {
        Intake {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            intake_link_id: Uuid::new_v4(),
            demographics: Demographics {
                full_name: "Ana Morales".into(),
                date_of_birth: NaiveDate::from_ymd_opt(1984, 3, 2).unwrap(),
                sex: None,
                phone: None,
            },
            chief_complaint: chief_complaint.into(),
            medical_history: history.iter().map(|s| s.to_string()).collect(),
            medications: vec![],
            allergies: vec![],
            created_at: Utc::now(),
            status: IntakeStatus::ReadyForReview,
            reviewed_at: None,
        }
    }

    #[test]
    fn normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize("  CHEST\t\tPain \n here "), "chest pain here");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn chest_pain_yields_high_cardiac_flag() {
        let flags = detect(&intake("Chest  Pain since this morning", &[]), Utc::now());
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].category, FlagCategory::Cardiac);
        assert_eq!(flags[0].severity, FlagSeverity::High);
    }

    #[test]
    fn benign_text_yields_no_flags() {
        let flags = detect(
            &intake("mild rash on left forearm", &["eczema as a child"]),
            Utc::now(),
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn overlapping_patterns_dedupe_to_highest_severity() {
        // "crushing chest pain" also contains "chest pain"; one Cardiac
        // flag survives, at CRITICAL.
        let flags = detect(&intake("crushing chest pain", &[]), Utc::now());
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].category, FlagCategory::Cardiac);
        assert_eq!(flags[0].severity, FlagSeverity::Critical);
        assert_eq!(flags[0].description, "Possible acute coronary syndrome");
    }

    #[test]
    fn flags_ordered_most_severe_first() {
        let flags = detect(
            &intake(
                "feeling suicidal, some dizziness and wheezing lately",
                &[],
            ),
            Utc::now(),
        );
        let severities: Vec<FlagSeverity> = flags.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![
                FlagSeverity::Critical,
                FlagSeverity::Medium,
                FlagSeverity::Low
            ]
        );
        assert_eq!(flags[0].category, FlagCategory::MentalHealth);
    }

    #[test]
    fn medical_history_is_scanned_too() {
        let flags = detect(
            &intake("here for a checkup", &["episodes of heavy bleeding"]),
            Utc::now(),
        );
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].category, FlagCategory::Hemorrhage);
    }

    #[test]
    fn detection_is_deterministic() {
        let i = intake(
            "chest pain and shortness of breath",
            &["high fever last week"],
        );
        let now = Utc::now();
        let a = detect(&i, now);
        let b = detect(&i, now);

        let shape = |flags: &[RedFlag]| {
            flags
                .iter()
                .map(|f| (f.category, f.severity, f.description.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
        assert_eq!(a.len(), 3);
    }
}
