//! The static rule table the scanner runs against normalized text.
//!
//! Rules are ordered: when two rules for the same category match at the
//! same severity, the earlier one supplies the description. Patterns are
//! lowercase with single spaces, matching the scanner's normal form.

use crate::models::enums::{FlagCategory, FlagSeverity};

pub struct Rule {
    pub pattern: &'static str,
    pub category: FlagCategory,
    pub severity: FlagSeverity,
    pub description: &'static str,
}

const fn rule(
    pattern: &'static str,
    category: FlagCategory,
    severity: FlagSeverity,
    description: &'static str,
) -> Rule {
    Rule {
        pattern,
        category,
        severity,
        description,
    }
}

use FlagCategory as C;
use FlagSeverity as S;

pub static RULES: &[Rule] = &[
    // Cardiac
    rule("crushing chest pain", C::Cardiac, S::Critical, "Possible acute coronary syndrome"),
    rule("chest pain radiating", C::Cardiac, S::Critical, "Chest pain with radiation, possible acute coronary syndrome"),
    rule("chest pain", C::Cardiac, S::High, "Chest pain reported"),
    rule("palpitations", C::Cardiac, S::Medium, "Palpitations reported"),
    // Respiratory
    rule("cannot breathe", C::Respiratory, S::Critical, "Severe breathing difficulty"),
    rule("can't breathe", C::Respiratory, S::Critical, "Severe breathing difficulty"),
    rule("shortness of breath", C::Respiratory, S::High, "Shortness of breath reported"),
    rule("difficulty breathing", C::Respiratory, S::High, "Breathing difficulty reported"),
    rule("wheezing", C::Respiratory, S::Medium, "Wheezing reported"),
    // Neurological
    rule("worst headache", C::Neurological, S::Critical, "Thunderclap headache, possible subarachnoid hemorrhage"),
    rule("slurred speech", C::Neurological, S::Critical, "Possible stroke"),
    rule("face drooping", C::Neurological, S::Critical, "Possible stroke"),
    rule("sudden weakness", C::Neurological, S::High, "Sudden weakness reported"),
    rule("dizziness", C::Neurological, S::Low, "Dizziness reported"),
    // Hemorrhage
    rule("heavy bleeding", C::Hemorrhage, S::High, "Heavy bleeding reported"),
    rule("coughing up blood", C::Hemorrhage, S::High, "Hemoptysis reported"),
    rule("blood in stool", C::Hemorrhage, S::Medium, "Gastrointestinal bleeding reported"),
    // Sepsis
    rule("fever and confusion", C::Sepsis, S::Critical, "Fever with altered mentation, possible sepsis"),
    rule("high fever", C::Sepsis, S::Medium, "High fever reported"),
    // Anaphylaxis
    rule("throat closing", C::Anaphylaxis, S::Critical, "Possible anaphylaxis"),
    rule("swollen tongue", C::Anaphylaxis, S::Critical, "Possible anaphylaxis"),
    rule("hives all over", C::Anaphylaxis, S::High, "Widespread urticaria reported"),
    // Mental health
    rule("suicidal", C::MentalHealth, S::Critical, "Suicide risk"),
    rule("want to die", C::MentalHealth, S::Critical, "Suicide risk"),
    rule("self harm", C::MentalHealth, S::High, "Self-harm reported"),
    rule("hopeless", C::MentalHealth, S::Low, "Low mood reported"),
    // Obstetric
    rule("bleeding while pregnant", C::Obstetric, S::Critical, "Bleeding in pregnancy"),
    rule("reduced fetal movement", C::Obstetric, S::High, "Reduced fetal movement reported"),
    // Metabolic
    rule("fruity breath", C::Metabolic, S::High, "Possible diabetic ketoacidosis"),
    rule("excessive thirst", C::Metabolic, S::Low, "Polydipsia reported"),
];
