//! Deterministic prompt assembly for intake summaries.
//!
//! The prompt is a pure function of the intake and its flags: same
//! input, same prompt, byte for byte. Red flags are always embedded in
//! full so the model cannot miss what the rule engine caught.

use std::fmt::Write;

use crate::models::{Intake, RedFlag};

pub fn build_prompt(intake: &Intake, flags: &[RedFlag]) -> String {
    let mut p = String::new();

    p.push_str(
        "You are a clinical assistant drafting a concise intake summary \
         for the treating clinician. Use only the information below. \
         Do not invent findings. Lead with the most urgent items.\n\n",
    );

    let _ = writeln!(p, "Patient: {}", intake.demographics.full_name);
    let _ = writeln!(p, "Date of birth: {}", intake.demographics.date_of_birth);
    if let Some(sex) = &intake.demographics.sex {
        let _ = writeln!(p, "Sex: {sex}");
    }

    let _ = writeln!(p, "\nChief complaint:\n{}", intake.chief_complaint);

    p.push_str("\nMedical history:\n");
    if intake.medical_history.is_empty() {
        p.push_str("- none reported\n");
    }
    for entry in &intake.medical_history {
        let _ = writeln!(p, "- {entry}");
    }

    p.push_str("\nCurrent medications:\n");
    if intake.medications.is_empty() {
        p.push_str("- none reported\n");
    }
    for med in &intake.medications {
        let _ = write!(p, "- {}", med.name);
        if let Some(dose) = &med.dose {
            let _ = write!(p, ", {dose}");
        }
        if let Some(freq) = &med.frequency {
            let _ = write!(p, ", {freq}");
        }
        p.push('\n');
    }

    p.push_str("\nAllergies:\n");
    if intake.allergies.is_empty() {
        p.push_str("- none reported\n");
    }
    for allergy in &intake.allergies {
        let _ = write!(p, "- {}", allergy.substance);
        if let Some(reaction) = &allergy.reaction {
            let _ = write!(p, " ({reaction})");
        }
        p.push('\n');
    }

    p.push_str("\nRed flags detected by screening:\n");
    if flags.is_empty() {
        p.push_str("- none\n");
    }
    for flag in flags {
        let _ = writeln!(
            p,
            "- [{}] {}: {}",
            flag.severity.as_str().to_uppercase(),
            flag.category.as_str(),
            flag.description,
        );
    }

    p.push_str("\nWrite the summary now.\n");
    p
}
