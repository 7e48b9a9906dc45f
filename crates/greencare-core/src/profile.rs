//! User profile domain model.
//!
//! An immutable snapshot of everything the specialists are allowed to know
//! about a user: personal details, medical aid cover, conditions, medications,
//! allergies and a monthly income/budget summary. The pipeline only ever
//! reads this; edits belong to the surrounding application.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Personal details attached to a user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalDetails {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl PersonalDetails {
    /// Age in whole years as of today, when a date of birth is on file.
    pub fn age(&self) -> Option<u32> {
        let dob = self.date_of_birth?;
        let today = Utc::now().date_naive();
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

/// Medical aid scheme membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalAid {
    pub scheme_name: String,
    pub plan_type: String,
    #[serde(default)]
    pub membership_number: Option<String>,
}

/// Status of a recorded medical condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    Active,
    Resolved,
}

/// A single entry in the user's medical history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub status: ConditionStatus,
}

/// A medication the user takes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Severity of an allergy, mild to life-threatening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

/// A recorded allergy with severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen: String,
    pub severity: Severity,
    #[serde(default)]
    pub reaction: Option<String>,
}

/// Monthly income/budget summary from the user's financial account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub monthly_income: Option<f64>,
    #[serde(default)]
    pub monthly_budget: Option<f64>,
}

fn default_currency() -> String {
    "ZAR".to_string()
}

/// User profile domain model.
///
/// Field order matters for context rendering: the lists keep the order the
/// store returned them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: u64,
    pub personal: PersonalDetails,
    #[serde(default)]
    pub medical_aid: Option<MedicalAid>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub financial: Option<FinancialSummary>,
}

impl UserProfile {
    /// Conditions currently marked active, in stored order.
    pub fn active_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions
            .iter()
            .filter(|c| c.status == ConditionStatus::Active)
    }

    /// Medications currently marked active, in stored order.
    pub fn active_medications(&self) -> impl Iterator<Item = &Medication> {
        self.medications.iter().filter(|m| m.active)
    }
}
