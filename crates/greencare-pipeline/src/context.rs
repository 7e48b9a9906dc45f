//! Per-request context assembly.
//!
//! Builds the bounded context document sent to the specialists: the profile
//! snapshot rendered in a stable field order, the most recent conversation
//! turns oldest-to-newest, and the current query. Older turns are dropped
//! first when the rendered size exceeds the byte budget; the current query is
//! never dropped.

use std::fmt::Write as _;

use greencare_core::error::{GreencareError, Result};
use greencare_core::profile::UserProfile;
use greencare_core::turn::ConversationTurn;

/// A request-scoped bundle of everything the specialists may see.
///
/// Owned exclusively by one in-flight request; never shared across requests.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    /// Rendered profile block (stable field order).
    profile_block: String,
    /// Turns included after budget trimming, oldest first.
    history: Vec<ConversationTurn>,
    /// The current user query, verbatim.
    query: String,
}

impl ContextBundle {
    /// The included history, oldest first.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// The current query, verbatim.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Renders the full context document. Deterministic for identical inputs.
    pub fn render(&self) -> String {
        let mut out = self.profile_block.clone();

        if !self.history.is_empty() {
            out.push_str("\nRECENT CONVERSATION:\n");
            for turn in &self.history {
                let _ = writeln!(out, "{}: {}", turn.role, turn.content);
            }
        }

        out.push_str("\nUSER QUERY:\n");
        out.push_str(&self.query);
        out
    }

    /// Size of the rendered document in bytes.
    pub fn byte_size(&self) -> usize {
        self.render().len()
    }
}

/// Assembles [`ContextBundle`]s within a fixed byte budget.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    budget_bytes: usize,
}

impl ContextBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Builds the context for one request.
    ///
    /// `history` is the session's recent turns, oldest first (as returned by
    /// the turn store). Turns are dropped oldest-first until the rendered
    /// document fits the budget.
    ///
    /// # Errors
    ///
    /// `GreencareError::ContextTooLarge` only when the profile block plus the
    /// query alone already exceed the budget. The caller must then reject or
    /// shorten the query; no silent truncation happens here.
    pub fn build(
        &self,
        profile: &UserProfile,
        history: &[ConversationTurn],
        query: &str,
    ) -> Result<ContextBundle> {
        let profile_block = render_profile(profile);

        let mut bundle = ContextBundle {
            profile_block,
            history: Vec::new(),
            query: query.to_string(),
        };

        let base_size = bundle.byte_size();
        if base_size > self.budget_bytes {
            return Err(GreencareError::ContextTooLarge {
                budget_bytes: self.budget_bytes,
                required_bytes: base_size,
            });
        }

        // Drop oldest turns until the rendered document fits. History is
        // small (bounded by the store query limit), so re-rendering is cheap.
        bundle.history = history.to_vec();
        while bundle.byte_size() > self.budget_bytes {
            bundle.history.remove(0);
        }

        Ok(bundle)
    }
}

/// Renders the profile block in the stable order the specialists expect:
/// personal details, medical aid, active conditions, active medications,
/// allergies, income/budget summary.
fn render_profile(profile: &UserProfile) -> String {
    let mut out = String::new();

    let personal = &profile.personal;
    let _ = writeln!(out, "User: {} {}", personal.first_name, personal.last_name);
    if let Some(age) = personal.age() {
        let _ = writeln!(out, "Age: {age}");
    }
    if let Some(gender) = &personal.gender {
        let _ = writeln!(out, "Gender: {gender}");
    }
    if let (Some(city), Some(province)) = (&personal.city, &personal.province) {
        let _ = writeln!(out, "Location: {city}, {province}, South Africa");
    }

    if let Some(aid) = &profile.medical_aid {
        let _ = writeln!(out, "\nMedical Aid: {} ({})", aid.scheme_name, aid.plan_type);
        if let Some(number) = &aid.membership_number {
            let _ = writeln!(out, "Membership: {number}");
        }
    }

    let conditions: Vec<&str> = profile
        .active_conditions()
        .map(|c| c.name.as_str())
        .collect();
    if !conditions.is_empty() {
        let _ = writeln!(out, "Active Conditions: {}", conditions.join(", "));
    }

    let medications: Vec<String> = profile
        .active_medications()
        .map(|m| format!("{} ({})", m.name, m.dosage))
        .collect();
    if !medications.is_empty() {
        let _ = writeln!(out, "Current Medications: {}", medications.join(", "));
    }

    let allergies: Vec<String> = profile
        .allergies
        .iter()
        .map(|a| format!("{} ({})", a.allergen, a.severity))
        .collect();
    if !allergies.is_empty() {
        let _ = writeln!(out, "Allergies: {}", allergies.join(", "));
    }

    if let Some(financial) = &profile.financial {
        if let Some(income) = financial.monthly_income {
            let _ = writeln!(out, "\nMonthly Income: {} {:.2}", financial.currency, income);
        }
        if let Some(budget) = financial.monthly_budget {
            let _ = writeln!(out, "Monthly Budget: {} {:.2}", financial.currency, budget);
        }
    }

    out
}
