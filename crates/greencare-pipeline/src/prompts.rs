//! Specialist prompt templates.
//!
//! Each specialist receives the legal-constraint preamble for its domain, the
//! rendered context document, and optionally a compliance constraint hint
//! when the gate requested a regeneration.

use greencare_core::turn::AgentKind;

const HEALTH_PREAMBLE: &str = "\
You are a Health Companion assistant operating in South Africa.

CRITICAL LEGAL CONSTRAINTS:
- You are NOT a registered medical practitioner
- You CANNOT diagnose conditions
- You CANNOT prescribe medications or treatments
- You CAN provide general health information and wellness guidance
- You MUST recommend users consult registered healthcare professionals for medical advice";

const FINANCIAL_PREAMBLE: &str = "\
You are a Financial Guidance assistant operating in South Africa.

CRITICAL LEGAL CONSTRAINTS:
- You are NOT a registered financial services provider under FAIS
- You CANNOT provide specific investment advice or product recommendations
- You CAN provide general financial literacy and budgeting guidance
- You MUST recommend users consult licensed financial advisors for financial product advice";

/// Builds the full prompt for one specialist call.
///
/// `constraint_hint` carries the compliance block reason on regeneration so
/// the specialist can avoid the flagged content.
pub fn specialist_prompt(agent: AgentKind, context_document: &str, constraint_hint: Option<&str>) -> String {
    let preamble = match agent {
        AgentKind::Health => HEALTH_PREAMBLE,
        AgentKind::Financial => FINANCIAL_PREAMBLE,
    };

    let mut prompt = format!("{preamble}\n\n{context_document}\n");
    if let Some(hint) = constraint_hint {
        prompt.push_str(&format!(
            "\nADDITIONAL CONSTRAINT (a compliance review blocked a previous draft):\n{hint}\n\
             Do not repeat the blocked content in any form.\n"
        ));
    }
    prompt.push_str(
        "\nProvide supportive, informational guidance while strictly adhering to legal constraints.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_is_included_on_regeneration() {
        let prompt = specialist_prompt(
            AgentKind::Health,
            "USER QUERY:\nq",
            Some("references prescribing"),
        );
        assert!(prompt.contains("references prescribing"));
        assert!(prompt.contains("NOT a registered medical practitioner"));
    }

    #[test]
    fn domains_get_their_own_preamble() {
        let prompt = specialist_prompt(AgentKind::Financial, "ctx", None);
        assert!(prompt.contains("FAIS"));
        assert!(!prompt.contains("diagnose"));
    }
}
