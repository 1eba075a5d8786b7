//! crates/lumen_core/src/risk.rs
//!
//! Keyword scan for messages that need immediate attention. A hit escalates
//! the owning session's risk level to "high"; it never replaces professional
//! judgement and the assistant prompt handles the actual guidance.

/// Crisis vocabulary, matched case-insensitively as substrings.
const RISK_KEYWORDS: &[&str] = &[
    "suicídio",
    "matar",
    "morrer",
    "desesperado",
    "sem esperança",
    "não aguento mais",
    "quero sumir",
    "acabar com tudo",
];

/// Risk level assigned to a session once a risky message is seen.
pub const ESCALATED_RISK_LEVEL: &str = "high";

/// Returns true when the text contains any of the crisis keywords.
pub fn contains_risk_factors(text: &str) -> bool {
    let lowered = text.to_lowercase();
    RISK_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_keywords_regardless_of_case() {
        assert!(contains_risk_factors("Não aguento mais nada disso"));
        assert!(contains_risk_factors("estou DESESPERADO"));
    }

    #[test]
    fn detects_keywords_inside_longer_sentences() {
        assert!(contains_risk_factors(
            "às vezes penso em acabar com tudo de uma vez"
        ));
    }

    #[test]
    fn ignores_ordinary_messages() {
        assert!(!contains_risk_factors("hoje foi um dia bom no trabalho"));
        assert!(!contains_risk_factors(""));
    }
}
