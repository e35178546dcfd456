//! Core types for modgate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Final moderation outcome for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Published without human involvement
    Approved,
    /// Waiting in the human review queue
    PendingReview,
    /// Refused by policy
    Rejected,
    /// Refused outright, typically a blacklist hit or a hard policy block
    Blocked,
}

impl Outcome {
    /// Wire name of this outcome
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "APPROVED",
            Outcome::PendingReview => "PENDING_REVIEW",
            Outcome::Rejected => "REJECTED",
            Outcome::Blocked => "BLOCKED",
        }
    }

    /// Prefix used when a policy produced this outcome
    pub fn reason_prefix(&self) -> &'static str {
        match self {
            Outcome::Approved => "Auto-approved",
            Outcome::PendingReview => "Routed to review",
            Outcome::Rejected => "Auto-rejected",
            Outcome::Blocked => "Auto-blocked",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVED" | "APPROVE" => Ok(Outcome::Approved),
            "PENDING_REVIEW" | "REVIEW" => Ok(Outcome::PendingReview),
            "REJECTED" | "REJECT" => Ok(Outcome::Rejected),
            "BLOCKED" | "BLOCK" => Ok(Outcome::Blocked),
            other => Err(format!("unknown outcome: {}", other)),
        }
    }
}

/// Risk level a policy assigns to matching content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Default action for this risk level.
    ///
    /// `High` resolves to `Blocked` only when the policy asks for it.
    pub fn default_outcome(&self, detail: Option<ActionDetail>) -> Outcome {
        match self {
            RiskLevel::Low => Outcome::Approved,
            RiskLevel::Medium => Outcome::PendingReview,
            RiskLevel::High => match detail {
                Some(ActionDetail::Block) => Outcome::Blocked,
                Some(ActionDetail::Reject) | None => Outcome::Rejected,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    /// Accepts both `LOW` and `LOW_RISK` spellings, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_suffix("_RISK").unwrap_or(&upper) {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(format!("unknown risk level: {}", s)),
        }
    }
}

/// Refinement of a HIGH risk outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionDetail {
    Block,
    Reject,
}

impl FromStr for ActionDetail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLOCK" | "BLOCKED" => Ok(ActionDetail::Block),
            "REJECT" | "REJECTED" => Ok(ActionDetail::Reject),
            other => Err(format!("unknown action detail: {}", other)),
        }
    }
}

/// Which layer produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// A configured policy matched
    Policy,
    /// No policy matched and the legacy blacklist hit
    Blacklist,
    /// Nothing matched; queued for a human
    Default,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Policy => "policy",
            DecisionSource::Blacklist => "blacklist",
            DecisionSource::Default => "default",
        }
    }
}

/// Result of evaluating one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// What happens to the content
    pub outcome: Outcome,

    /// Human-readable, traceable explanation
    pub reason: String,

    /// Layer that decided
    pub source: DecisionSource,

    /// Policy that matched, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_policy_id: Option<String>,

    /// Top-level rule of the matching policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<String>,

    /// First leaf rule that satisfied the match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_leaf_id: Option<String>,
}

impl Decision {
    /// Decision produced by the blacklist fallback
    pub fn blacklisted(keyword: &str) -> Self {
        Self {
            outcome: Outcome::Blocked,
            reason: format!("Blacklisted keyword hit: {}", keyword),
            source: DecisionSource::Blacklist,
            matched_policy_id: None,
            matched_rule_id: None,
            matched_leaf_id: None,
        }
    }

    /// Decision produced when nothing matched
    pub fn queued() -> Self {
        Self {
            outcome: Outcome::PendingReview,
            reason: "queued for manual review".to_string(),
            source: DecisionSource::Default,
            matched_policy_id: None,
            matched_rule_id: None,
            matched_leaf_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_parsing() {
        assert_eq!("LOW".parse::<RiskLevel>().unwrap(), RiskLevel::Low);
        assert_eq!("medium_risk".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert_eq!("HIGH_RISK".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("EXTREME".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_risk_default_outcome() {
        assert_eq!(RiskLevel::Low.default_outcome(None), Outcome::Approved);
        assert_eq!(RiskLevel::Medium.default_outcome(None), Outcome::PendingReview);
        assert_eq!(RiskLevel::High.default_outcome(None), Outcome::Rejected);
        assert_eq!(
            RiskLevel::High.default_outcome(Some(ActionDetail::Block)),
            Outcome::Blocked
        );
        // detail only refines HIGH
        assert_eq!(
            RiskLevel::Low.default_outcome(Some(ActionDetail::Block)),
            Outcome::Approved
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&Outcome::PendingReview).unwrap();
        assert_eq!(json, "\"PENDING_REVIEW\"");
        assert_eq!("blocked".parse::<Outcome>().unwrap(), Outcome::Blocked);
    }

    #[test]
    fn test_fallback_decisions() {
        let decision = Decision::blacklisted("spam");
        assert_eq!(decision.outcome, Outcome::Blocked);
        assert_eq!(decision.reason, "Blacklisted keyword hit: spam");

        let decision = Decision::queued();
        assert_eq!(decision.outcome, Outcome::PendingReview);
        assert_eq!(decision.source, DecisionSource::Default);

        let json = serde_json::to_value(&decision).unwrap();
        assert!(json.get("matched_policy_id").is_none());
    }
}
