//! Policy definitions and action resolution

use modgate_core::{ActionDetail, LoadError, Outcome, RiskLevel};
use serde::Serialize;

use crate::rule::{Rule, RuleInput};

/// How a policy states its outcome.
///
/// A direct `action` wins over `risk` when both are given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Outcome>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,

    /// Only meaningful for HIGH risk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_detail: Option<ActionDetail>,
}

impl OutcomeSpec {
    pub fn action(action: Outcome) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    pub fn risk(risk: RiskLevel) -> Self {
        Self {
            risk: Some(risk),
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: ActionDetail) -> Self {
        self.action_detail = Some(detail);
        self
    }

    /// Resolved outcome, if either an action or a risk is present
    pub fn resolve(&self) -> Option<Outcome> {
        self.action
            .or_else(|| self.risk.map(|risk| risk.default_outcome(self.action_detail)))
    }
}

/// A named rule plus the outcome it produces when it matches
#[derive(Debug, Clone)]
pub struct Policy {
    id: String,
    name: Option<String>,
    rule: Rule,
    spec: OutcomeSpec,
    outcome: Outcome,
    reason_template: Option<String>,
}

impl Policy {
    /// Build a policy; fails when `spec` names neither an action nor a risk
    pub fn new(id: impl Into<String>, rule: Rule, spec: OutcomeSpec) -> Result<Self, LoadError> {
        let id = id.into();
        let outcome = spec
            .resolve()
            .ok_or_else(|| LoadError::missing(format!("policy `{}`", id), "action"))?;
        Ok(Self {
            id,
            name: None,
            rule,
            spec,
            outcome,
            reason_template: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Template for the decision reason. `{policy}`, `{rule}` and `{outcome}`
    /// are substituted.
    pub fn with_reason_template(mut self, template: impl Into<String>) -> Self {
        self.reason_template = Some(template.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name if present, id otherwise
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn spec(&self) -> &OutcomeSpec {
        &self.spec
    }

    pub fn reason_template(&self) -> Option<&str> {
        self.reason_template.as_deref()
    }

    /// Outcome this policy produces when it matches
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Evaluate the policy's rule tree
    pub fn evaluate(&self, input: &RuleInput<'_>) -> bool {
        self.rule.matches(input)
    }

    /// Evaluate and, on a match, return the leaf rule that decided it
    pub fn find_match(&self, input: &RuleInput<'_>) -> Option<&Rule> {
        self.rule.find_match(input)
    }

    /// Outcome plus the reason fragment for a match decided by `matched`.
    ///
    /// The fragment always names the policy and the matched rule.
    pub fn resolve_action(&self, matched: &Rule) -> (Outcome, String) {
        let policy = self.label();
        let rule = matched.label();

        let fragment = match &self.reason_template {
            Some(template) => {
                let traced = template.contains("{policy}") && template.contains("{rule}");
                let rendered = template
                    .replace("{policy}", policy)
                    .replace("{rule}", rule)
                    .replace("{outcome}", self.outcome.as_str());
                if traced {
                    rendered
                } else {
                    format!("{} (policy '{}', rule '{}')", rendered, policy, rule)
                }
            }
            None => format!("policy '{}' matched rule '{}'", policy, rule),
        };

        (self.outcome, fragment)
    }

    /// Read-only description for listings
    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            outcome: self.outcome,
            spec: self.spec,
            rule_id: self.rule.id.clone(),
            rule_type: self.rule.type_tag().to_string(),
        }
    }
}

/// Introspection view of a loaded policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySummary {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Resolved outcome
    pub outcome: Outcome,

    /// Outcome as declared
    #[serde(flatten)]
    pub spec: OutcomeSpec,

    pub rule_id: String,
    pub rule_type: String,
}
