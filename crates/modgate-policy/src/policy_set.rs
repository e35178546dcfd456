//! Ordered, immutable collection of loaded policies

use modgate_core::{Decision, DecisionSource, LoadError};
use std::collections::HashSet;

use crate::policy::{Policy, PolicySummary};
use crate::registry::SkippedRule;
use crate::rule::{Rule, RuleInput};

/// The active policies, in declaration order.
///
/// Order is the only tie-break: the first matching policy wins.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
    skipped: Vec<SkippedRule>,
}

impl PolicySet {
    /// A set with no policies
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set, rejecting duplicate policy ids
    pub fn new(policies: Vec<Policy>) -> Result<Self, LoadError> {
        let mut seen = HashSet::with_capacity(policies.len());
        for policy in &policies {
            if !seen.insert(policy.id()) {
                return Err(LoadError::DuplicatePolicyId(policy.id().to_string()));
            }
        }
        Ok(Self {
            policies,
            skipped: Vec::new(),
        })
    }

    pub(crate) fn with_skipped(mut self, skipped: Vec<SkippedRule>) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Look up a policy by id
    pub fn get(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id() == id)
    }

    /// Rule nodes dropped at load time because their type was unknown
    pub fn skipped(&self) -> &[SkippedRule] {
        &self.skipped
    }

    pub fn summaries(&self) -> Vec<PolicySummary> {
        self.policies.iter().map(Policy::summary).collect()
    }

    /// First policy, in order, whose rule matches
    pub fn find_match<'s>(&'s self, input: &RuleInput<'_>) -> Option<PolicyMatch<'s>> {
        self.policies.iter().find_map(|policy| {
            policy
                .find_match(input)
                .map(|leaf| PolicyMatch { policy, leaf })
        })
    }
}

/// A policy that matched, with the rule that decided it
#[derive(Debug, Clone, Copy)]
pub struct PolicyMatch<'a> {
    pub policy: &'a Policy,
    pub leaf: &'a Rule,
}

impl PolicyMatch<'_> {
    pub fn decision(&self) -> Decision {
        let (outcome, fragment) = self.policy.resolve_action(self.leaf);
        Decision {
            outcome,
            reason: format!("{}: {}", outcome.reason_prefix(), fragment),
            source: DecisionSource::Policy,
            matched_policy_id: Some(self.policy.id().to_string()),
            matched_rule_id: Some(self.policy.rule().id.clone()),
            matched_leaf_id: Some(self.leaf.id.clone()),
        }
    }
}
