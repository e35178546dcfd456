//! modgate Policy Engine
//!
//! Declarative, ordered moderation policies evaluated first-match-wins.
//!
//! Policies are loaded from YAML or JSON and specify:
//! - A rule tree (keyword, user and AND/OR composite rules)
//! - An outcome, either directly or through a risk level
//! - An optional reason template
//!
//! The [`DecisionEngine`] consults the active policies first, then a
//! [`Blacklist`], then routes the submission to manual review.

pub mod blacklist;
pub mod engine;
pub mod loader;
pub mod policy;
pub mod policy_set;
pub mod registry;
pub mod rule;

pub use blacklist::{Blacklist, KeywordBlacklist};
pub use engine::{DecisionEngine, LoadReport};
pub use loader::{DocumentFormat, DocumentSource, PolicyLoader};
pub use policy::{OutcomeSpec, Policy, PolicySummary};
pub use policy_set::{PolicyMatch, PolicySet};
pub use registry::{RuleNode, RuleParser, RuleRegistry, SkippedRule, MAX_RULE_DEPTH};
pub use rule::{
    CompositeOperator, CompositeRule, CustomRule, KeywordRule, MatchMode, Rule, RuleInput, RuleKind,
    RulePredicate, UserRule,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::blacklist::{Blacklist, KeywordBlacklist};
    pub use crate::engine::{DecisionEngine, LoadReport};
    pub use crate::loader::{DocumentSource, PolicyLoader};
    pub use crate::policy::{OutcomeSpec, Policy};
    pub use crate::policy_set::PolicySet;
    pub use crate::rule::{CompositeOperator, MatchMode, Rule, RuleInput};
    pub use modgate_core::{Decision, DecisionSource, Outcome, RiskLevel};
}
