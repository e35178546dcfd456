//! Decision engine
//!
//! Evaluates submissions against the active [`PolicySet`], falling back to the
//! blacklist and then to manual review. The active set is swapped atomically
//! on reload: every evaluation runs against exactly one set.

use modgate_core::{Decision, LoadError};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::blacklist::Blacklist;
use crate::loader::{DocumentSource, PolicyLoader};
use crate::policy::PolicySummary;
use crate::policy_set::PolicySet;
use crate::registry::SkippedRule;
use crate::rule::RuleInput;

/// Result of a successful load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Number of policies now active
    pub policies: usize,

    /// Rule nodes dropped for having an unknown type
    pub skipped: Vec<SkippedRule>,
}

/// Policy-first moderation decisions
pub struct DecisionEngine {
    active: RwLock<Arc<PolicySet>>,
    policies_enabled: AtomicBool,
    blacklist: Arc<dyn Blacklist>,
    loader: PolicyLoader,
}

impl DecisionEngine {
    /// Engine with no policies, consulting `blacklist` as fallback
    pub fn new(blacklist: Arc<dyn Blacklist>) -> Self {
        Self {
            active: RwLock::new(Arc::new(PolicySet::empty())),
            policies_enabled: AtomicBool::new(true),
            blacklist,
            loader: PolicyLoader::new(),
        }
    }

    /// Use a custom loader, e.g. one with extra rule kinds registered
    pub fn with_loader(mut self, loader: PolicyLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_policies_enabled(self, enabled: bool) -> Self {
        self.policies_enabled.store(enabled, Ordering::SeqCst);
        self
    }

    /// Decide on a submission. Never fails.
    pub fn evaluate(&self, text: &str, user_id: &str) -> Decision {
        let decision = self.decide(text, user_id);

        debug!(
            outcome = ?decision.outcome,
            source = decision.source.as_str(),
            policy = decision.matched_policy_id.as_deref().unwrap_or("-"),
            "Decision made"
        );
        metrics::counter!(
            "modgate_decisions_total",
            "source" => decision.source.as_str(),
            "outcome" => decision.outcome.as_str()
        )
        .increment(1);

        decision
    }

    fn decide(&self, text: &str, user_id: &str) -> Decision {
        if self.policies_enabled() {
            let policies = self.snapshot();
            let input = RuleInput::new(text, user_id);
            if let Some(matched) = policies.find_match(&input) {
                return matched.decision();
            }
        }

        match self.blacklist.check(text) {
            Some(keyword) => Decision::blacklisted(&keyword),
            None => Decision::queued(),
        }
    }

    /// Parse a document and make it the active set.
    ///
    /// On failure the previously active set stays in place.
    pub fn load(&self, source: &DocumentSource) -> Result<LoadReport, LoadError> {
        match self.loader.load(source) {
            Ok(set) => Ok(self.install(set)),
            Err(e) => {
                error!(error = %e, "Policy load rejected, keeping previous policies");
                metrics::counter!("modgate_policy_reloads_total", "result" => "failure")
                    .increment(1);
                Err(e)
            }
        }
    }

    /// Make an already-built set the active one
    pub fn install(&self, set: PolicySet) -> LoadReport {
        let report = LoadReport {
            policies: set.len(),
            skipped: set.skipped().to_vec(),
        };

        *self.active.write() = Arc::new(set);

        info!(
            policies = report.policies,
            skipped = report.skipped.len(),
            "Policies installed"
        );
        metrics::counter!("modgate_policy_reloads_total", "result" => "success").increment(1);

        report
    }

    /// Drop all policies
    pub fn clear(&self) {
        *self.active.write() = Arc::new(PolicySet::empty());
        info!("Policies cleared");
    }

    /// The active set. Holding it keeps it alive across reloads.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.active.read().clone()
    }

    pub fn list_policies(&self) -> Vec<PolicySummary> {
        self.snapshot().summaries()
    }

    pub fn policies_enabled(&self) -> bool {
        self.policies_enabled.load(Ordering::SeqCst)
    }

    pub fn set_policies_enabled(&self, enabled: bool) {
        self.policies_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "Policy evaluation toggled");
    }

    pub fn blacklist(&self) -> &Arc<dyn Blacklist> {
        &self.blacklist
    }

    pub fn loader(&self) -> &PolicyLoader {
        &self.loader
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("policies", &self.snapshot().len())
            .field("policies_enabled", &self.policies_enabled())
            .finish()
    }
}
