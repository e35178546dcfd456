//! Policy document loading
//!
//! A document is an ordered list of policy objects, either bare or under a
//! top-level `policies` key, in YAML or JSON. A top-level `rules` key instead
//! holds rule nodes that each carry their own id and outcome. Loading is
//! all-or-nothing: any structural problem fails the whole document, while
//! rule nodes with an unknown `type` load as rules that never match and are
//! reported.

use modgate_core::{LoadError, Outcome, RiskLevel};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::policy::{OutcomeSpec, Policy};
use crate::policy_set::PolicySet;
use crate::registry::{RuleNode, RuleParser, RuleRegistry};
use crate::rule::{CompositeOperator, Rule};

/// Serialization format of a policy document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` files are JSON, everything else is read as YAML
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Yaml => "YAML",
            DocumentFormat::Json => "JSON",
        }
    }
}

/// Where a policy document comes from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    File(PathBuf),
    Inline {
        content: String,
        format: DocumentFormat,
    },
}

impl DocumentSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn yaml(content: impl Into<String>) -> Self {
        Self::Inline {
            content: content.into(),
            format: DocumentFormat::Yaml,
        }
    }

    pub fn json(content: impl Into<String>) -> Self {
        Self::Inline {
            content: content.into(),
            format: DocumentFormat::Json,
        }
    }
}

/// Parses policy documents into [`PolicySet`]s
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    registry: RuleRegistry,
}

impl PolicyLoader {
    /// Loader with the built-in rule kinds
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with a custom rule registry
    pub fn with_registry(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Load a document from any source
    pub fn load(&self, source: &DocumentSource) -> Result<PolicySet, LoadError> {
        match source {
            DocumentSource::File(path) => self.load_file(path),
            DocumentSource::Inline { content, format } => self.parse_str(content, *format),
        }
    }

    /// Load a document from disk, picking the format from the extension
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<PolicySet, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&content, DocumentFormat::from_path(path))
    }

    /// Parse a document held in memory
    pub fn parse_str(&self, content: &str, format: DocumentFormat) -> Result<PolicySet, LoadError> {
        let malformed = |message: String| LoadError::Malformed {
            format: format.name(),
            message,
        };
        if content.trim().is_empty() {
            return Ok(PolicySet::empty());
        }
        let document: Value = match format {
            DocumentFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| malformed(e.to_string()))?
            }
            DocumentFormat::Json => {
                serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?
            }
        };
        self.parse_value(&document)
    }

    /// Build a policy set from an already-parsed document tree
    pub fn parse_value(&self, document: &Value) -> Result<PolicySet, LoadError> {
        let (layout, items) = match document {
            Value::Null => return Ok(PolicySet::empty()),
            Value::Array(items) => (Layout::Policies, items),
            Value::Object(fields) => match (fields.get("policies"), fields.get("rules")) {
                (Some(Value::Array(items)), _) => (Layout::Policies, items),
                (None, Some(Value::Array(items))) => (Layout::Rules, items),
                (Some(Value::Null), _) | (None, Some(Value::Null)) => {
                    return Ok(PolicySet::empty())
                }
                (Some(_), _) => {
                    return Err(LoadError::InvalidDocument(
                        "`policies` must be a list".to_string(),
                    ))
                }
                (None, Some(_)) => {
                    return Err(LoadError::InvalidDocument(
                        "`rules` must be a list".to_string(),
                    ))
                }
                (None, None) => {
                    return Err(LoadError::InvalidDocument(
                        "expected a list of policies, a `policies` key or a `rules` key"
                            .to_string(),
                    ))
                }
            },
            _ => {
                return Err(LoadError::InvalidDocument(
                    "expected a list of policies, a `policies` key or a `rules` key".to_string(),
                ))
            }
        };

        let mut parser = RuleParser::new(&self.registry);
        let mut policies = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let policy = match layout {
                Layout::Policies => self.parse_policy(index, item, &mut parser)?,
                Layout::Rules => self.parse_standalone_rule(index, item, &mut parser)?,
            };
            debug!(
                policy = %policy.id(),
                outcome = %policy.outcome(),
                "Parsed policy"
            );
            policies.push(policy);
        }

        Ok(PolicySet::new(policies)?.with_skipped(parser.into_skipped()))
    }

    /// A rule that carries its own outcome, as found under a top-level
    /// `rules` key. Without an id it is named by position.
    fn parse_standalone_rule(
        &self,
        index: usize,
        value: &Value,
        parser: &mut RuleParser<'_>,
    ) -> Result<Policy, LoadError> {
        let position = format!("rule #{}", index);
        let fields = value.as_object().ok_or_else(|| {
            LoadError::InvalidDocument(format!("{} must be a mapping", position))
        })?;

        let id = match RuleNode::new(fields, &position).str_field(&["id"])? {
            Some(id) if id.trim().is_empty() => return Err(LoadError::invalid(&position, "id", id)),
            Some(id) => id.to_string(),
            None => format!("rule-{}", index),
        };

        let context = format!("rule `{}`", id);
        let node = RuleNode::new(fields, &context);

        let mut spec = parse_outcome_spec(&node)?;
        if spec.resolve().is_none() {
            if let Some(strongest) = strongest_child_spec(&node)? {
                spec = strongest;
            }
        }

        let rule = parser.parse_rule(value, &id)?;
        let mut policy = Policy::new(id, rule, spec)?;
        if let Some(name) = node.str_field(&["name"])? {
            policy = policy.with_name(name);
        }
        if let Some(template) = node.str_field(&["reason_template", "reason"])? {
            policy = policy.with_reason_template(template);
        }
        Ok(policy)
    }

    fn parse_policy(
        &self,
        index: usize,
        value: &Value,
        parser: &mut RuleParser<'_>,
    ) -> Result<Policy, LoadError> {
        let position = format!("policy #{}", index);
        let fields = value.as_object().ok_or_else(|| {
            LoadError::InvalidDocument(format!("{} must be a mapping", position))
        })?;

        let id = RuleNode::new(fields, &position)
            .str_field(&["id"])?
            .ok_or_else(|| LoadError::missing(&position, "id"))?;
        if id.trim().is_empty() {
            return Err(LoadError::invalid(&position, "id", id));
        }

        let context = format!("policy `{}`", id);
        let node = RuleNode::new(fields, &context);
        let name = node.str_field(&["name"])?.map(str::to_string);

        let spec = parse_outcome_spec(&node)?;
        let rule = self.parse_policy_rule(id, &node, parser)?;

        let mut policy = Policy::new(id, rule, spec)?;
        if let Some(name) = name {
            policy = policy.with_name(name);
        }
        if let Some(template) = node.str_field(&["reason_template", "reason"])? {
            policy = policy.with_reason_template(template);
        }
        Ok(policy)
    }

    /// The policy's rule tree: `rule`, `condition` or a typed `composition`,
    /// else a `rules` list joined by `composition.operator`
    fn parse_policy_rule(
        &self,
        policy_id: &str,
        node: &RuleNode<'_>,
        parser: &mut RuleParser<'_>,
    ) -> Result<Rule, LoadError> {
        let rule_path = format!("{}.rule", policy_id);

        if let Some(tree) = node.get("rule").or_else(|| node.get("condition")) {
            return parser.parse_rule(tree, &rule_path);
        }

        let composition = node.get("composition");
        if let Some(tree) = composition.filter(|c| c.get("type").is_some()) {
            return parser.parse_rule(tree, &rule_path);
        }

        match node.get("rules") {
            Some(rules) => self.parse_rule_list(policy_id, node, rules, composition, parser),
            None => Err(LoadError::missing(node.path(), "rule")),
        }
    }

    /// Flat `rules` list, optionally narrowed and ordered by
    /// `composition.rule_ids`; OR unless `composition.operator` says otherwise
    fn parse_rule_list(
        &self,
        policy_id: &str,
        node: &RuleNode<'_>,
        rules: &Value,
        composition: Option<&Value>,
        parser: &mut RuleParser<'_>,
    ) -> Result<Rule, LoadError> {
        let items = rules
            .as_array()
            .ok_or_else(|| LoadError::invalid(node.path(), "rules", rules.to_string()))?;

        let base = format!("{}.rules", policy_id);
        let mut declared = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            declared.push(parser.parse_rule(item, &format!("{}.{}", base, index))?);
        }

        let mut operator = CompositeOperator::Or;
        let mut selected = declared;
        match composition {
            None | Some(Value::Null) => {}
            Some(Value::Object(fields)) => {
                let composition = RuleNode::new(fields, node.path());
                if let Some(op) = composition.parsed::<CompositeOperator>(&["operator"])? {
                    operator = op;
                }
                if fields.contains_key("rule_ids") {
                    let mut ordered = Vec::new();
                    for rule_id in composition.string_list(&["rule_ids"])? {
                        let rule = selected
                            .iter()
                            .find(|r| r.id == rule_id)
                            .cloned()
                            .ok_or_else(|| {
                                LoadError::invalid(node.path(), "rule_ids", rule_id.as_str())
                            })?;
                        ordered.push(rule);
                    }
                    selected = ordered;
                }
            }
            Some(other) => {
                return Err(LoadError::invalid(node.path(), "composition", other.to_string()))
            }
        }

        parser.claim_rule_id(&base)?;
        Ok(Rule::composite(base, operator, selected))
    }
}

fn parse_outcome_spec(node: &RuleNode<'_>) -> Result<OutcomeSpec, LoadError> {
    let mut action = node.parsed::<Outcome>(&["action"])?;
    let mut risk = node.parsed::<RiskLevel>(&["risk", "risk_level"])?;

    // `outcome` carries a risk level in one dialect and an action in another
    if let Some(raw) = node.str_field(&["outcome"])? {
        if let Ok(level) = raw.parse::<RiskLevel>() {
            risk = risk.or(Some(level));
        } else if let Ok(outcome) = raw.parse::<Outcome>() {
            action = action.or(Some(outcome));
        } else {
            return Err(LoadError::invalid(node.path(), "outcome", raw));
        }
    }

    Ok(OutcomeSpec {
        action,
        risk,
        action_detail: node.parsed(&["action_detail"])?,
    })
}

/// Outcome of the highest-risk direct child that declares one; the first
/// wins among equals
fn strongest_child_spec(node: &RuleNode<'_>) -> Result<Option<OutcomeSpec>, LoadError> {
    let children = match ["rules", "children", "operands"]
        .iter()
        .find_map(|key| node.get(key))
    {
        Some(Value::Array(children)) => children,
        _ => return Ok(None),
    };

    let rank = |spec: &OutcomeSpec| spec.risk.unwrap_or(RiskLevel::Low);
    let mut strongest: Option<OutcomeSpec> = None;
    for (index, child) in children.iter().enumerate() {
        let Some(fields) = child.as_object() else {
            continue;
        };
        let path = format!("{}.{}", node.path(), index);
        let spec = parse_outcome_spec(&RuleNode::new(fields, &path))?;
        if spec.resolve().is_none() {
            continue;
        }
        if strongest.map_or(true, |current| rank(&spec) > rank(&current)) {
            strongest = Some(spec);
        }
    }
    Ok(strongest)
}

/// Shape of the top-level list
#[derive(Debug, Clone, Copy)]
enum Layout {
    /// Policy objects wrapping a rule tree
    Policies,
    /// Rule nodes carrying their own outcome
    Rules,
}
