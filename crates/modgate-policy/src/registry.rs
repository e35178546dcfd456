//! Rule-kind registry
//!
//! Maps a rule node's `type` tag to the constructor that builds it. The
//! built-in kinds are registered by [`RuleRegistry::with_builtins`]; adding a
//! new kind means registering one more constructor, usually one returning
//! [`RuleKind::Custom`].

use modgate_core::LoadError;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::rule::{CompositeOperator, CompositeRule, KeywordRule, MatchMode, Rule, RuleKind, UserRule};

/// Deepest composite nesting a document may use
pub const MAX_RULE_DEPTH: usize = 32;

/// Builds the kind of a rule node. Composite kinds recurse through the parser.
pub type RuleConstructor =
    Arc<dyn Fn(&RuleNode<'_>, &mut RuleParser<'_>) -> Result<RuleKind, LoadError> + Send + Sync>;

/// A rule node whose `type` tag was not recognized
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedRule {
    /// Location of the node in the document
    pub path: String,

    /// The unrecognized tag
    pub type_tag: String,
}

/// Registry of rule kinds by type tag
#[derive(Clone)]
pub struct RuleRegistry {
    constructors: HashMap<String, RuleConstructor>,
}

impl RuleRegistry {
    /// Registry with no kinds at all
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with `keyword`, `user`, `composite`, `and` and `or`
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register("keyword", keyword_rule)
            .register("user", user_rule)
            .register("composite", composite_rule)
            .register("and", |node: &RuleNode<'_>, parser: &mut RuleParser<'_>| {
                fixed_composite(node, parser, CompositeOperator::And)
            })
            .register("or", |node: &RuleNode<'_>, parser: &mut RuleParser<'_>| {
                fixed_composite(node, parser, CompositeOperator::Or)
            });
        registry
    }

    /// Register (or replace) the constructor for a tag. Tags are case-insensitive.
    pub fn register<F>(&mut self, tag: &str, constructor: F) -> &mut Self
    where
        F: Fn(&RuleNode<'_>, &mut RuleParser<'_>) -> Result<RuleKind, LoadError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(tag.to_ascii_lowercase(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(&tag.to_ascii_lowercase())
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    fn get(&self, tag: &str) -> Option<RuleConstructor> {
        self.constructors.get(&tag.to_ascii_lowercase()).cloned()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry").field("tags", &self.tags()).finish()
    }
}

/// A rule object from the document, with its location
#[derive(Debug, Clone, Copy)]
pub struct RuleNode<'a> {
    fields: &'a Map<String, Value>,
    path: &'a str,
}

impl<'a> RuleNode<'a> {
    pub(crate) fn new(fields: &'a Map<String, Value>, path: &'a str) -> Self {
        Self { fields, path }
    }

    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Raw field access
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key)
    }

    /// First present alias, as a string
    pub fn str_field(&self, aliases: &[&str]) -> Result<Option<&'a str>, LoadError> {
        match first_present(self.fields, aliases) {
            None => Ok(None),
            Some((_, Value::String(s))) => Ok(Some(s.as_str())),
            Some((key, other)) => Err(LoadError::invalid(self.path, key, other.to_string())),
        }
    }

    /// First present alias, as a list of strings. A bare string counts as a
    /// one-element list; `null` as an empty one.
    pub fn string_list(&self, aliases: &[&str]) -> Result<Vec<String>, LoadError> {
        match first_present(self.fields, aliases) {
            None | Some((_, Value::Null)) => Ok(Vec::new()),
            Some((_, Value::String(s))) => Ok(vec![s.clone()]),
            Some((key, Value::Array(items))) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(LoadError::invalid(self.path, key, other.to_string())),
                })
                .collect(),
            Some((key, other)) => Err(LoadError::invalid(self.path, key, other.to_string())),
        }
    }

    /// Like [`RuleNode::string_list`], but blank entries are an error
    pub fn non_blank_list(&self, aliases: &[&str]) -> Result<Vec<String>, LoadError> {
        let items = self.string_list(aliases)?;
        match items.iter().find(|item| item.trim().is_empty()) {
            Some(blank) => Err(LoadError::invalid(self.path, aliases[0], blank.as_str())),
            None => Ok(items),
        }
    }

    /// First present alias, parsed with `FromStr`
    pub fn parsed<T: std::str::FromStr>(&self, aliases: &[&str]) -> Result<Option<T>, LoadError> {
        let Some(raw) = self.str_field(aliases)? else {
            return Ok(None);
        };
        raw.parse()
            .map(Some)
            .map_err(|_| LoadError::invalid(self.path, aliases[0], raw))
    }
}

fn first_present<'a, 'k>(
    fields: &'a Map<String, Value>,
    aliases: &[&'k str],
) -> Option<(&'k str, &'a Value)> {
    aliases
        .iter()
        .find_map(|key| fields.get(*key).map(|value| (*key, value)))
}

/// Recursive descent over rule nodes, shared by all constructors of one load
pub struct RuleParser<'r> {
    registry: &'r RuleRegistry,
    rule_ids: HashSet<String>,
    skipped: Vec<SkippedRule>,
    depth: usize,
}

impl<'r> RuleParser<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            rule_ids: HashSet::new(),
            skipped: Vec::new(),
            depth: 0,
        }
    }

    /// Parse one rule node found at `path`.
    ///
    /// An unrecognized tag yields a rule of kind [`RuleKind::Unrecognized`]
    /// and is recorded in [`RuleParser::skipped`].
    pub fn parse_rule(&mut self, value: &Value, path: &str) -> Result<Rule, LoadError> {
        if self.depth >= MAX_RULE_DEPTH {
            return Err(LoadError::RuleTooDeep {
                path: path.to_string(),
                limit: MAX_RULE_DEPTH,
            });
        }

        let fields = value.as_object().ok_or_else(|| {
            LoadError::InvalidDocument(format!("{}: rule must be a mapping", path))
        })?;
        let node = RuleNode { fields, path };

        let type_tag = node
            .str_field(&["type"])?
            .ok_or_else(|| LoadError::MissingRuleType {
                path: path.to_string(),
            })?;
        let id = node.str_field(&["id"])?.unwrap_or(path).to_string();
        let name = node.str_field(&["name"])?.map(str::to_string);

        if !self.rule_ids.insert(id.clone()) {
            return Err(LoadError::DuplicateRuleId(id));
        }

        let kind = match self.registry.get(type_tag) {
            Some(constructor) => {
                self.depth += 1;
                let kind = (constructor.as_ref())(&node, self);
                self.depth -= 1;
                kind?
            }
            None => {
                warn!(path = %path, type_tag = %type_tag, "Skipping rule with unknown type");
                self.skipped.push(SkippedRule {
                    path: path.to_string(),
                    type_tag: type_tag.to_string(),
                });
                RuleKind::Unrecognized {
                    type_tag: type_tag.to_string(),
                }
            }
        };

        Ok(Rule { id, name, kind })
    }

    /// Parse the child list of a composite node.
    ///
    /// Unrecognized children stay in place and never match, so they sink an
    /// AND and are inert under OR.
    pub fn parse_children(&mut self, node: &RuleNode<'_>) -> Result<Vec<Rule>, LoadError> {
        let items = match first_present(node.fields, &["rules", "children", "operands"]) {
            None | Some((_, Value::Null)) => return Ok(Vec::new()),
            Some((_, Value::Array(items))) => items,
            Some((key, other)) => {
                return Err(LoadError::invalid(node.path, key, other.to_string()))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| self.parse_rule(item, &format!("{}.{}", node.path, index)))
            .collect()
    }

    /// Claim an id for a rule built outside `parse_rule`
    pub(crate) fn claim_rule_id(&mut self, id: &str) -> Result<(), LoadError> {
        if self.rule_ids.insert(id.to_string()) {
            Ok(())
        } else {
            Err(LoadError::DuplicateRuleId(id.to_string()))
        }
    }

    /// Unrecognized nodes seen so far
    pub fn skipped(&self) -> &[SkippedRule] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedRule> {
        self.skipped
    }
}

fn keyword_rule(node: &RuleNode<'_>, _parser: &mut RuleParser<'_>) -> Result<RuleKind, LoadError> {
    let keywords = node.non_blank_list(&["keywords"])?;
    if keywords.is_empty() {
        return Err(LoadError::missing(node.path(), "keywords"));
    }
    let mode = node
        .parsed::<MatchMode>(&["match", "match_mode", "operator"])?
        .unwrap_or_default();
    Ok(RuleKind::Keyword(KeywordRule::new(keywords, mode)))
}

fn user_rule(node: &RuleNode<'_>, _parser: &mut RuleParser<'_>) -> Result<RuleKind, LoadError> {
    let mut ids = node.non_blank_list(&["ids", "user_ids"])?;
    let mut prefixes = node.non_blank_list(&["prefixes", "user_prefixes", "user_prefix"])?;

    // `users` holds prefixes when `prefix: true`
    let users = node.non_blank_list(&["users"])?;
    match node.get("prefix") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => ids.extend(users),
        Some(Value::Bool(true)) => prefixes.extend(users),
        Some(other) => return Err(LoadError::invalid(node.path(), "prefix", other.to_string())),
    }
    if ids.is_empty() && prefixes.is_empty() {
        return Err(LoadError::missing(node.path(), "ids"));
    }

    let mode = node
        .parsed::<MatchMode>(&["match", "match_mode", "operator"])?
        .unwrap_or_default();
    Ok(RuleKind::User(UserRule::new(ids, prefixes).with_mode(mode)))
}

fn composite_rule(node: &RuleNode<'_>, parser: &mut RuleParser<'_>) -> Result<RuleKind, LoadError> {
    let operator = node
        .parsed::<CompositeOperator>(&["operator"])?
        .ok_or_else(|| LoadError::missing(node.path(), "operator"))?;
    fixed_composite(node, parser, operator)
}

fn fixed_composite(
    node: &RuleNode<'_>,
    parser: &mut RuleParser<'_>,
    operator: CompositeOperator,
) -> Result<RuleKind, LoadError> {
    let children = parser.parse_children(node)?;
    Ok(RuleKind::Composite(CompositeRule::new(operator, children)))
}
