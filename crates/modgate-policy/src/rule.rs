//! Rule definitions and evaluation
//!
//! A rule is a boolean predicate over a submission's text and user id.
//! Rules form a tree: keyword and user rules are leaves, composite rules
//! combine children with AND/OR. Evaluation is pure and short-circuits.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Normalized view of a submission, built once per evaluation
#[derive(Debug, Clone)]
pub struct RuleInput<'a> {
    raw_text: &'a str,
    text: String,
    user_id: String,
}

impl<'a> RuleInput<'a> {
    pub fn new(text: &'a str, user_id: &'a str) -> Self {
        Self {
            raw_text: text,
            text: normalize(text),
            user_id: normalize(user_id),
        }
    }

    /// Case-folded text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case-folded user id
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Text exactly as submitted
    pub fn raw_text(&self) -> &str {
        self.raw_text
    }
}

pub(crate) fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// Evaluation hook for rule kinds registered outside this crate
pub trait RulePredicate: Send + Sync {
    /// Return true if the submission satisfies this predicate
    fn matches(&self, input: &RuleInput<'_>) -> bool;
}

/// A single node in a rule tree
#[derive(Debug, Clone)]
pub struct Rule {
    /// Identifier, unique within the loaded document
    pub id: String,

    /// Optional human label used in decision reasons
    pub name: Option<String>,

    /// What this rule checks
    pub kind: RuleKind,
}

/// The closed set of rule kinds
#[derive(Debug, Clone)]
pub enum RuleKind {
    Keyword(KeywordRule),
    User(UserRule),
    Composite(CompositeRule),
    /// Kind contributed through the rule registry
    Custom(CustomRule),
    /// Type tag this build does not understand; never matches
    Unrecognized { type_tag: String },
}

impl Rule {
    pub fn new(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Keyword leaf
    pub fn keyword<I, S>(id: impl Into<String>, keywords: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(id, RuleKind::Keyword(KeywordRule::new(keywords, mode)))
    }

    /// User leaf
    pub fn user<I, J, S, T>(id: impl Into<String>, ids: I, prefixes: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self::new(id, RuleKind::User(UserRule::new(ids, prefixes)))
    }

    /// Composite node
    pub fn composite(id: impl Into<String>, operator: CompositeOperator, children: Vec<Rule>) -> Self {
        Self::new(id, RuleKind::Composite(CompositeRule::new(operator, children)))
    }

    /// Name if present, id otherwise
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Tag this rule was declared with
    pub fn type_tag(&self) -> &str {
        match &self.kind {
            RuleKind::Keyword(_) => "keyword",
            RuleKind::User(_) => "user",
            RuleKind::Composite(_) => "composite",
            RuleKind::Custom(custom) => &custom.tag,
            RuleKind::Unrecognized { type_tag } => type_tag,
        }
    }

    /// Evaluate this rule against a submission
    pub fn matches(&self, input: &RuleInput<'_>) -> bool {
        self.find_match(input).is_some()
    }

    /// Evaluate and return the rule that decided the match.
    ///
    /// Leaves return themselves. OR returns the first satisfying child's
    /// leaf. AND returns the leaf of its first child, or itself when it has
    /// no children.
    pub fn find_match(&self, input: &RuleInput<'_>) -> Option<&Rule> {
        match &self.kind {
            RuleKind::Keyword(rule) => rule.matches(input.text()).then_some(self),
            RuleKind::User(rule) => rule.matches(input.user_id()).then_some(self),
            RuleKind::Custom(rule) => rule.predicate.matches(input).then_some(self),
            RuleKind::Composite(rule) => match rule.operator {
                CompositeOperator::And => {
                    let mut first = None;
                    for child in &rule.children {
                        let leaf = child.find_match(input)?;
                        first.get_or_insert(leaf);
                    }
                    Some(first.unwrap_or(self))
                }
                CompositeOperator::Or => rule
                    .children
                    .iter()
                    .find_map(|child| child.find_match(input)),
            },
            RuleKind::Unrecognized { .. } => None,
        }
    }

    /// Depth of the tree rooted here; a leaf has depth 1
    pub fn depth(&self) -> usize {
        match &self.kind {
            RuleKind::Composite(rule) => {
                1 + rule.children.iter().map(Rule::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }
}

/// How a keyword list combines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// At least one keyword occurs
    #[default]
    Any,
    /// Every keyword occurs
    All,
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "or" => Ok(MatchMode::Any),
            "all" | "and" => Ok(MatchMode::All),
            other => Err(format!("unknown match mode: {}", other)),
        }
    }
}

/// Case-insensitive substring match over a keyword list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    keywords: Vec<String>,
    mode: MatchMode,
}

impl KeywordRule {
    /// Empty keywords are dropped; they would match any text. Documents
    /// with blank keywords are rejected by the loader before reaching here.
    pub fn new<I, S>(keywords: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .filter(|k| !k.as_ref().is_empty())
                .map(|k| normalize(k.as_ref()))
                .collect(),
            mode,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// `text` must already be case-folded.
    ///
    /// An empty list never matches under ANY and always matches under ALL.
    pub fn matches(&self, text: &str) -> bool {
        match self.mode {
            MatchMode::Any => self.keywords.iter().any(|k| text.contains(k.as_str())),
            MatchMode::All => self.keywords.iter().all(|k| text.contains(k.as_str())),
        }
    }
}

/// Exact id or prefix match on the submitting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRule {
    ids: BTreeSet<String>,
    prefixes: Vec<String>,
    mode: MatchMode,
}

impl UserRule {
    pub fn new<I, J, S, T>(ids: I, prefixes: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut rule = Self {
            ids: ids
                .into_iter()
                .filter(|id| !id.as_ref().is_empty())
                .map(|id| normalize(id.as_ref()))
                .collect(),
            prefixes: Vec::new(),
            mode: MatchMode::Any,
        };
        for prefix in prefixes {
            let prefix = normalize(prefix.as_ref());
            if !prefix.is_empty() && !rule.prefixes.contains(&prefix) {
                rule.prefixes.push(prefix);
            }
        }
        rule
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Under ALL every listed id and prefix must fit the user
    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// `user_id` must already be case-folded
    pub fn matches(&self, user_id: &str) -> bool {
        match self.mode {
            MatchMode::Any => {
                self.ids.contains(user_id)
                    || self.prefixes.iter().any(|p| user_id.starts_with(p.as_str()))
            }
            MatchMode::All => {
                self.ids.iter().all(|id| id == user_id)
                    && self.prefixes.iter().all(|p| user_id.starts_with(p.as_str()))
            }
        }
    }
}

/// Operator joining composite children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOperator {
    And,
    Or,
}

impl std::str::FromStr for CompositeOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" | "ALL" => Ok(CompositeOperator::And),
            "OR" | "ANY" => Ok(CompositeOperator::Or),
            other => Err(format!("unknown composite operator: {}", other)),
        }
    }
}

impl fmt::Display for CompositeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeOperator::And => f.write_str("AND"),
            CompositeOperator::Or => f.write_str("OR"),
        }
    }
}

/// AND/OR over child rules.
///
/// AND over no children is true, OR over no children is false.
#[derive(Debug, Clone)]
pub struct CompositeRule {
    pub operator: CompositeOperator,
    pub children: Vec<Rule>,
}

impl CompositeRule {
    pub fn new(operator: CompositeOperator, children: Vec<Rule>) -> Self {
        Self { operator, children }
    }
}

/// Registry-provided rule kind
#[derive(Clone)]
pub struct CustomRule {
    pub tag: String,
    pub predicate: Arc<dyn RulePredicate>,
}

impl CustomRule {
    pub fn new(tag: impl Into<String>, predicate: Arc<dyn RulePredicate>) -> Self {
        Self {
            tag: tag.into(),
            predicate,
        }
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule").field("tag", &self.tag).finish_non_exhaustive()
    }
}
