//! WIS2 topic hierarchy validation.
//!
//! A [`TopicHierarchyDefinition`] is an ordered list of [`Level`]s, each
//! holding the tokens permitted at that depth. A candidate topic is split on
//! its delimiter (`/`, or `.` when the topic has no slash) and matched level
//! by level.
//!
//! - Strict validation requires one accepted token per level: a short topic
//!   reports `MISSING-LEVEL`, a long one `EXTRA-LEVEL`, a token outside the
//!   permitted set `UNKNOWN-TOKEN`.
//! - Fuzzy validation reports the longest matching prefix and the tokens that
//!   may follow it. The result is valid whenever that prefix is aligned to the
//!   definition, even when it is empty; `complete` tells whether every token
//!   matched. With [`Anchor::Root`] the prefix must start at level 0; with
//!   [`Anchor::Floating`] it may start at any level (longest run wins, ties go
//!   to the shallowest start).
//!
//! A level may narrow its tokens by what precedes them. Scope keys are a
//! `/`-joined run of preceding tokens (a full path from level 0, or just the
//! parent token); a key applies when it and the tokens matched so far end
//! alike, so a topic validated from an inner level still picks up the scope.
//!
//! ```
//! use wcmp_conformance::topics::{Level, TopicHierarchyDefinition, TopicValidator};
//!
//! let definition = TopicHierarchyDefinition::new(vec![
//!     Level::new("channel", ["origin", "cache"]),
//!     Level::new("version", ["a"]),
//!     Level::new("system", ["wis2"]),
//! ]);
//! let validator = TopicValidator::new(&definition);
//! assert!(validator.validate("origin/a/wis2", false).valid);
//! assert!(!validator.validate("origin/a", false).valid);
//! assert!(validator.validate("origin/a", true).complete);
//!
//! // Level order matters: a root-anchored definition matches nothing here.
//! let diverging = validator.validate("wis2", true);
//! assert!(diverging.valid);
//! assert!(!diverging.complete);
//! assert_eq!(diverging.matched, 0);
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Names given to the levels of a hierarchy derived from a flat topic list.
const WIS2_LEVEL_NAMES: &[&str] = &[
    "channel",
    "version",
    "system",
    "centre-id",
    "notification-type",
    "data-policy",
    "earth-system-discipline",
];

/// Where fuzzy matches may start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    /// Topics align to the first level.
    #[default]
    Root,
    /// Fuzzy matches may begin at any level.
    Floating,
}

/// One level of the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Level name (e.g. `"centre-id"`).
    pub name: String,
    /// Tokens permitted at this level.
    #[serde(default)]
    pub tokens: BTreeSet<String>,
    /// Whether any non-empty token is accepted as a placeholder value.
    #[serde(default)]
    pub wildcard: bool,
    /// Permitted tokens narrowed by the preceding tokens, keyed by a
    /// `/`-joined path (or the parent token alone).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scoped: BTreeMap<String, BTreeSet<String>>,
}

impl Level {
    /// A level accepting exactly `tokens`.
    pub fn new<I, S>(name: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            tokens: tokens.into_iter().map(Into::into).collect(),
            wildcard: false,
            scoped: BTreeMap::new(),
        }
    }

    /// A placeholder level accepting any non-empty token.
    pub fn wildcard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wildcard: true,
            ..Self::default()
        }
    }

    /// Restricts the tokens permitted after `parent` (a token or a
    /// `/`-joined path of tokens).
    #[must_use]
    pub fn scoped<I, S>(mut self, parent: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scoped
            .entry(parent.into())
            .or_default()
            .extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Tokens permitted at this level after the matched tokens `prefix`.
    /// Every scope aligned with `prefix` contributes; without one the
    /// level's full token set applies.
    #[must_use]
    pub fn permitted(&self, prefix: &[&str]) -> Cow<'_, BTreeSet<String>> {
        if prefix.is_empty() {
            return Cow::Borrowed(&self.tokens);
        }
        let mut scopes = self
            .scoped
            .iter()
            .filter(|(key, _)| aligned(key, prefix))
            .map(|(_, tokens)| tokens);

        let Some(first) = scopes.next() else {
            return Cow::Borrowed(&self.tokens);
        };
        match scopes.next() {
            None => Cow::Borrowed(first),
            Some(second) => {
                let mut union = first.clone();
                union.extend(second.iter().cloned());
                for tokens in scopes {
                    union.extend(tokens.iter().cloned());
                }
                Cow::Owned(union)
            }
        }
    }

    fn judge(&self, token: &str, prefix: &[&str]) -> LevelStatus {
        if token.is_empty() {
            LevelStatus::UnknownToken
        } else if self.permitted(prefix).contains(token) {
            LevelStatus::Match
        } else if self.wildcard {
            LevelStatus::WildcardAccepted
        } else {
            LevelStatus::UnknownToken
        }
    }
}

/// Whether the scope `key` and `prefix` end with the same tokens.
fn aligned(key: &str, prefix: &[&str]) -> bool {
    key.split('/')
        .rev()
        .zip(prefix.iter().rev())
        .all(|(a, b)| a == *b)
}

/// Ordered levels of a topic hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicHierarchyDefinition {
    /// Fuzzy anchoring policy.
    #[serde(default)]
    pub anchor: Anchor,
    /// Levels, shallowest first.
    pub levels: Vec<Level>,
}

impl TopicHierarchyDefinition {
    /// A root-anchored definition.
    #[must_use]
    pub fn new(levels: Vec<Level>) -> Self {
        Self {
            anchor: Anchor::Root,
            levels,
        }
    }

    /// Replaces the anchoring policy.
    #[must_use]
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Number of levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Derives levels from a flat list of topic paths (`origin`,
    /// `origin/a`, `origin/a/wis2`, ...). Each token is permitted at its
    /// depth and scoped under the full path that precedes it, so equally
    /// named tokens in different subtrees keep their own children.
    pub fn from_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut levels: Vec<Level> = Vec::new();

        for topic in topics {
            let tokens = tokenize(topic.as_ref());
            for (depth, token) in tokens.iter().enumerate() {
                if token.is_empty() {
                    break;
                }
                if levels.len() <= depth {
                    let name = WIS2_LEVEL_NAMES
                        .get(depth)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| format!("level-{depth}"));
                    levels.push(Level::new(name, Vec::<String>::new()));
                }
                let level = &mut levels[depth];
                level.tokens.insert(token.to_string());
                if depth > 0 {
                    level
                        .scoped
                        .entry(tokens[..depth].join("/"))
                        .or_default()
                        .insert(token.to_string());
                }
            }
        }

        Self::new(levels)
    }
}

/// Result of matching one token against one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum LevelStatus {
    /// Token is in the level's permitted set.
    Match,
    /// Token accepted by a wildcard level.
    WildcardAccepted,
    /// Token not permitted at this level.
    UnknownToken,
    /// The topic ends before this level.
    MissingLevel,
    /// The topic continues past the deepest level.
    ExtraLevel,
}

impl LevelStatus {
    /// Whether the level was satisfied.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        matches!(self, LevelStatus::Match | LevelStatus::WildcardAccepted)
    }
}

/// Per-level outcome of a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelOutcome {
    /// Level index in the definition (may exceed the depth for extra tokens).
    pub level: usize,
    /// Level name, `None` past the deepest level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Token found in the topic, `None` for missing levels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Outcome.
    pub status: LevelStatus,
}

/// Outcome of validating one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicValidationResult {
    /// Topic as supplied.
    pub topic: String,
    /// Whether fuzzy matching was requested.
    pub fuzzy: bool,
    /// Overall validity. Strict: every level matched. Fuzzy: always true,
    /// as the longest aligned prefix (possibly empty) is a valid partial match.
    pub valid: bool,
    /// Whether every token of a non-empty topic was accepted.
    pub complete: bool,
    /// Level at which matching started.
    pub start_level: usize,
    /// Number of leading tokens accepted.
    pub matched: usize,
    /// The accepted prefix, `/`-delimited.
    pub matched_prefix: String,
    /// Level-by-level outcomes.
    pub levels: Vec<LevelOutcome>,
    /// Tokens permitted at the first unmatched level.
    pub next_tokens: BTreeSet<String>,
}

/// Splits a topic into tokens. A trailing delimiter is ignored; the
/// delimiter is `/` when present and `.` otherwise.
#[must_use]
pub fn tokenize(topic: &str) -> Vec<&str> {
    let topic = topic.trim();
    let delimiter = if topic.contains('/') { '/' } else { '.' };
    let topic = topic.strip_suffix(delimiter).unwrap_or(topic);
    if topic.is_empty() {
        return Vec::new();
    }
    topic.split(delimiter).collect()
}

/// Validates topics against a definition.
#[derive(Debug, Clone, Copy)]
pub struct TopicValidator<'a> {
    definition: &'a TopicHierarchyDefinition,
}

impl<'a> TopicValidator<'a> {
    /// Creates a validator over `definition`.
    #[must_use]
    pub fn new(definition: &'a TopicHierarchyDefinition) -> Self {
        Self { definition }
    }

    /// The underlying definition.
    #[must_use]
    pub fn definition(&self) -> &'a TopicHierarchyDefinition {
        self.definition
    }

    /// Validates `topic` strictly (every level, in order) or fuzzily
    /// (longest matching prefix, honouring the definition's anchor).
    #[must_use]
    pub fn validate(&self, topic: &str, fuzzy: bool) -> TopicValidationResult {
        debug!(topic, fuzzy, "validating topic");
        let tokens = tokenize(topic);
        if !fuzzy {
            return self.strict(topic, &tokens, 0);
        }
        match self.definition.anchor {
            Anchor::Root => self.fuzzy(topic, &tokens, 0),
            Anchor::Floating => {
                let mut best = (0, self.prefix_len(&tokens, 0));
                for start in 1..self.definition.depth() {
                    let matched = self.prefix_len(&tokens, start);
                    if matched > best.1 {
                        best = (start, matched);
                    }
                }
                self.fuzzy(topic, &tokens, best.0)
            }
        }
    }

    /// Validates `topic` against the levels from `start_level` downwards
    /// (e.g. a dataset topic that omits the channel/version/system levels).
    #[must_use]
    pub fn validate_from(&self, start_level: usize, topic: &str, fuzzy: bool) -> TopicValidationResult {
        let tokens = tokenize(topic);
        if fuzzy {
            self.fuzzy(topic, &tokens, start_level)
        } else {
            self.strict(topic, &tokens, start_level)
        }
    }

    /// Tokens permitted directly below `prefix`. Empty when the prefix does
    /// not resolve or already reaches the deepest level. An empty prefix
    /// lists the first level.
    #[must_use]
    pub fn list_children(&self, prefix: &str) -> BTreeSet<String> {
        let tokens = tokenize(prefix);
        let starts: Vec<usize> = match self.definition.anchor {
            Anchor::Root => vec![0],
            Anchor::Floating => (0..self.definition.depth().max(1)).collect(),
        };

        for start in starts {
            if self.prefix_len(&tokens, start) == tokens.len() {
                return self.next_tokens(&tokens, start, tokens.len());
            }
        }

        debug!(prefix, "prefix does not resolve to a topic");
        BTreeSet::new()
    }

    /// Number of leading tokens accepted when matching from `start`.
    fn prefix_len(&self, tokens: &[&str], start: usize) -> usize {
        for (i, token) in tokens.iter().enumerate() {
            let Some(level) = self.definition.levels.get(start + i) else {
                return i;
            };
            if !level.judge(token, &tokens[..i]).is_accepted() {
                return i;
            }
        }
        tokens.len()
    }

    fn next_tokens(&self, tokens: &[&str], start: usize, matched: usize) -> BTreeSet<String> {
        self.definition
            .levels
            .get(start + matched)
            .map(|level| level.permitted(&tokens[..matched]).into_owned())
            .unwrap_or_default()
    }

    fn outcome(&self, level: usize, token: Option<&str>, status: LevelStatus) -> LevelOutcome {
        LevelOutcome {
            level,
            name: self.definition.levels.get(level).map(|l| l.name.clone()),
            token: token.map(str::to_string),
            status,
        }
    }

    fn strict(&self, topic: &str, tokens: &[&str], start: usize) -> TopicValidationResult {
        let span = self.definition.depth().saturating_sub(start);
        let mut levels = Vec::new();
        // scopes restart after a rejected token
        let mut scope_start = 0;

        for i in 0..tokens.len().max(span) {
            let index = start + i;
            let token = tokens.get(i).copied();
            let status = match (self.definition.levels.get(index), token) {
                (Some(level), Some(token)) => level.judge(token, &tokens[scope_start..i]),
                (Some(_), None) => LevelStatus::MissingLevel,
                (None, Some(_)) => LevelStatus::ExtraLevel,
                (None, None) => break,
            };
            if !status.is_accepted() {
                scope_start = (i + 1).min(tokens.len());
            }
            levels.push(self.outcome(index, token, status));
        }

        let matched = self.prefix_len(tokens, start);
        let valid = !tokens.is_empty() && levels.iter().all(|l| l.status.is_accepted());

        TopicValidationResult {
            topic: topic.to_string(),
            fuzzy: false,
            valid,
            complete: !tokens.is_empty() && matched == tokens.len(),
            start_level: start,
            matched,
            matched_prefix: tokens[..matched].join("/"),
            next_tokens: self.next_tokens(tokens, start, matched),
            levels,
        }
    }

    fn fuzzy(&self, topic: &str, tokens: &[&str], start: usize) -> TopicValidationResult {
        let matched = self.prefix_len(tokens, start);
        let mut levels = Vec::with_capacity(matched + 1);

        for (i, token) in tokens[..matched].iter().enumerate() {
            let status = self.definition.levels[start + i].judge(token, &tokens[..i]);
            levels.push(self.outcome(start + i, Some(token), status));
        }

        if let Some(token) = tokens.get(matched) {
            let index = start + matched;
            let status = if index >= self.definition.depth() {
                LevelStatus::ExtraLevel
            } else {
                LevelStatus::UnknownToken
            };
            levels.push(self.outcome(index, Some(token), status));
        }

        TopicValidationResult {
            topic: topic.to_string(),
            fuzzy: true,
            valid: true,
            complete: !tokens.is_empty() && matched == tokens.len(),
            start_level: start,
            matched,
            matched_prefix: tokens[..matched].join("/"),
            next_tokens: self.next_tokens(tokens, start, matched),
            levels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> TopicHierarchyDefinition {
        TopicHierarchyDefinition::new(vec![
            Level::new("channel", ["origin"]),
            Level::new("version", ["a"]),
            Level::new("system", ["wis2"]),
            Level::new("country", ["can", "fra", "jpn"]),
        ])
    }

    fn statuses(result: &TopicValidationResult) -> Vec<LevelStatus> {
        result.levels.iter().map(|l| l.status).collect()
    }

    #[test]
    fn dotted_topic_matches_every_level() {
        let definition = definition();
        let result = TopicValidator::new(&definition).validate("origin.a.wis2.can", false);
        assert!(result.valid);
        assert_eq!(statuses(&result), vec![LevelStatus::Match; 4]);
        assert_eq!(result.matched, 4);
        assert_eq!(result.matched_prefix, "origin/a/wis2/can");
        assert!(result.next_tokens.is_empty());
    }

    #[test]
    fn strict_reports_missing_extra_and_unknown_levels() {
        let definition = definition();
        let validator = TopicValidator::new(&definition);

        let short = validator.validate("origin/a", false);
        assert!(!short.valid);
        assert_eq!(
            statuses(&short),
            vec![
                LevelStatus::Match,
                LevelStatus::Match,
                LevelStatus::MissingLevel,
                LevelStatus::MissingLevel
            ]
        );

        let long = validator.validate("origin/a/wis2/can/extra", false);
        assert!(!long.valid);
        assert_eq!(long.levels[4].status, LevelStatus::ExtraLevel);
        assert_eq!(long.levels[4].name, None);

        let unknown = validator.validate("origin/b/wis2/can", false);
        assert!(!unknown.valid);
        assert_eq!(unknown.levels[1].status, LevelStatus::UnknownToken);
        assert_eq!(unknown.levels[2].status, LevelStatus::Match);
        assert_eq!(unknown.matched, 1);
        assert_eq!(unknown.next_tokens, BTreeSet::from(["a".to_string()]));
    }

    #[test]
    fn trailing_delimiter_and_empty_topic() {
        let definition = definition();
        let validator = TopicValidator::new(&definition);
        assert!(validator.validate("origin/a/wis2/can/", false).valid);

        let empty = validator.validate("", false);
        assert!(!empty.valid);
        assert_eq!(statuses(&empty), vec![LevelStatus::MissingLevel; 4]);

        let fuzzy = validator.validate("", true);
        assert!(fuzzy.valid);
        assert!(!fuzzy.complete);
        assert_eq!(fuzzy.next_tokens, BTreeSet::from(["origin".to_string()]));
    }

    #[test]
    fn fuzzy_root_anchor_is_level_order_sensitive() {
        let definition = definition();
        let result = TopicValidator::new(&definition).validate("wis2.can", true);
        assert!(result.valid);
        assert!(!result.complete);
        assert_eq!(result.start_level, 0);
        assert_eq!(result.matched, 0);
        assert_eq!(statuses(&result), vec![LevelStatus::UnknownToken]);
        assert_eq!(result.next_tokens, BTreeSet::from(["origin".to_string()]));
    }

    #[test]
    fn fuzzy_floating_anchor_finds_inner_run() {
        let definition = definition().with_anchor(Anchor::Floating);
        let result = TopicValidator::new(&definition).validate("wis2.can", true);
        assert!(result.valid);
        assert!(result.complete);
        assert_eq!(result.start_level, 2);
        assert_eq!(result.matched, 2);
        assert_eq!(statuses(&result), vec![LevelStatus::Match; 2]);

        // Strict mode ignores the anchor.
        assert!(!TopicValidator::new(&definition).validate("wis2.can", false).valid);
    }

    #[test]
    fn fuzzy_accepts_early_termination() {
        let definition = definition();
        let result = TopicValidator::new(&definition).validate("origin/a", true);
        assert!(result.valid);
        assert!(result.complete);
        assert_eq!(result.matched, 2);
        assert_eq!(result.next_tokens, BTreeSet::from(["wis2".to_string()]));

        let beyond = TopicValidator::new(&definition).validate("origin/a/wis2/can/x", true);
        assert!(beyond.valid);
        assert!(!beyond.complete);
        assert_eq!(beyond.matched, 4);
        assert_eq!(beyond.levels.last().map(|l| l.status), Some(LevelStatus::ExtraLevel));
    }

    #[test]
    fn wildcard_levels_accept_any_token() {
        let definition = TopicHierarchyDefinition::new(vec![
            Level::new("channel", ["origin"]),
            Level::wildcard("centre-id"),
            Level::new("type", ["data"]),
        ]);
        let validator = TopicValidator::new(&definition);
        let result = validator.validate("origin/ca-eccc-msc/data", false);
        assert!(result.valid);
        assert_eq!(result.levels[1].status, LevelStatus::WildcardAccepted);
        assert!(!validator.validate("origin//data", false).valid);
    }

    #[test]
    fn list_children_returns_next_level() {
        let definition = definition();
        let validator = TopicValidator::new(&definition);
        assert_eq!(
            validator.list_children("origin/a/wis2"),
            BTreeSet::from(["can".to_string(), "fra".to_string(), "jpn".to_string()])
        );
        assert!(validator.list_children("origin/a/wis2/can").is_empty());
        assert!(validator.list_children("origin/zz").is_empty());
        assert_eq!(
            validator.list_children(""),
            BTreeSet::from(["origin".to_string()])
        );
    }

    #[test]
    fn scoped_tokens_follow_their_parent() {
        let definition = TopicHierarchyDefinition::from_topics([
            "origin",
            "origin/a",
            "origin/a/wis2",
            "origin/a/wis2/can",
            "origin/a/wis2/can/eccc-msc",
            "origin/a/wis2/fra",
            "origin/a/wis2/fra/meteofrance",
        ]);
        assert_eq!(definition.depth(), 5);
        assert_eq!(definition.levels[3].name, "centre-id");

        let validator = TopicValidator::new(&definition);
        assert_eq!(
            validator.list_children("origin/a/wis2/can"),
            BTreeSet::from(["eccc-msc".to_string()])
        );
        assert!(validator.validate("origin/a/wis2/fra/meteofrance", false).valid);
        assert!(!validator.validate("origin/a/wis2/fra/eccc-msc", false).valid);
    }

    #[test]
    fn equally_named_tokens_keep_their_own_children() {
        let definition = TopicHierarchyDefinition::from_topics([
            "origin/a/wis2/can/eccc-msc/data/core",
            "origin/a/wis2/fra/meteofrance/data/recommended",
        ]);
        let validator = TopicValidator::new(&definition);

        assert_eq!(
            validator.list_children("origin/a/wis2/can/eccc-msc/data"),
            BTreeSet::from(["core".to_string()])
        );
        assert!(!validator
            .validate("origin/a/wis2/can/eccc-msc/data/recommended", false)
            .valid);

        // From an inner level, every subtree ending in the same tokens counts.
        let inner = validator.validate_from(5, "data", true);
        assert!(inner.complete);
        assert_eq!(
            inner.next_tokens,
            BTreeSet::from(["core".to_string(), "recommended".to_string()])
        );
    }

    #[test]
    fn parent_token_scopes_apply_after_any_path() {
        let definition = TopicHierarchyDefinition::new(vec![
            Level::new("channel", ["origin", "cache"]),
            Level::new("centre-id", ["eccc-msc", "dwd"]).scoped("cache", ["eccc-msc"]),
        ]);
        let validator = TopicValidator::new(&definition);
        assert!(validator.validate("origin/dwd", false).valid);
        assert!(!validator.validate("cache/dwd", false).valid);
        assert_eq!(
            validator.list_children("cache"),
            BTreeSet::from(["eccc-msc".to_string()])
        );
    }
}
