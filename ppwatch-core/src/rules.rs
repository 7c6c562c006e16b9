//! Channel-matching rules.
//!
//! Decides, for each incoming podping URL, which IRC channels should be
//! notified. Each channel carries a list of rules; a rule is a pattern
//! plus a match kind:
//!
//! - `exact` — full-string equality after URL normalization
//! - `wildcard` — glob-style `*` patterns, e.g. `https://example.com/*`
//! - `regex` — a regular expression, matched case-insensitively
//!
//! All matching runs against the normalized form of the incoming URL
//! (see [`normalize_url`]); exact and wildcard patterns are normalized /
//! lowercased at compile time so rule authors need not care about case
//! or scheme spelling.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::utils::url::normalize_url;

/// Errors that can occur while compiling rules.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The pattern does not compile to a valid regular expression.
    #[error("invalid {kind} pattern `{pattern}`: {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// How a rule pattern is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[default]
    Exact,
    Wildcard,
    Regex,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Wildcard => write!(f, "wildcard"),
            MatchKind::Regex => write!(f, "regex"),
        }
    }
}

/// A single rule as written in the configuration file.
///
/// JSON shape: `{"pattern": "https://example.com/feed.xml", "type": "exact"}`;
/// `type` defaults to `exact`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    #[serde(rename = "type", default)]
    pub kind: MatchKind,
}

impl RuleSpec {
    /// Convenience constructor for an exact-match rule.
    pub fn exact(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            kind: MatchKind::Exact,
        }
    }
}

/// A compiled rule, ready for matching.
#[derive(Debug, Clone)]
pub struct ChannelRule {
    spec: RuleSpec,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl ChannelRule {
    /// Compile a rule spec. Wildcard and regex patterns may fail.
    pub fn compile(spec: RuleSpec) -> Result<Self, RuleError> {
        let matcher = match spec.kind {
            MatchKind::Exact => Matcher::Exact(normalize_url(&spec.pattern)),
            // Wildcard patterns go through the same normalization as
            // incoming URLs, so `http://` spellings still match.
            MatchKind::Wildcard => Matcher::Pattern(compile_pattern(
                &wildcard_to_regex(&normalize_url(&spec.pattern)),
                "wildcard",
                &spec.pattern,
            )?),
            MatchKind::Regex => {
                Matcher::Pattern(compile_pattern(&spec.pattern, "regex", &spec.pattern)?)
            }
        };
        Ok(Self { spec, matcher })
    }

    /// Match against an already-normalized URL.
    fn is_match(&self, normalized_url: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(pattern) => pattern == normalized_url,
            Matcher::Pattern(regex) => regex.is_match(normalized_url),
        }
    }

    /// The pattern exactly as configured.
    pub fn pattern(&self) -> &str {
        &self.spec.pattern
    }

    /// The rule's match kind.
    pub fn kind(&self) -> MatchKind {
        self.spec.kind
    }
}

fn compile_pattern(source: &str, kind: &'static str, original: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|source| RuleError::InvalidPattern {
            kind,
            pattern: original.to_string(),
            source,
        })
}

/// Translate a glob pattern to an anchored regex: `*` matches any run of
/// characters, everything else is literal.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for (i, part) in pattern.split('*').enumerate() {
        if i > 0 {
            out.push_str(".*");
        }
        out.push_str(&regex::escape(part));
    }
    out.push('$');
    out
}

/// The full channel → rules mapping.
///
/// Stored as a `Vec` because the number of channels is small, making
/// linear scans faster than hash lookups. Channel names compare
/// case-insensitively, as IRC does.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    entries: Vec<(String, Vec<ChannelRule>)>,
}

impl RuleSet {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a configuration-level filter map into a rule set.
    pub fn compile(filters: &BTreeMap<String, Vec<RuleSpec>>) -> Result<Self, RuleError> {
        let mut set = Self::new();
        for (channel, specs) in filters {
            for spec in specs {
                set.subscribe(channel, spec.clone())?;
            }
        }
        Ok(set)
    }

    /// Every channel whose rules match `url`.
    ///
    /// The URL is normalized once; channels are returned in configuration
    /// order with their stored capitalization.
    pub fn matches(&self, url: &str) -> Vec<&str> {
        let normalized = normalize_url(url);
        self.entries
            .iter()
            .filter(|(_, rules)| rules.iter().any(|rule| rule.is_match(&normalized)))
            .map(|(channel, _)| channel.as_str())
            .collect()
    }

    /// Add a rule for a channel.
    ///
    /// Returns `Ok(false)` when an identical rule (pattern and kind) is
    /// already present.
    pub fn subscribe(&mut self, channel: &str, spec: RuleSpec) -> Result<bool, RuleError> {
        let rule = ChannelRule::compile(spec)?;
        match self.entry_mut(channel) {
            Some(rules) => {
                if rules.iter().any(|existing| existing.spec == rule.spec) {
                    return Ok(false);
                }
                rules.push(rule);
            }
            None => self.entries.push((channel.to_string(), vec![rule])),
        }
        Ok(true)
    }

    /// Remove every rule with the given pattern from a channel.
    ///
    /// Returns whether anything was removed; a channel left without rules
    /// is dropped entirely.
    pub fn unsubscribe(&mut self, channel: &str, pattern: &str) -> bool {
        let Some(rules) = self.entry_mut(channel) else {
            return false;
        };
        let before = rules.len();
        rules.retain(|rule| rule.pattern() != pattern);
        let removed = rules.len() != before;
        self.entries.retain(|(_, rules)| !rules.is_empty());
        removed
    }

    /// The rules configured for one channel.
    pub fn rules_for(&self, channel: &str) -> Option<&[ChannelRule]> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(channel))
            .map(|(_, rules)| rules.as_slice())
    }

    /// All configured channel names.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(channel, _)| channel.as_str())
    }

    /// Iterate over `(channel, rules)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ChannelRule])> {
        self.entries
            .iter()
            .map(|(channel, rules)| (channel.as_str(), rules.as_slice()))
    }

    /// Number of configured channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no channel has any rule.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, channel: &str) -> Option<&mut Vec<ChannelRule>> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(channel))
            .map(|(_, rules)| rules)
    }
}
