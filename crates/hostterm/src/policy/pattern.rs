//! Command patterns: literal prefixes and regexes with a rationale.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A rule used to classify a command string.
///
/// Literal patterns match the command itself or the command followed by a
/// space, so `"ls"` matches `"ls -la"` but not `"lsof"` or `"ls\nrm x"`. Regex patterns
/// match anywhere in the command and must anchor themselves with `^` when
/// they mean to match from the start.
///
/// Regex sources are compiled on first use. A source that fails to compile
/// makes the rule inert: it never matches. On a blocked list this fails open
/// for that one rule, so the failure is logged when it is first seen.
#[derive(Clone)]
pub struct CommandPattern {
    pattern: String,
    description: String,
    is_regex: bool,
    compiled: OnceLock<Option<Regex>>,
}

impl CommandPattern {
    /// Create a literal prefix pattern.
    pub fn literal(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(pattern, description, false)
    }

    /// Create a regex pattern. Never fails; see the type docs for how a
    /// malformed source behaves.
    pub fn regex(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(pattern, description, true)
    }

    fn new(pattern: impl Into<String>, description: impl Into<String>, is_regex: bool) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
            is_regex,
            compiled: OnceLock::new(),
        }
    }

    /// The literal text or regex source.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Human-readable rationale for the rule.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether [`pattern`](Self::pattern) is a regex source.
    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    /// Returns true if the regex source compiles. Always true for literals.
    pub fn is_valid(&self) -> bool {
        !self.is_regex || self.compiled_regex().is_some()
    }

    /// Check whether `command` matches this rule.
    pub fn matches(&self, command: &str) -> bool {
        if self.is_regex {
            return self
                .compiled_regex()
                .is_some_and(|re| re.is_match(command));
        }

        match command.strip_prefix(self.pattern.as_str()) {
            Some("") => true,
            Some(rest) => self.pattern.ends_with(' ') || rest.starts_with(' '),
            None => false,
        }
    }

    fn compiled_regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(&self.pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        error = %e,
                        "invalid command regex; rule will never match"
                    );
                    None
                }
            })
            .as_ref()
    }
}

impl fmt::Debug for CommandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPattern")
            .field("pattern", &self.pattern)
            .field("description", &self.description)
            .field("is_regex", &self.is_regex)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CommandPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.description == other.description
            && self.is_regex == other.is_regex
    }
}

impl Eq for CommandPattern {}

/// On-the-wire shape of a pattern, as it appears in config files.
#[derive(Serialize, Deserialize)]
struct PatternRepr {
    pattern: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_regex: bool,
}

impl Serialize for CommandPattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        PatternRepr {
            pattern: self.pattern.clone(),
            description: self.description.clone(),
            is_regex: self.is_regex,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CommandPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = PatternRepr::deserialize(deserializer)?;
        Ok(Self::new(repr.pattern, repr.description, repr.is_regex))
    }
}
