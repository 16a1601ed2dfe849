/// Identifier extraction from file names.
///
/// A sortable file embeds a structured code such as `09-014-1234-56-789`
/// somewhere in its name. This module turns a file name into the canonical
/// identifier string used as the destination folder name, or reports that the
/// name carries no identifier at all.
///
/// Two rules exist. The strict rule (the default) requires five all-digit
/// segments `DD-DDD-DDDD-DD-DDD` and simply drops the hyphens. The legacy rule
/// accepts an alphanumeric third segment of any length and re-inserts a `0`
/// in front of it. Which one applies is chosen through [`IdentifierRule`], so
/// the dispatcher never needs to know.
///
/// # Examples
///
/// ```
/// use file_sorter::identifier::extract_identifier;
///
/// assert_eq!(
///     extract_identifier("09-014-1234-56-789_RandomText.pdf"),
///     Some("09014123456789".to_string())
/// );
/// assert_eq!(extract_identifier("file without identifier.pdf"), None);
/// ```
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::config::ConfigError;

static STRICT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}-\d{3}-\d{4}-\d{2}-\d{3}").expect("strict identifier pattern is valid")
});

static LEGACY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\d{2}-\d{3}-[A-Z0-9]+-\d{2}-\d{3}")
        .case_insensitive(true)
        .build()
        .expect("legacy identifier pattern is valid")
});

/// Something that can derive an identifier from a file name.
///
/// Returns `None` when the name does not carry an identifier; such files are
/// never sorted.
pub trait IdentifierMatcher {
    fn extract(&self, file_name: &str) -> Option<String>;
}

/// Canonical rule: `DD-DDD-DDDD-DD-DDD`, hyphens removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictMatcher;

impl IdentifierMatcher for StrictMatcher {
    fn extract(&self, file_name: &str) -> Option<String> {
        let cleaned = normalize_file_name(file_name, false);
        STRICT_PATTERN
            .find(&cleaned)
            .map(|m| strip_hyphens(m.as_str()))
    }
}

/// Earlier rule: alphanumeric third segment, reassembled with a `0` before it.
///
/// `09-014-0-AA01-10-001 other text.pdf` becomes `090140AA0110001`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyMatcher;

impl IdentifierMatcher for LegacyMatcher {
    fn extract(&self, file_name: &str) -> Option<String> {
        let cleaned = normalize_file_name(file_name, true);
        let found = LEGACY_PATTERN.find(cleaned.trim())?;

        let parts: Vec<&str> = found.as_str().split('-').collect();
        match parts.as_slice() {
            [p1, p2, p3, p4, p5] => Some(format!("{p1}{p2}0{p3}{p4}{p5}")),
            _ => None,
        }
    }
}

/// User-supplied pattern; the first match with hyphens removed is the identifier.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Compiles `pattern` into a matcher.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRegexPattern` if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex })
    }
}

impl IdentifierMatcher for PatternMatcher {
    fn extract(&self, file_name: &str) -> Option<String> {
        let cleaned = normalize_file_name(file_name, false);
        self.regex
            .find(&cleaned)
            .map(|m| strip_hyphens(m.as_str()))
            .filter(|id| !id.is_empty())
    }
}

/// Selects which matcher a batch uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "lowercase")]
pub enum IdentifierRule {
    /// Five all-digit segments.
    #[default]
    Strict,
    /// Alphanumeric third segment with a re-inserted `0`.
    Legacy,
    /// A custom regular expression.
    Custom { pattern: String },
}

impl IdentifierRule {
    /// Builds the matcher for this rule.
    ///
    /// # Errors
    ///
    /// Fails only for `Custom` rules whose pattern is empty or invalid.
    pub fn compile(&self) -> Result<Box<dyn IdentifierMatcher + Send + Sync>, ConfigError> {
        match self {
            IdentifierRule::Strict => Ok(Box::new(StrictMatcher)),
            IdentifierRule::Legacy => Ok(Box::new(LegacyMatcher)),
            IdentifierRule::Custom { pattern } => {
                if pattern.trim().is_empty() {
                    return Err(ConfigError::ConfigInvalid(
                        "custom identifier rule requires a non-empty pattern".to_string(),
                    ));
                }
                Ok(Box::new(PatternMatcher::new(pattern)?))
            }
        }
    }

    /// Short name used in messages and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            IdentifierRule::Strict => "strict",
            IdentifierRule::Legacy => "legacy",
            IdentifierRule::Custom { .. } => "custom",
        }
    }
}

/// Extracts the canonical identifier from `file_name` using the strict rule.
pub fn extract_identifier(file_name: &str) -> Option<String> {
    StrictMatcher.extract(file_name)
}

/// Drops everything outside `[A-Za-z0-9_\s-]` (plus `.` when `keep_dots`),
/// then collapses the first `-0-` into `-`.
fn normalize_file_name(file_name: &str, keep_dots: bool) -> String {
    let kept: String = file_name
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || *c == '_'
                || *c == '-'
                || c.is_whitespace()
                || (keep_dots && *c == '.')
        })
        .collect();

    kept.replacen("-0-", "-", 1)
}

fn strip_hyphens(matched: &str) -> String {
    matched.chars().filter(|c| *c != '-').collect()
}
