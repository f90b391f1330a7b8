use std::fmt;

use regex::Regex;

/// A single include/exclude/whitelist pattern. Config strings wrapped in
/// slashes (`/…/`) are regular expressions; anything else matches as a
/// case-insensitive substring.
#[derive(Clone, Debug)]
pub enum Pattern {
    Substring(String),
    Regex(Regex),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternError {
    pattern: String,
    message: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pattern '{}': {}", self.pattern, self.message)
    }
}

impl std::error::Error for PatternError {}

/// An ordered set of patterns; an item matches the list when any pattern
/// matches it.
#[derive(Clone, Debug, Default)]
pub struct MatchList {
    patterns: Vec<Pattern>,
}

impl MatchList {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// Parses config entries: `/…/` becomes a regex, anything else a
    /// substring pattern.
    pub fn parse(entries: &[String]) -> Result<Self, PatternError> {
        let mut patterns = Vec::with_capacity(entries.len());
        for entry in entries {
            patterns.push(parse_pattern(entry)?);
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn extend(&mut self, other: MatchList) {
        self.patterns.extend(other.patterns);
    }

    pub fn matches(&self, item: &str) -> bool {
        let item = item.to_lowercase();
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Substring(text) => item.contains(text.as_str()),
            Pattern::Regex(regex) => regex.is_match(&item),
        })
    }
}

fn parse_pattern(entry: &str) -> Result<Pattern, PatternError> {
    if entry.len() > 1 && entry.starts_with('/') && entry.ends_with('/') {
        let body = &entry[1..entry.len() - 1];
        let regex = Regex::new(body).map_err(|err| PatternError {
            pattern: entry.to_string(),
            message: err.to_string(),
        })?;
        return Ok(Pattern::Regex(regex));
    }
    Ok(Pattern::Substring(entry.to_lowercase()))
}
