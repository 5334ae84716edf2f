use crate::config::SourceConfig;
use crate::error::ConfigError;
use crate::results::CandidateLink;
use regex::{Regex, RegexBuilder};

/// A single include/exclude rule
#[derive(Debug, Clone)]
pub enum Keyword {
    /// Case-insensitive substring (stored lowercased)
    Substring(String),
    /// Case-insensitive regular expression, written as `/pattern/` in config
    Pattern(Regex),
}

impl Keyword {
    /// Parse a configured keyword. `/.../` denotes a regex, anything else a substring.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('/') && trimmed.ends_with('/') {
            let pattern = &trimmed[1..trimmed.len() - 1];
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|error| ConfigError::InvalidPattern {
                    pattern: raw.to_string(),
                    error,
                })?;
            return Ok(Keyword::Pattern(regex));
        }
        Ok(Keyword::Substring(trimmed.to_lowercase()))
    }

    /// Match against an already-lowercased haystack
    fn matches(&self, haystack: &str) -> bool {
        match self {
            Keyword::Substring(needle) => !needle.is_empty() && haystack.contains(needle.as_str()),
            Keyword::Pattern(regex) => regex.is_match(haystack),
        }
    }
}

/// Compiled include/exclude keyword rules for one source.
///
/// A candidate passes when the include list is empty or one include keyword
/// matches, and no exclude keyword matches. Exclusions take precedence.
#[derive(Debug, Clone, Default)]
pub struct KeywordRules {
    include: Vec<Keyword>,
    exclude: Vec<Keyword>,
}

impl KeywordRules {
    /// Compile include and exclude lists
    pub fn compile(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: include.iter().map(|k| Keyword::parse(k)).collect::<Result<_, _>>()?,
            exclude: exclude.iter().map(|k| Keyword::parse(k)).collect::<Result<_, _>>()?,
        })
    }

    /// Compile the rules configured on a source
    pub fn for_source(source: &SourceConfig) -> Result<Self, ConfigError> {
        Self::compile(&source.include_keywords, &source.exclude_keywords)
    }

    /// Determine if a candidate is admitted by these rules
    pub fn passes(&self, candidate: &CandidateLink) -> bool {
        let haystack = haystack(candidate);

        // Exclusions take precedence
        if self.exclude.iter().any(|k| k.matches(&haystack)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|k| k.matches(&haystack))
    }
}

/// Lowercased text a candidate's keywords are matched against.
/// The URL is not part of it; URL rejection is the job of [`UrlFilter`].
fn haystack(candidate: &CandidateLink) -> String {
    format!("{} {}", candidate.anchor_text, candidate.context).to_lowercase()
}

/// Regex patterns for URLs that are never worth reporting (portal navigation etc.)
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a new URL filter from exclude patterns (matched case-insensitively)
    pub fn new(exclude_patterns: &[String]) -> Result<Self, ConfigError> {
        let mut exclude_regexes = Vec::with_capacity(exclude_patterns.len());
        for pattern in exclude_patterns {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|error| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    error,
                })?;
            exclude_regexes.push(regex);
        }
        Ok(Self { exclude_regexes })
    }

    /// Determine if a URL should be dropped
    pub fn should_skip(&self, url: &str) -> bool {
        self.exclude_regexes.iter().any(|regex| regex.is_match(url))
    }
}

/// Global trade words that drop a link when they appear as whole words in its title
#[derive(Debug, Clone, Default)]
pub struct DropWords {
    regex: Option<Regex>,
}

impl DropWords {
    pub fn new(words: &[String]) -> Result<Self, ConfigError> {
        let alternatives: Vec<String> = words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { regex: None });
        }
        let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|error| ConfigError::InvalidPattern { pattern, error })?;
        Ok(Self { regex: Some(regex) })
    }

    pub fn matches(&self, title: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(title))
    }
}

/// The complete deterministic filter applied to one source's candidates
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    rules: KeywordRules,
    drop_words: DropWords,
    url_filter: UrlFilter,
}

impl KeywordFilter {
    /// Build the filter for a source from its rules plus the global drop lists
    pub fn new(
        source: &SourceConfig,
        drop_keywords: &[String],
        skip_url_patterns: &[String],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            rules: KeywordRules::for_source(source)?,
            drop_words: DropWords::new(drop_keywords)?,
            url_filter: UrlFilter::new(skip_url_patterns)?,
        })
    }

    /// Determine if a candidate passes every deterministic rule. Pure.
    pub fn passes(&self, candidate: &CandidateLink) -> bool {
        if !self.rules.passes(candidate) {
            return false;
        }
        if self.drop_words.matches(&candidate.anchor_text) {
            ::log::debug!("Dropped by trade word: {}", candidate.anchor_text);
            return false;
        }
        if self.url_filter.should_skip(&candidate.url) {
            ::log::debug!("Dropped navigation link: {}", candidate.url);
            return false;
        }
        true
    }
}

/// Evaluate a source's keyword rules against a candidate.
///
/// Compiles the rules on every call; an invalid pattern rejects the candidate.
/// Prefer building a [`KeywordFilter`] once per source.
pub fn passes(candidate: &CandidateLink, source: &SourceConfig) -> bool {
    KeywordRules::for_source(source).is_ok_and(|rules| rules.passes(candidate))
}
