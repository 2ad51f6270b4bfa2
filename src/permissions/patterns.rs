//! Regex filters on repository names

use crate::error::ConfigError;
use regex::Regex;
use tracing::trace;

/// A list of compiled regexes
#[derive(Debug, Default)]
pub struct PatternMatcher {
    patterns: Vec<CompiledPattern>,
}

#[derive(Debug)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let compiled = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(|regex| CompiledPattern {
                        source: pattern.clone(),
                        regex,
                    })
                    .map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns: compiled })
    }

    /// The first pattern matching `name`
    pub fn find_match(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(name))
            .map(|p| p.source.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Include/exclude rules for repositories.
///
/// An empty include list admits everything; exclude wins over include.
#[derive(Debug, Default)]
pub struct RepositoryFilter {
    include: PatternMatcher,
    exclude: PatternMatcher,
}

impl RepositoryFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: PatternMatcher::new(include)?,
            exclude: PatternMatcher::new(exclude)?,
        })
    }

    pub fn admits(&self, name: &str) -> bool {
        if let Some(pattern) = self.exclude.find_match(name) {
            trace!(name, pattern, "Excluded by pattern");
            return false;
        }
        self.include.is_empty() || self.include.find_match(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_admits_all() {
        let filter = RepositoryFilter::default();
        assert!(filter.admits("anything"));
    }

    #[test]
    fn test_include_only() {
        let filter = RepositoryFilter::new(&patterns(&["^svc-"]), &[]).unwrap();
        assert!(filter.admits("svc-billing"));
        assert!(!filter.admits("web"));
    }

    #[test]
    fn test_exclude_wins() {
        let filter =
            RepositoryFilter::new(&patterns(&["^svc-"]), &patterns(&["-archive$"])).unwrap();
        assert!(filter.admits("svc-billing"));
        assert!(!filter.admits("svc-billing-archive"));
    }

    #[test]
    fn test_find_match_reports_pattern() {
        let matcher = PatternMatcher::new(&patterns(&["^a", "^b"])).unwrap();
        assert_eq!(matcher.find_match("beta"), Some("^b"));
        assert_eq!(matcher.find_match("gamma"), None);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = RepositoryFilter::new(&patterns(&["[invalid"]), &[]);
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }
}
