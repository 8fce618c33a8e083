//! Path matching and token estimation primitives.
//!
//! Both are traits so embedders can plug in their own glob dialect or
//! tokenizer. The defaults are a `glob::Pattern` matcher and the
//! chars-per-token heuristic.

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};

/// Matches repo-relative, `/`-separated paths against rule patterns.
///
/// Patterns are compiled once per resolution. A compile error disables that
/// one pattern; a match error drops that one file.
pub trait PathMatcher {
    type Compiled;

    fn compile(&self, pattern: &str) -> Result<Self::Compiled>;

    fn is_match(&self, compiled: &Self::Compiled, path: &str) -> Result<bool>;
}

/// Default matcher: gitignore-ish globs where `*` stays within one path
/// component and `**` spans any number of directories (including none).
#[derive(Debug, Clone, Copy)]
pub struct GlobMatcher {
    options: MatchOptions,
}

impl Default for GlobMatcher {
    fn default() -> Self {
        Self {
            options: MatchOptions {
                case_sensitive: true,
                require_literal_separator: true,
                require_literal_leading_dot: false,
            },
        }
    }
}

impl GlobMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive() -> Self {
        let mut m = Self::default();
        m.options.case_sensitive = false;
        m
    }
}

impl PathMatcher for GlobMatcher {
    type Compiled = Pattern;

    fn compile(&self, pattern: &str) -> Result<Pattern> {
        Pattern::new(pattern).with_context(|| format!("invalid glob pattern `{pattern}`"))
    }

    fn is_match(&self, compiled: &Pattern, path: &str) -> Result<bool> {
        Ok(compiled.matches_with(path, self.options))
    }
}

/// Estimates the token cost of a file's contents.
///
/// Runs upstream of the resolver: the scanner calls it and the listing only
/// carries the resulting numbers.
pub trait TokenEstimator: Sync {
    fn estimate(&self, contents: &[u8]) -> Result<usize>;
}

#[derive(Debug, Clone, Copy)]
pub struct CharsPerTokenEstimator {
    pub chars_per_token: usize,
}

impl Default for CharsPerTokenEstimator {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenEstimator for CharsPerTokenEstimator {
    fn estimate(&self, contents: &[u8]) -> Result<usize> {
        Ok(estimate_tokens_from_bytes(contents.len() as u64, self.chars_per_token))
    }
}

pub fn estimate_tokens_from_bytes(total_bytes: u64, chars_per_token: usize) -> usize {
    if chars_per_token == 0 {
        return total_bytes as usize;
    }

    // Heuristic: ~4 chars per token. We use bytes as a proxy for chars.
    ((total_bytes as f64) / (chars_per_token as f64)).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob_matches(pattern: &str, path: &str) -> bool {
        let m = GlobMatcher::new();
        let p = m.compile(pattern).unwrap();
        m.is_match(&p, path).unwrap()
    }

    #[test]
    fn double_star_spans_zero_or_more_dirs() {
        assert!(glob_matches("src/**/*.ts", "src/a.ts"));
        assert!(glob_matches("src/**/*.ts", "src/gen/b.ts"));
        assert!(glob_matches("src/**/*.ts", "src/gen/deep/c.ts"));
        assert!(!glob_matches("src/**/*.ts", "docs/c.md"));
        assert!(glob_matches("src/gen/**/*", "src/gen/b.ts"));
    }

    #[test]
    fn single_star_stays_in_component() {
        assert!(glob_matches("src/*.ts", "src/a.ts"));
        assert!(!glob_matches("src/*.ts", "src/gen/b.ts"));
    }

    #[test]
    fn dotfiles_match_wildcards() {
        assert!(glob_matches("**/*.json", ".vscode/settings.json"));
        assert!(glob_matches("*", ".env"));
    }

    #[test]
    fn case_sensitivity_is_configurable() {
        assert!(!glob_matches("README.md", "readme.md"));
        let m = GlobMatcher::case_insensitive();
        let p = m.compile("README.md").unwrap();
        assert!(m.is_match(&p, "readme.md").unwrap());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = GlobMatcher::new().compile("src/[").unwrap_err();
        assert!(err.to_string().contains("src/["));
    }

    #[test]
    fn chars_per_token_rounds_up() {
        let est = CharsPerTokenEstimator::default();
        assert_eq!(est.estimate(b"").unwrap(), 0);
        assert_eq!(est.estimate(b"abcd").unwrap(), 1);
        assert_eq!(est.estimate(b"abcde").unwrap(), 2);
        assert_eq!(estimate_tokens_from_bytes(10, 0), 10);
    }
}
