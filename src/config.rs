use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::view::ViewState;

pub const CONFIG_FILE_NAME: &str = ".ctxsteer.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEstimatorConfig {
    pub chars_per_token: usize,
    pub max_file_bytes: u64,
}

/// Controls codebase scanning behavior (what to skip).
///
/// Note: `.gitignore` is always respected by the scanner; these are additional
/// hard skips for noisy directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree (e.g. "generated", "tmp").
    ///
    /// These are compared against path components, not full paths.
    pub exclude_dir_names: Vec<String>,
}

/// Hard safety ceiling: files larger than this are **always** skipped, regardless of config.
pub const ABSOLUTE_MAX_FILE_BYTES: u64 = 1_000_000; // 1 MB

impl Default for TokenEstimatorConfig {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            // 512 KB default — enough for any real source file, blocks log/generated bloat.
            max_file_bytes: 512 * 1024,
        }
    }
}

impl TokenEstimatorConfig {
    pub fn effective_max_file_bytes(&self) -> u64 {
        self.max_file_bytes.min(ABSOLUTE_MAX_FILE_BYTES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where `rules.json` and `active_context.xml` live, relative to the repo root.
    pub output_dir: PathBuf,
    /// Settings that govern file discovery and exclusion.
    pub scan: ScanConfig,
    pub token_estimator: TokenEstimatorConfig,
    /// Initial sort/filter selection for a new session.
    pub view: ViewState,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(".ctxsteer"),
            scan: ScanConfig::default(),
            token_estimator: TokenEstimatorConfig::default(),
            view: ViewState::default(),
        }
    }
}

impl Config {
    pub fn rules_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.output_dir).join("rules.json")
    }
}

pub fn load_config(repo_root: &Path) -> Config {
    let primary = repo_root.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        eprintln!("[ctxsteer] WARN: ignoring {}: {e}", primary.display());
        Config::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{RuleFilter, SortDirection, SortKey};
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(tmp.path());
        assert_eq!(cfg.output_dir, PathBuf::from(".ctxsteer"));
        assert_eq!(cfg.token_estimator.chars_per_token, 4);
        assert_eq!(cfg.view, ViewState::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{
                "scan": { "exclude_dir_names": ["generated"] },
                "view": { "sortKey": "rule", "ruleFilter": "exclude" }
            }"#,
        )
        .unwrap();

        let cfg = load_config(tmp.path());
        assert_eq!(cfg.scan.exclude_dir_names, ["generated"]);
        assert_eq!(cfg.view.sort_key, SortKey::Rule);
        assert_eq!(cfg.view.sort_direction, SortDirection::Desc);
        assert_eq!(cfg.view.rule_filter, RuleFilter::Exclude);
        assert_eq!(cfg.token_estimator.max_file_bytes, 512 * 1024);
    }

    #[test]
    fn malformed_file_fails_open() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let cfg = load_config(tmp.path());
        assert_eq!(cfg.output_dir, PathBuf::from(".ctxsteer"));
    }

    #[test]
    fn max_file_bytes_is_capped() {
        let cfg = TokenEstimatorConfig {
            chars_per_token: 4,
            max_file_bytes: 50_000_000,
        };
        assert_eq!(cfg.effective_max_file_bytes(), ABSOLUTE_MAX_FILE_BYTES);
        assert_eq!(
            Config::default().rules_path(Path::new("/repo")),
            PathBuf::from("/repo/.ctxsteer/rules.json")
        );
    }
}
