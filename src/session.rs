use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{load_config, Config};
use crate::engine::ContextEngine;
use crate::matcher::CharsPerTokenEstimator;
use crate::rules::{RuleKind, RuleStore};
use crate::scanner::{scan_codebase, ScanOptions, ScanReport};
use crate::settings::{load_rules, save_rules};
use crate::slicer::snapshot_to_xml;

/// One repository opened for editing: its config, persisted rules, latest
/// scan and the engine over them.
pub struct Session {
    repo_root: PathBuf,
    cfg: Config,
    engine: ContextEngine,
    skipped_size: usize,
    unreadable: Vec<String>,
}

pub fn scan_options(repo_root: &Path, cfg: &Config) -> ScanOptions {
    let mut exclude_dir_names = vec![cfg.output_dir.to_string_lossy().to_string()];
    exclude_dir_names.extend(cfg.scan.exclude_dir_names.iter().cloned());
    ScanOptions {
        repo_root: repo_root.to_path_buf(),
        max_file_bytes: cfg.token_estimator.effective_max_file_bytes(),
        exclude_dir_names,
    }
}

pub fn scan_repo(repo_root: &Path, cfg: &Config) -> Result<ScanReport> {
    let estimator = CharsPerTokenEstimator {
        chars_per_token: cfg.token_estimator.chars_per_token,
    };
    scan_codebase(&scan_options(repo_root, cfg), &estimator)
}

impl Session {
    /// Load config and rules for `repo_root` and scan it.
    pub fn open(repo_root: &Path) -> Result<Self> {
        let cfg = load_config(repo_root);
        let report = scan_repo(repo_root, &cfg)?;
        Ok(Self::from_parts(repo_root, cfg, report))
    }

    /// Build a session from an already finished scan.
    pub fn from_parts(repo_root: &Path, cfg: Config, report: ScanReport) -> Self {
        let rules = load_rules(&cfg.rules_path(repo_root));
        let engine = ContextEngine::new(rules, report.listing).with_view(cfg.view);
        Self {
            repo_root: repo_root.to_path_buf(),
            cfg,
            engine,
            skipped_size: report.skipped_size,
            unreadable: report.unreadable,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn engine(&mut self) -> &mut ContextEngine {
        &mut self.engine
    }

    pub fn skipped_size(&self) -> usize {
        self.skipped_size
    }

    pub fn unreadable(&self) -> &[String] {
        &self.unreadable
    }

    /// Re-scan the repository; the engine's caches survive if nothing changed.
    pub fn rescan(&mut self) -> Result<()> {
        let report = scan_repo(&self.repo_root, &self.cfg)?;
        self.engine.set_listing(report.listing);
        self.skipped_size = report.skipped_size;
        self.unreadable = report.unreadable;
        Ok(())
    }

    /// Add a rule and persist the store when it changed.
    pub fn add_pattern(&mut self, kind: RuleKind, pattern: &str) -> Result<bool> {
        self.update_rules(|rules| rules.add_pattern(kind, pattern))
    }

    /// Remove a rule and persist the store when it changed.
    pub fn remove_pattern(&mut self, kind: RuleKind, pattern: &str) -> Result<bool> {
        self.update_rules(|rules| rules.remove_pattern(kind, pattern))
    }

    /// Apply `edit` to a copy of the store; the engine only sees it once saved.
    fn update_rules(&mut self, edit: impl FnOnce(&mut RuleStore) -> bool) -> Result<bool> {
        let mut rules = self.engine.rules().clone();
        if !edit(&mut rules) {
            return Ok(false);
        }
        save_rules(&self.cfg.rules_path(&self.repo_root), &rules)?;
        self.engine.replace_rules(rules);
        Ok(true)
    }

    /// Render the current snapshot and write it to `<output_dir>/active_context.xml`.
    pub fn write_payload(&mut self) -> Result<(PathBuf, String)> {
        let xml = snapshot_to_xml(&self.repo_root, self.engine.snapshot())?;
        let out_dir = self.repo_root.join(&self.cfg.output_dir);
        std::fs::create_dir_all(&out_dir)?;
        let out_path = out_dir.join("active_context.xml");
        std::fs::write(&out_path, &xml)?;
        Ok((out_path, xml))
    }
}
