use anyhow::{Context, Result};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::listing::{CodebaseListing, ListedFile};
use crate::matcher::TokenEstimator;

fn default_overrides(repo_root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(repo_root);

    // Common high-noise artifacts that never belong in assistant context.
    // Note: for directories, add both the entry and its descendants,
    // otherwise the walker may still descend into the directory.

    // Lockfiles
    ob.add("!**/*.lock")?;
    ob.add("!**/package-lock.json")?;
    ob.add("!**/pnpm-lock.yaml")?;
    ob.add("!**/yarn.lock")?;
    ob.add("!**/Cargo.lock")?;

    // Sourcemaps + images/icons
    for ext in ["map", "svg", "png", "ico", "jpg", "jpeg", "gif", "webp", "woff", "woff2"] {
        ob.add(&format!("!**/*.{ext}"))?;
    }

    // Common build outputs / heavy dirs
    for d in [".git", "node_modules", "target", "dist", "build", "coverage", ".next", ".nuxt", "out"] {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    // Project-specific excluded dirs (includes the tool's own output dir)
    for d in exclude_dir_names {
        let d = d.trim().trim_matches('/');
        if d.is_empty() {
            continue;
        }
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub repo_root: PathBuf,
    pub max_file_bytes: u64,
    pub exclude_dir_names: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub listing: CodebaseListing,
    /// Files found by the walk but too large (or empty) to list.
    pub skipped_size: usize,
    /// Files whose contents could not be read or estimated.
    pub unreadable: Vec<String>,
}

struct Candidate {
    abs_path: PathBuf,
    rel_path: String,
}

/// Walk `opts.repo_root` and estimate every surviving file's token cost.
///
/// `.gitignore` and the default noise overrides are applied first. A file
/// whose contents cannot be read or estimated is left out of the listing and
/// reported in [`ScanReport::unreadable`]; it never fails the scan.
pub fn scan_codebase(opts: &ScanOptions, estimator: &dyn TokenEstimator) -> Result<ScanReport> {
    let root = &opts.repo_root;
    let meta = std::fs::metadata(root)
        .with_context(|| format!("Repository root does not exist: {}", root.display()))?;
    anyhow::ensure!(meta.is_dir(), "Repository root is not a directory: {}", root.display());

    let overrides = default_overrides(root, &opts.exclude_dir_names)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(true) // .gitignore, .ignore, hidden, etc.
        .overrides(overrides)
        .build();

    let mut candidates = Vec::new();
    let mut skipped_size = 0usize;

    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let abs_path = dent.into_path();
        let bytes = match std::fs::metadata(&abs_path).map(|m| m.len()) {
            Ok(b) => b,
            Err(_) => continue,
        };

        if bytes == 0 || bytes > opts.max_file_bytes {
            skipped_size += 1;
            continue;
        }

        let rel_path = path_relative_to(&abs_path, root)
            .with_context(|| format!("Failed to relativize path: {}", abs_path.display()))?;

        candidates.push(Candidate {
            abs_path,
            rel_path: rel_path.to_string_lossy().replace('\\', "/"),
        });
    }

    let estimated: Vec<std::result::Result<ListedFile, String>> = candidates
        .par_iter()
        .map(|c| {
            let tokens = std::fs::read(&c.abs_path)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| estimator.estimate(&bytes));
            match tokens {
                Ok(tokens) => Ok(ListedFile {
                    path: c.rel_path.clone(),
                    tokens,
                }),
                Err(_e) => {
                    crate::debug_log!("[ctxsteer] cannot estimate {}: {_e}", c.rel_path);
                    Err(c.rel_path.clone())
                }
            }
        })
        .collect();

    let mut files = Vec::with_capacity(estimated.len());
    let mut unreadable = Vec::new();
    for r in estimated {
        match r {
            Ok(f) => files.push(f),
            Err(path) => unreadable.push(path),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    unreadable.sort();

    Ok(ScanReport {
        listing: CodebaseListing::new(files),
        skipped_size,
        unreadable,
    })
}

fn path_relative_to(path: &Path, base: &Path) -> Result<PathBuf> {
    let rel = path
        .strip_prefix(base)
        .with_context(|| format!("{} is not under {}", path.display(), base.display()))?;
    Ok(rel.to_path_buf())
}
