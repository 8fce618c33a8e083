//! # Rule Store
//!
//! Single source of truth for the three rule collections that steer context
//! selection:
//!
//!  1. **Include**      manual includes; when non-empty they define what is eligible
//!  2. **AutoInclude**  paths always appended to an automatic selection
//!  3. **Exclude**      paths that are never used, whatever else matches them
//!
//! Each collection is an ordered, duplicate-free list of glob patterns. Order
//! is insertion order and doubles as the default display order.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use xxhash_rust::xxh3::Xxh3;

// ─────────────────────────────────────────────────────────────────────────────
// Rule kinds
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Include,
    AutoInclude,
    Exclude,
}

impl RuleKind {
    /// Merge and `rule` sort order.
    pub const ALL: [RuleKind; 3] = [RuleKind::Include, RuleKind::AutoInclude, RuleKind::Exclude];

    fn index(self) -> usize {
        match self {
            RuleKind::Include => 0,
            RuleKind::AutoInclude => 1,
            RuleKind::Exclude => 2,
        }
    }

    /// Human label used by the CLI table.
    pub fn label(self) -> &'static str {
        match self {
            RuleKind::Include => "Manual include",
            RuleKind::AutoInclude => "Auto-include",
            RuleKind::Exclude => "Exclude",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::Include => write!(f, "include"),
            RuleKind::AutoInclude => write!(f, "autoInclude"),
            RuleKind::Exclude => write!(f, "exclude"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "include" => Ok(RuleKind::Include),
            "autoinclude" | "auto" => Ok(RuleKind::AutoInclude),
            "exclude" => Ok(RuleKind::Exclude),
            other => Err(format!(
                "unknown rule kind `{other}` (expected include, auto-include or exclude)"
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// The three rule collections, keyed by [`RuleKind`].
///
/// Serialized as `{"include": [...], "autoInclude": [...], "exclude": [...]}`.
/// Deserialization goes through [`RuleStore::add_pattern`], so hand-edited
/// settings files with blanks or duplicates load normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PersistedRules", into = "PersistedRules")]
pub struct RuleStore {
    collections: [Vec<String>; 3],
}

/// On-disk shape of `rules.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedRules {
    pub include: Vec<String>,
    pub auto_include: Vec<String>,
    pub exclude: Vec<String>,
}

impl From<PersistedRules> for RuleStore {
    fn from(p: PersistedRules) -> Self {
        let mut store = RuleStore::new();
        for (kind, patterns) in [
            (RuleKind::Include, p.include),
            (RuleKind::AutoInclude, p.auto_include),
            (RuleKind::Exclude, p.exclude),
        ] {
            for pattern in patterns {
                store.add_pattern(kind, &pattern);
            }
        }
        store
    }
}

impl From<RuleStore> for PersistedRules {
    fn from(store: RuleStore) -> Self {
        let [include, auto_include, exclude] = store.collections;
        PersistedRules {
            include,
            auto_include,
            exclude,
        }
    }
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patterns of one collection, in insertion order.
    pub fn patterns(&self, kind: RuleKind) -> &[String] {
        &self.collections[kind.index()]
    }

    pub fn contains(&self, kind: RuleKind, pattern: &str) -> bool {
        self.patterns(kind).iter().any(|p| p == pattern)
    }

    /// Append `pattern` to the `kind` collection.
    ///
    /// The input is trimmed first. Blank input and patterns already present in
    /// that collection are ignored. Returns `true` when the store changed.
    pub fn add_pattern(&mut self, kind: RuleKind, pattern: &str) -> bool {
        let pattern = pattern.trim();
        if pattern.is_empty() || self.contains(kind, pattern) {
            return false;
        }
        self.collections[kind.index()].push(pattern.to_string());
        true
    }

    /// Remove `pattern` (trimmed, like [`RuleStore::add_pattern`]) from the
    /// `kind` collection. Returns `true` when the store changed.
    pub fn remove_pattern(&mut self, kind: RuleKind, pattern: &str) -> bool {
        let pattern = pattern.trim();
        let list = &mut self.collections[kind.index()];
        match list.iter().position(|p| p == pattern) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Total number of rules across all collections.
    pub fn len(&self) -> usize {
        self.collections.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rules in merge order: every Include, then AutoInclude, then Exclude.
    pub fn iter(&self) -> impl Iterator<Item = (RuleKind, &str)> + '_ {
        RuleKind::ALL
            .into_iter()
            .flat_map(move |kind| self.patterns(kind).iter().map(move |p| (kind, p.as_str())))
    }

    /// Content hash of every (kind, pattern) pair in order.
    ///
    /// Two stores with the same collections hash equal, which makes this the
    /// store's version for cache invalidation.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Xxh3::new();
        for (kind, pattern) in self.iter() {
            h.update(&[kind.index() as u8]);
            h.update(pattern.as_bytes());
            h.update(&[0xff]);
        }
        h.digest()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
