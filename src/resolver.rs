//! Rule resolution: which files end up in context, and what each rule matches.
//!
//! Precedence is fixed: a file is in context when it is eligible (matched by an
//! Include or AutoInclude rule, or the Include collection is empty) and no
//! Exclude rule matches it. Per-rule statistics ignore precedence: every rule
//! reports its own direct matches.

use serde::Serialize;

use crate::listing::{CodebaseListing, ListedFile};
use crate::matcher::PathMatcher;
use crate::rules::{RuleKind, RuleStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRule {
    pub kind: RuleKind,
    pub pattern: String,
    pub matched_file_count: usize,
    pub matched_token_count: usize,
}

/// Files selected as assistant context, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub files: Vec<ListedFile>,
}

impl ContextSnapshot {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.files.iter().map(|f| f.tokens).sum()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.iter().map(|f| f.path.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// One entry per stored rule, in merge order (Include, AutoInclude, Exclude).
    pub rules: Vec<ResolvedRule>,
    pub snapshot: ContextSnapshot,
    /// Files the matcher failed on; left out of every count.
    pub faulted: Vec<String>,
    /// Patterns that failed to compile; they match nothing.
    pub invalid_patterns: Vec<ResolvedRuleRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRuleRef {
    pub kind: RuleKind,
    pub pattern: String,
}

impl Resolution {
    pub fn rules_of(&self, kind: RuleKind) -> impl Iterator<Item = &ResolvedRule> + '_ {
        self.rules.iter().filter(move |r| r.kind == kind)
    }

    pub fn rule(&self, kind: RuleKind, pattern: &str) -> Option<&ResolvedRule> {
        self.rules.iter().find(|r| r.kind == kind && r.pattern == pattern)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Membership {
    included: bool,
    auto_included: bool,
    excluded: bool,
}

impl Membership {
    fn mark(&mut self, kind: RuleKind) {
        match kind {
            RuleKind::Include => self.included = true,
            RuleKind::AutoInclude => self.auto_included = true,
            RuleKind::Exclude => self.excluded = true,
        }
    }

    fn in_context(self, default_inclusion: bool) -> bool {
        (self.included || self.auto_included || default_inclusion) && !self.excluded
    }
}

struct CompiledRule<'a, C> {
    kind: RuleKind,
    pattern: &'a str,
    compiled: Option<C>,
}

/// Resolve `store` against `listing`.
///
/// Never fails: a pattern that does not compile gets zeroed statistics, and a
/// file the matcher errors on is dropped from this evaluation entirely.
pub fn resolve<M: PathMatcher>(store: &RuleStore, listing: &CodebaseListing, matcher: &M) -> Resolution {
    let mut invalid_patterns = Vec::new();
    let rules: Vec<CompiledRule<'_, M::Compiled>> = store
        .iter()
        .map(|(kind, pattern)| {
            let compiled = match matcher.compile(pattern) {
                Ok(c) => Some(c),
                Err(_e) => {
                    crate::debug_log!("[ctxsteer] {kind} rule `{pattern}` disabled: {_e}");
                    invalid_patterns.push(ResolvedRuleRef {
                        kind,
                        pattern: pattern.to_string(),
                    });
                    None
                }
            };
            CompiledRule { kind, pattern, compiled }
        })
        .collect();

    let mut resolved: Vec<ResolvedRule> = rules
        .iter()
        .map(|r| ResolvedRule {
            kind: r.kind,
            pattern: r.pattern.to_string(),
            matched_file_count: 0,
            matched_token_count: 0,
        })
        .collect();

    // Absence of manual includes means the whole codebase is eligible.
    let default_inclusion = store.patterns(RuleKind::Include).is_empty();

    let mut snapshot = ContextSnapshot::default();
    let mut faulted = Vec::new();
    let mut hits = vec![false; rules.len()];

    for file in listing.files() {
        if let Err(_e) = match_file(matcher, &rules, &file.path, &mut hits) {
            crate::debug_log!("[ctxsteer] skipping {}: {_e}", file.path);
            faulted.push(file.path.clone());
            continue;
        }

        let mut membership = Membership::default();
        for (i, _) in hits.iter().enumerate().filter(|(_, hit)| **hit) {
            let stats = &mut resolved[i];
            stats.matched_file_count += 1;
            stats.matched_token_count = stats.matched_token_count.saturating_add(file.tokens);
            membership.mark(rules[i].kind);
        }

        if membership.in_context(default_inclusion) {
            snapshot.files.push(file.clone());
        }
    }

    Resolution {
        rules: resolved,
        snapshot,
        faulted,
        invalid_patterns,
    }
}

/// Fill `hits` for one path. Any matcher error aborts the whole file so it
/// never contributes partial counts.
fn match_file<M: PathMatcher>(
    matcher: &M,
    rules: &[CompiledRule<'_, M::Compiled>],
    path: &str,
    hits: &mut [bool],
) -> anyhow::Result<()> {
    for (rule, hit) in rules.iter().zip(hits.iter_mut()) {
        *hit = match &rule.compiled {
            Some(c) => matcher.is_match(c, path)?,
            None => false,
        };
    }
    Ok(())
}
