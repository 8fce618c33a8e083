//! Memoized composition of rule store, codebase listing and view state.
//!
//! Derived values are cached under content fingerprints of their inputs, so a
//! repeated query with unchanged inputs is free and a changed input can never
//! serve a stale result.

use crate::listing::CodebaseListing;
use crate::matcher::{GlobMatcher, PathMatcher};
use crate::resolver::{resolve, ContextSnapshot, Resolution};
use crate::rules::{RuleKind, RuleStore};
use crate::view::{build_view, RuleFilter, RuleView, SortDirection, SortKey, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolutionKey {
    rules: u64,
    listing: u64,
}

/// Single-slot cache.
#[derive(Debug)]
struct Memo<K, V> {
    slot: Option<(K, V)>,
    computed: usize,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            slot: None,
            computed: 0,
        }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> &V {
        let fresh = matches!(&self.slot, Some((k, _)) if *k == key);
        if !fresh {
            self.slot = None;
            self.computed += 1;
        }
        let (_, v) = self.slot.get_or_insert_with(|| (key, f()));
        v
    }
}

pub struct ContextEngine<M: PathMatcher = GlobMatcher> {
    matcher: M,
    rules: RuleStore,
    listing: CodebaseListing,
    listing_fingerprint: u64,
    view: ViewState,
    resolved: Memo<ResolutionKey, Resolution>,
    rendered: Memo<(ResolutionKey, ViewState), RuleView>,
}

impl ContextEngine<GlobMatcher> {
    pub fn new(rules: RuleStore, listing: CodebaseListing) -> Self {
        Self::with_matcher(GlobMatcher::new(), rules, listing)
    }
}

impl<M: PathMatcher> ContextEngine<M> {
    pub fn with_matcher(matcher: M, rules: RuleStore, listing: CodebaseListing) -> Self {
        let listing_fingerprint = listing.fingerprint();
        Self {
            matcher,
            rules,
            listing,
            listing_fingerprint,
            view: ViewState::default(),
            resolved: Memo::default(),
            rendered: Memo::default(),
        }
    }

    pub fn with_view(mut self, view: ViewState) -> Self {
        self.view = view;
        self
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn listing(&self) -> &CodebaseListing {
        &self.listing
    }

    pub fn view_state(&self) -> ViewState {
        self.view
    }

    // ── write surface ───────────────────────────────────────────────────────

    pub fn add_pattern(&mut self, kind: RuleKind, pattern: &str) -> bool {
        self.rules.add_pattern(kind, pattern)
    }

    pub fn remove_pattern(&mut self, kind: RuleKind, pattern: &str) -> bool {
        self.rules.remove_pattern(kind, pattern)
    }

    pub fn replace_rules(&mut self, rules: RuleStore) {
        self.rules = rules;
    }

    pub fn set_listing(&mut self, listing: CodebaseListing) {
        self.listing_fingerprint = listing.fingerprint();
        self.listing = listing;
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.view.sort_key = key;
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.view.sort_direction = direction;
    }

    pub fn set_rule_filter(&mut self, filter: RuleFilter) {
        self.view.rule_filter = filter;
    }

    pub fn set_view(&mut self, view: ViewState) {
        self.view = view;
    }

    // ── derived ─────────────────────────────────────────────────────────────

    fn resolution_key(&self) -> ResolutionKey {
        ResolutionKey {
            rules: self.rules.fingerprint(),
            listing: self.listing_fingerprint,
        }
    }

    pub fn resolution(&mut self) -> &Resolution {
        let key = self.resolution_key();
        let (rules, listing, matcher) = (&self.rules, &self.listing, &self.matcher);
        self.resolved.get_or_insert_with(key, || {
            crate::debug_log!(
                "[ctxsteer] resolving {} rules against {} files",
                rules.len(),
                listing.len()
            );
            resolve(rules, listing, matcher)
        })
    }

    pub fn snapshot(&mut self) -> &ContextSnapshot {
        &self.resolution().snapshot
    }

    pub fn rule_view(&mut self) -> &RuleView {
        let key = self.resolution_key();
        let view = self.view;
        let (rules, listing, matcher) = (&self.rules, &self.listing, &self.matcher);
        let resolution = self
            .resolved
            .get_or_insert_with(key, || resolve(rules, listing, matcher));
        self.rendered.get_or_insert_with((key, view), || {
            crate::debug_log!("[ctxsteer] rebuilding rule view ({view:?})");
            build_view(resolution, view)
        })
    }

    /// How many times resolution and view building actually ran.
    pub fn recompute_counts(&self) -> (usize, usize) {
        (self.resolved.computed, self.rendered.computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sample_listing() -> CodebaseListing {
        [("src/a.ts", 10), ("src/gen/b.ts", 5), ("docs/c.md", 3)]
            .into_iter()
            .collect()
    }

    /// Glob matcher that counts how many patterns it compiled.
    #[derive(Default)]
    struct CountingMatcher {
        inner: GlobMatcher,
        compiles: Cell<usize>,
    }

    impl PathMatcher for CountingMatcher {
        type Compiled = glob::Pattern;

        fn compile(&self, pattern: &str) -> anyhow::Result<glob::Pattern> {
            self.compiles.set(self.compiles.get() + 1);
            self.inner.compile(pattern)
        }

        fn is_match(&self, compiled: &glob::Pattern, path: &str) -> anyhow::Result<bool> {
            self.inner.is_match(compiled, path)
        }
    }

    #[test]
    fn snapshot_follows_rule_mutations() {
        let mut engine = ContextEngine::new(RuleStore::new(), sample_listing());
        assert_eq!(engine.snapshot().len(), 3);

        engine.add_pattern(RuleKind::Include, "src/**/*.ts");
        assert_eq!(engine.snapshot().len(), 2);

        engine.add_pattern(RuleKind::Exclude, "src/gen/**/*");
        let paths: Vec<&str> = engine.snapshot().paths().collect();
        assert_eq!(paths, ["src/a.ts"]);

        engine.remove_pattern(RuleKind::Include, "src/**/*.ts");
        assert_eq!(engine.snapshot().len(), 2, "default inclusion minus the exclude");
    }

    #[test]
    fn unchanged_inputs_hit_the_cache() {
        let mut rules = RuleStore::new();
        rules.add_pattern(RuleKind::Include, "src/**");
        let mut engine = ContextEngine::with_matcher(CountingMatcher::default(), rules, sample_listing());

        let first = engine.resolution().clone();
        let second = engine.resolution().clone();
        assert_eq!(first, second);
        engine.rule_view();
        engine.rule_view();
        assert_eq!(engine.recompute_counts(), (1, 1));
        assert_eq!(engine.matcher.compiles.get(), 1);
    }

    #[test]
    fn no_op_mutations_keep_the_cache() {
        let mut engine = ContextEngine::new(RuleStore::new(), sample_listing());
        engine.add_pattern(RuleKind::Include, "src/**");
        engine.resolution();

        assert!(!engine.add_pattern(RuleKind::Include, "src/**"));
        assert!(!engine.add_pattern(RuleKind::Include, "  "));
        assert!(!engine.remove_pattern(RuleKind::Exclude, "missing"));
        engine.resolution();
        assert_eq!(engine.recompute_counts().0, 1);
    }

    #[test]
    fn view_change_rebuilds_view_only() {
        let mut engine = ContextEngine::new(RuleStore::new(), sample_listing());
        engine.add_pattern(RuleKind::Include, "src/**");
        engine.add_pattern(RuleKind::Exclude, "docs/**");
        engine.rule_view();

        engine.set_rule_filter(RuleFilter::Exclude);
        let view = engine.rule_view();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.total_tokens, 3);
        assert_eq!(engine.recompute_counts(), (1, 2));

        engine.set_sort_direction(SortDirection::Asc);
        engine.set_sort_key(SortKey::Files);
        engine.rule_view();
        assert_eq!(engine.recompute_counts(), (1, 3));
    }

    #[test]
    fn listing_change_invalidates() {
        let mut engine = ContextEngine::new(RuleStore::new(), sample_listing());
        engine.add_pattern(RuleKind::Include, "src/**");
        assert_eq!(engine.rule_view().total_tokens, 15);

        engine.set_listing([("src/a.ts", 12)].into_iter().collect());
        assert_eq!(engine.rule_view().total_tokens, 12);
        assert_eq!(engine.recompute_counts(), (2, 2));

        // Same content under a fresh value is still a hit.
        engine.set_listing([("src/a.ts", 12)].into_iter().collect());
        engine.rule_view();
        assert_eq!(engine.recompute_counts(), (2, 2));
    }

    #[test]
    fn remove_then_readd_returns_to_cached_key() {
        let mut engine = ContextEngine::new(RuleStore::new(), sample_listing());
        engine.add_pattern(RuleKind::Exclude, "docs/**");
        let before = engine.resolution().clone();

        engine.remove_pattern(RuleKind::Exclude, "docs/**");
        engine.resolution();
        engine.add_pattern(RuleKind::Exclude, "docs/**");
        assert_eq!(engine.resolution(), &before);
    }
}
