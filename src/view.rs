//! Presentation projection of resolved rules: merge, filter, totals, sort and
//! per-row shares. Read-only; nothing here touches the rule store.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::resolver::{Resolution, ResolvedRule};
use crate::rules::RuleKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Tokens,
    Files,
    Rule,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleFilter {
    #[default]
    All,
    Include,
    AutoInclude,
    Exclude,
}

impl RuleFilter {
    pub fn admits(self, kind: RuleKind) -> bool {
        match self {
            RuleFilter::All => true,
            RuleFilter::Include => kind == RuleKind::Include,
            RuleFilter::AutoInclude => kind == RuleKind::AutoInclude,
            RuleFilter::Exclude => kind == RuleKind::Exclude,
        }
    }
}

impl From<RuleKind> for RuleFilter {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Include => RuleFilter::Include,
            RuleKind::AutoInclude => RuleFilter::AutoInclude,
            RuleKind::Exclude => RuleFilter::Exclude,
        }
    }
}

/// Session-scoped sort/filter selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewState {
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    pub rule_filter: RuleFilter,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tokens" => Ok(SortKey::Tokens),
            "files" => Ok(SortKey::Files),
            "rule" | "type" => Ok(SortKey::Rule),
            other => Err(format!("unknown sort key `{other}` (expected tokens, files or rule)")),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction `{other}` (expected asc or desc)")),
        }
    }
}

impl FromStr for RuleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(RuleFilter::All);
        }
        s.parse::<RuleKind>().map(RuleFilter::from)
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SortKey::Tokens => "tokens",
            SortKey::Files => "files",
            SortKey::Rule => "rule",
        })
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

impl std::fmt::Display for RuleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleFilter::All => f.write_str("all"),
            RuleFilter::Include => write!(f, "{}", RuleKind::Include),
            RuleFilter::AutoInclude => write!(f, "{}", RuleKind::AutoInclude),
            RuleFilter::Exclude => write!(f, "{}", RuleKind::Exclude),
        }
    }
}

/// One displayed rule with its shares of the displayed totals (`0.0..=1.0`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRow {
    #[serde(flatten)]
    pub rule: ResolvedRule,
    pub token_share: f64,
    pub file_share: f64,
    /// Share of the metric matching the sort key; tokens when sorting by rule.
    pub metric_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleView {
    pub view: ViewState,
    pub rows: Vec<RuleRow>,
    /// Rules across all collections, before filtering.
    pub rule_count: usize,
    /// Sums over the filtered rows.
    pub total_tokens: usize,
    pub total_files: usize,
}

/// Concatenate resolved rules by collection: Include, AutoInclude, Exclude.
pub fn merge(resolution: &Resolution) -> Vec<&ResolvedRule> {
    RuleKind::ALL
        .into_iter()
        .flat_map(|kind| resolution.rules_of(kind))
        .collect()
}

pub fn build_view(resolution: &Resolution, view: ViewState) -> RuleView {
    let merged = merge(resolution);
    let rule_count = merged.len();

    let mut shown: Vec<&ResolvedRule> = merged
        .into_iter()
        .filter(|r| view.rule_filter.admits(r.kind))
        .collect();

    let total_tokens: usize = shown.iter().map(|r| r.matched_token_count).sum();
    let total_files: usize = shown.iter().map(|r| r.matched_file_count).sum();

    // `sort_by` is stable, so ties keep merge order in both directions.
    shown.sort_by(|a, b| {
        let ord = compare(a, b, view.sort_key);
        match view.sort_direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    let rows = shown
        .into_iter()
        .map(|r| {
            let token_share = share(r.matched_token_count, total_tokens);
            let file_share = share(r.matched_file_count, total_files);
            let metric_share = match view.sort_key {
                SortKey::Files => file_share,
                SortKey::Tokens | SortKey::Rule => token_share,
            };
            RuleRow {
                rule: r.clone(),
                token_share,
                file_share,
                metric_share,
            }
        })
        .collect();

    RuleView {
        view,
        rows,
        rule_count,
        total_tokens,
        total_files,
    }
}

fn compare(a: &ResolvedRule, b: &ResolvedRule, key: SortKey) -> Ordering {
    match key {
        SortKey::Tokens => a.matched_token_count.cmp(&b.matched_token_count),
        SortKey::Files => a.matched_file_count.cmp(&b.matched_file_count),
        SortKey::Rule => a.kind.cmp(&b.kind),
    }
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64).min(1.0)
}
