//! Project settings record holding the three rule collections.
//!
//! Layout: `{"include": [...], "autoInclude": [...], "exclude": [...]}`,
//! order preserved per collection.

use anyhow::{Context, Result};
use std::path::Path;

use crate::rules::RuleStore;

/// Load the rule store saved at `path`.
///
/// A missing file is an empty store. A file that cannot be read or parsed
/// emits a WARN on stderr and also yields an empty store.
pub fn load_rules(path: &Path) -> RuleStore {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return RuleStore::new(),
        Err(e) => {
            eprintln!("[ctxsteer] WARN: could not read {}: {e}", path.display());
            return RuleStore::new();
        }
    };
    match serde_json::from_str::<RuleStore>(&text) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("[ctxsteer] WARN: could not parse {}: {e}", path.display());
            RuleStore::new()
        }
    }
}

pub fn save_rules(path: &Path, rules: &RuleStore) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(rules)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleKind;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_keeps_order_and_separation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("rules.json");

        let mut rules = RuleStore::new();
        rules.add_pattern(RuleKind::Include, "src/**/*.tsx");
        rules.add_pattern(RuleKind::Include, "lib/**/*.ts");
        rules.add_pattern(RuleKind::AutoInclude, "src/**/*.config.ts");
        rules.add_pattern(RuleKind::Exclude, "node_modules/**/*");
        save_rules(&path, &rules).unwrap();

        let back = load_rules(&path);
        assert_eq!(back, rules);
        assert_eq!(back.patterns(RuleKind::Include), ["src/**/*.tsx", "lib/**/*.ts"]);
    }

    #[test]
    fn missing_file_is_empty_store() {
        let tmp = TempDir::new().unwrap();
        assert!(load_rules(&tmp.path().join("rules.json")).is_empty());
    }

    #[test]
    fn corrupt_file_is_empty_store() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rules.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(load_rules(&path).is_empty());
    }
}
