use anyhow::Result;
use std::path::Path;

use crate::resolver::ContextSnapshot;
use crate::xml_builder::build_context_xml;

/// Read every snapshot file under `repo_root` and render the context payload.
///
/// Files that disappeared or cannot be read since the scan are skipped.
pub fn snapshot_to_xml(repo_root: &Path, snapshot: &ContextSnapshot) -> Result<String> {
    let mut files: Vec<(String, usize, String)> = Vec::with_capacity(snapshot.len());

    for f in &snapshot.files {
        let bytes = match std::fs::read(repo_root.join(&f.path)) {
            Ok(b) => b,
            Err(_e) => {
                crate::debug_log!("[ctxsteer] payload: skipping {}: {_e}", f.path);
                continue;
            }
        };
        let content = String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).to_string());
        files.push((f.path.clone(), f.tokens, content));
    }

    build_context_xml(&files)
}
