use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

/// One codebase file as the resolver sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedFile {
    /// Repo-relative path with `/` separators.
    pub path: String,
    pub tokens: usize,
}

/// The codebase file listing: `(path, token estimate)` pairs.
///
/// Supplied by the scanner or built directly. Order is kept as given and
/// becomes the snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseListing {
    files: Vec<ListedFile>,
}

impl CodebaseListing {
    pub fn new(files: Vec<ListedFile>) -> Self {
        let files = files
            .into_iter()
            .map(|f| ListedFile {
                path: normalize_path(&f.path),
                tokens: f.tokens,
            })
            .collect();
        Self { files }
    }

    pub fn files(&self) -> &[ListedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.files.iter().map(|f| f.tokens).sum()
    }

    /// Content hash over every (path, tokens) pair in order; the listing's
    /// version for cache invalidation.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Xxh3::new();
        for f in &self.files {
            h.update(f.path.as_bytes());
            h.update(&[0]);
            h.update(&(f.tokens as u64).to_le_bytes());
        }
        h.digest()
    }
}

impl<P: Into<String>> FromIterator<(P, usize)> for CodebaseListing {
    fn from_iter<I: IntoIterator<Item = (P, usize)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(path, tokens)| ListedFile {
                    path: path.into(),
                    tokens,
                })
                .collect(),
        )
    }
}

/// `\` to `/` and no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    let mut s = p.as_str();
    while let Some(rest) = s.strip_prefix("./") {
        s = rest;
    }
    s.to_string()
}
