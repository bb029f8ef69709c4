//! Static file resolution.
//!
//! # Responsibilities
//! - Map a request path to a file under the root directory
//! - Resolve directories to their `index.html`
//! - Report a miss as `Resolution::Pass` so the proxy stage can take over
//!
//! # Design Decisions
//! - Traversal outside the root (`..`, symlinks) is treated as a miss, never
//!   as an error; the request simply falls through
//! - Dotfiles and dot-directories (`.env`, `.git/`) are never served; they
//!   pass through like any other miss
//! - Only resolution lives here; `ServeFile` produces the response headers

use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use tokio::fs;

/// Name of the file served for directory requests.
pub const INDEX_FILE: &str = "index.html";

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A readable file that should be served.
    Hit(PathBuf),

    /// A directory with an index, requested without a trailing slash.
    /// Carries the path the client should be redirected to.
    Redirect(String),

    /// Nothing to serve; continue down the pipeline.
    Pass,
}

/// Resolves request paths against a fixed root directory.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    root: PathBuf,
}

impl StaticResolver {
    /// Create a resolver for `root`. The root must exist.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a raw (still percent-encoded) URI path.
    pub async fn resolve(&self, uri_path: &str) -> Resolution {
        let Some(candidate) = self.candidate(uri_path) else {
            return Resolution::Pass;
        };

        let metadata = match fs::metadata(&candidate).await {
            Ok(metadata) => metadata,
            Err(_) => return Resolution::Pass,
        };

        let file = if metadata.is_dir() {
            let index = candidate.join(INDEX_FILE);
            if !is_file(&index).await {
                return Resolution::Pass;
            }
            if !uri_path.ends_with('/') {
                return Resolution::Redirect(format!("{uri_path}/"));
            }
            index
        } else if metadata.is_file() {
            candidate
        } else {
            return Resolution::Pass;
        };

        // Symlinks may point anywhere; only serve what stays under the root.
        let canonical = match fs::canonicalize(&file).await {
            Ok(path) if path.starts_with(&self.root) => path,
            _ => return Resolution::Pass,
        };

        if fs::File::open(&canonical).await.is_err() {
            return Resolution::Pass;
        }

        Resolution::Hit(canonical)
    }

    /// Join the decoded path segments onto the root, rejecting traversal.
    fn candidate(&self, uri_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
        let mut path = self.root.clone();

        for segment in decoded.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s if s.starts_with('.') => return None,
                s if s.contains('\\') || s.contains('\0') => return None,
                s => path.push(s),
            }
        }

        Some(path)
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
