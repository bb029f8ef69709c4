//! Watcher exclusions.

use std::path::{Component, Path};

/// Folders the watcher never reports, whatever the user passes.
pub const DEFAULT_IGNORES: [&str; 4] = ["node_modules", ".git", ".idea", ".vscode"];

/// Read-only set of exclusion patterns: the defaults followed by user patterns.
///
/// A pattern matches a root-relative path when it
/// - equals one of the path's components (`dist`),
/// - is a leading sub-path of it (`assets/vendor`), or
/// - contains `*`/`?` and matches the whole path (`dist/*`) or, for patterns
///   without `/`, any single component (`*.map`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreSet {
    patterns: Vec<String>,
}

impl IgnoreSet {
    pub fn new(user: &[String]) -> Self {
        let patterns = DEFAULT_IGNORES
            .iter()
            .map(|p| p.to_string())
            .chain(user.iter().map(|p| normalize(p)))
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether `relative` (relative to the watched root) is excluded.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let joined = components.join("/");

        self.patterns
            .iter()
            .any(|pattern| matches_pattern(pattern, &components, &joined))
    }
}

fn normalize(pattern: &str) -> String {
    pattern
        .trim()
        .trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}

fn matches_pattern(pattern: &str, components: &[String], joined: &str) -> bool {
    let is_glob = pattern.contains('*') || pattern.contains('?');
    let has_slash = pattern.contains('/');

    match (is_glob, has_slash) {
        (false, false) => components.iter().any(|c| c == pattern),
        (false, true) => joined == pattern || joined.starts_with(&format!("{pattern}/")),
        (true, false) => components.iter().any(|c| wildcard(pattern, c)),
        (true, true) => wildcard(pattern, joined),
    }
}

/// `*` matches any run of characters, `?` exactly one.
fn wildcard(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(user: &[&str]) -> IgnoreSet {
        IgnoreSet::new(&user.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn defaults_come_first() {
        let ignore = set(&["dist"]);
        assert_eq!(
            ignore.patterns(),
            &["node_modules", ".git", ".idea", ".vscode", "dist"]
        );
    }

    #[test]
    fn default_folders_are_ignored_at_any_depth() {
        let ignore = set(&[]);
        assert!(ignore.is_ignored(Path::new("node_modules/lib/index.js")));
        assert!(ignore.is_ignored(Path::new("packages/a/node_modules/x.js")));
        assert!(ignore.is_ignored(Path::new(".git/HEAD")));
        assert!(!ignore.is_ignored(Path::new("src/app.js")));
    }

    #[test]
    fn sub_path_patterns_match_prefix_only() {
        let ignore = set(&["./assets/vendor/"]);
        assert!(ignore.is_ignored(Path::new("assets/vendor/jquery.js")));
        assert!(!ignore.is_ignored(Path::new("assets/vendor.js")));
        assert!(!ignore.is_ignored(Path::new("lib/assets/vendor/x.js")));
    }

    #[test]
    fn glob_patterns() {
        let ignore = set(&["*.min.js", "build/*"]);
        assert!(ignore.is_ignored(Path::new("js/app.min.js")));
        assert!(!ignore.is_ignored(Path::new("js/app.js")));
        assert!(ignore.is_ignored(Path::new("build/index.html")));
        assert!(!ignore.is_ignored(Path::new("src/build.html")));
    }

    #[test]
    fn wildcard_edge_cases() {
        assert!(wildcard("*", ""));
        assert!(wildcard("a?c", "abc"));
        assert!(!wildcard("a?c", "ac"));
        assert!(wildcard("*b*", "abc"));
        assert!(!wildcard("*.css", "style.css.map"));
    }
}
