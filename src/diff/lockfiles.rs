//! Lock-file detection.
//!
//! Dependency-manager lock files are regenerated mechanically and carry no
//! intent worth describing, so they are excluded from generation input.

use std::collections::HashSet;

/// Base names of well-known lock files across package ecosystems.
pub const DEFAULT_LOCK_FILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "Gemfile.lock",
    "composer.lock",
    "poetry.lock",
    "Pipfile.lock",
    "uv.lock",
    "pdm.lock",
    "go.sum",
    "mix.lock",
    "pubspec.lock",
    "Podfile.lock",
    "Package.resolved",
    "flake.lock",
    "packages.lock.json",
    "gradle.lockfile",
];

/// Immutable set of lock-file rules injected into the parser.
#[derive(Debug, Clone)]
pub struct LockFilePolicy {
    names: HashSet<String>,
    match_lock_suffix: bool,
}

impl Default for LockFilePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_FILES.iter().copied(), true)
    }
}

impl LockFilePolicy {
    /// Builds a policy from exact base names, optionally also matching any
    /// `*.lock` file.
    pub fn new<I, S>(names: I, match_lock_suffix: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            match_lock_suffix,
        }
    }

    /// Returns true when the base name of `path` is a known lock file.
    pub fn is_lock_file(&self, path: &str) -> bool {
        let base = path.rsplit('/').next().unwrap_or(path);
        if base.is_empty() {
            return false;
        }
        self.names.contains(base) || (self.match_lock_suffix && base.ends_with(".lock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_lock_files() {
        let policy = LockFilePolicy::default();
        assert!(policy.is_lock_file("Cargo.lock"));
        assert!(policy.is_lock_file("frontend/package-lock.json"));
        assert!(policy.is_lock_file("deep/nested/go.sum"));
        assert!(policy.is_lock_file("pnpm-lock.yaml"));
    }

    #[test]
    fn test_generic_lock_suffix() {
        let policy = LockFilePolicy::default();
        assert!(policy.is_lock_file("tools/custom.lock"));
    }

    #[test]
    fn test_base_name_must_match_exactly() {
        let policy = LockFilePolicy::default();
        assert!(!policy.is_lock_file("src/main.rs"));
        assert!(!policy.is_lock_file("docs/Cargo.lock.md"));
        assert!(!policy.is_lock_file("my-package-lock.json"));
        assert!(!policy.is_lock_file("Cargo.lock/"));
    }

    #[test]
    fn test_custom_policy_without_suffix() {
        let policy = LockFilePolicy::new(["deps.txt"], false);
        assert!(policy.is_lock_file("a/deps.txt"));
        assert!(!policy.is_lock_file("custom.lock"));
        assert!(!policy.is_lock_file("Cargo.lock"));
    }
}
