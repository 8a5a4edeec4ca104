//! Architectural Enforcement
//!
//! Source scanners used by this package's integration tests to hold the
//! headless core to its rules:
//! - No blocking I/O (file, network, thread sleep) in production code
//! - No UI framework dependencies
//! - No `unwrap()`/`expect()` shortcuts outside tests
//!
//! Scanning is textual. Comment lines are skipped, and everything after the
//! first `#[cfg(test)]` in a file is treated as test code.

use std::fs;
use std::path::{Path, PathBuf};

/// One forbidden pattern
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Substring that must not appear
    pub pattern: &'static str,
    /// Why it is flagged, shown in the report
    pub reason: &'static str,
}

/// A rule hit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the hit
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
    /// Rule reason
    pub reason: &'static str,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.reason,
            self.text
        )
    }
}

/// Blocking calls the async core must not make
pub const BLOCKING_IO: &[Rule] = &[
    Rule {
        pattern: "std::fs",
        reason: "Blocking file I/O",
    },
    Rule {
        pattern: "std::net",
        reason: "Blocking network I/O",
    },
    Rule {
        pattern: "reqwest::blocking",
        reason: "Blocking HTTP client",
    },
    Rule {
        pattern: "thread::sleep",
        reason: "Blocking sleep",
    },
];

/// UI crates the headless core must not touch
pub const UI_FRAMEWORKS: &[Rule] = &[
    Rule {
        pattern: "ratatui",
        reason: "UI framework in core",
    },
    Rule {
        pattern: "crossterm",
        reason: "Terminal framework in core",
    },
];

/// Panicking shortcuts
pub const PANICKING: &[Rule] = &[
    Rule {
        pattern: ".unwrap()",
        reason: "unwrap() in production code",
    },
    Rule {
        pattern: ".expect(",
        reason: "expect() in production code",
    },
];

/// Path of a workspace directory, relative to the workspace root
pub fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

/// All `.rs` files under `dir`
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Check production lines of `source` against `rules`
pub fn scan_source(path: &Path, source: &str, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }
        // Trailing comments are not code
        let code = trimmed.split(" //").next().unwrap_or(trimmed);
        for rule in rules {
            if code.contains(rule.pattern) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    text: trimmed.to_string(),
                    reason: rule.reason,
                });
            }
        }
    }
    violations
}

/// Check every Rust file under `dir` against `rules`
pub fn scan_dir(dir: &Path, rules: &[Rule]) -> Vec<Violation> {
    rust_files(dir)
        .iter()
        .filter_map(|path| fs::read_to_string(path).ok().map(|s| (path, s)))
        .flat_map(|(path, source)| scan_source(path, &source, rules))
        .collect()
}

/// Print violations and fail the test if there are any
pub fn assert_clean(what: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {what}:");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!("\nFound {} violation(s): {what}", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_and_tests_are_skipped() {
        let source = "\
//! Uses std::fs in docs only
fn ok() {
    let x = y.unwrap_or(1); // not .unwrap()
}
#[cfg(test)]
mod tests {
    fn t() { std::fs::read(\"x\").unwrap(); }
}
";
        let hits = scan_source(Path::new("a.rs"), source, &[BLOCKING_IO, PANICKING].concat());
        assert!(hits.is_empty(), "{hits:?}");
    }

    #[test]
    fn test_production_hits_are_reported() {
        let source = "use std::fs;\nfn f() { let v = g().expect(\"boom\"); }\n";
        let hits = scan_source(Path::new("b.rs"), source, &[BLOCKING_IO, PANICKING].concat());

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].line, 1);
        assert_eq!(hits[0].reason, "Blocking file I/O");
        assert_eq!(hits[1].line, 2);
        assert_eq!(hits[1].reason, "expect() in production code");
    }
}
