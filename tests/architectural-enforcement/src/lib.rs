//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep the client's production code honest:
//! - No thread-blocking sleeps or blocking HTTP inside the async runtime
//! - No blocking sockets in the transport
//! - No `unwrap()`/`expect()` outside test code
//!
//! The helpers here only read files; the policies live under `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["counsel/core/src", "counsel/cli/src"];

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// A forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub file: PathBuf,
    pub line: usize,
    pub pattern: &'static str,
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: `{}` in: {}",
            self.file.display(),
            self.line,
            self.pattern,
            self.text
        )
    }
}

/// Code lines of `source` that are not test code
///
/// Stops at the first `#[cfg(test)]` (test modules sit at the bottom of
/// each file), drops comment lines and strips trailing `//` comments.
/// Line numbers are 1-based.
pub fn production_lines(source: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }

        let code = match line.find("//") {
            // Keep `//` inside string literals such as URLs
            Some(pos) if !line[..pos].contains('"') => &line[..pos],
            _ => line,
        };
        if !code.trim().is_empty() {
            lines.push((index + 1, code));
        }
    }

    lines
}

/// Scan every `.rs` file under `dirs` for any of `patterns`
pub fn scan(dirs: &[&str], patterns: &[&'static str]) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in dirs {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }

        for entry in WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        {
            let Ok(source) = fs::read_to_string(entry.path()) else {
                continue;
            };
            let file = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();
            check_source(&file, &source, patterns, &mut violations);
        }
    }

    violations
}

fn check_source(
    file: &Path,
    source: &str,
    patterns: &[&'static str],
    violations: &mut Vec<Violation>,
) {
    for (line, code) in production_lines(source) {
        for pattern in patterns {
            if code.contains(pattern) {
                violations.push(Violation {
                    file: file.to_path_buf(),
                    line,
                    pattern,
                    text: code.trim().to_string(),
                });
            }
        }
    }
}

/// Print violations in the usual format and panic if there are any
pub fn report(violations: &[Violation], title: &str, acceptable: &[&str]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ CRITICAL: {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }

    if !acceptable.is_empty() {
        eprintln!("\n✅ ACCEPTABLE alternatives:");
        for alternative in acceptable {
            eprintln!("  - {alternative}");
        }
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let source = "fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(1, "fn a() {}")]);
    }

    #[test]
    fn test_production_lines_skip_comments() {
        let source = "/// docs with x.unwrap()\n// note\nlet a = 1; // trailing .unwrap()\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(3, "let a = 1; ")]);
    }

    #[test]
    fn test_production_lines_keep_urls() {
        let source = "let url = \"http://localhost:8000\";\n";
        let lines = production_lines(source);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].1.contains("localhost"));
    }

    #[test]
    fn test_check_source_reports_line_numbers() {
        let mut violations = Vec::new();
        check_source(
            Path::new("x.rs"),
            "fn a() {}\nfn b() { std::thread::sleep(d); }\n",
            &["std::thread::sleep"],
            &mut violations,
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 2);
    }

    #[test]
    fn test_workspace_root_contains_production_dirs() {
        let root = workspace_root();
        for dir in PRODUCTION_DIRS {
            assert!(root.join(dir).is_dir(), "missing {dir}");
        }
    }
}
