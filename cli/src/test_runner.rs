use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use interpreter::RuntimeValue;
use stencil::{CopyError, split_lines};

use crate::render;

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Template arguments: `path` (defaults to the fixture's directory) and `files`.
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub files: Vec<String>,

    /// Extra globals, layered over the standard template globals.
    #[serde(default)]
    pub globals: toml::Table,

    /// Expected exact output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected copy error: the error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If set, the error must point at this 1-based template line.
    #[serde(default)]
    pub expect_error_line: Option<usize>,
}

fn toml_to_runtime(val: &toml::Value) -> RuntimeValue {
    match val {
        toml::Value::Integer(n) => RuntimeValue::Number(*n as f64),
        toml::Value::Float(f) => RuntimeValue::Number(*f),
        toml::Value::Boolean(b) => RuntimeValue::Boolean(*b),
        toml::Value::String(s) => RuntimeValue::String(s.clone()),
        toml::Value::Array(items) => RuntimeValue::List(items.iter().map(toml_to_runtime).collect()),
        toml::Value::Table(table) => RuntimeValue::Dict(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_runtime(v)))
                .collect(),
        ),
        other => RuntimeValue::String(other.to_string()),
    }
}

/// Parse a `.test.txt` file into its TOML config and template text.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let template = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, template))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    // 1. Read file
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    // 2. Parse frontmatter
    let (config, template) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    // 3. Bind globals; fixtures may scan files next to themselves
    let base_dir = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string());
    let mut globals =
        render::template_globals(config.path.as_deref().unwrap_or(&base_dir), &config.files);
    for (name, value) in &config.globals {
        globals.insert(name.clone(), toml_to_runtime(value));
    }

    // 4. Copy
    let copier = match render::copier() {
        Ok(copier) => copier,
        Err(e) => return fail(description, format!("bad patterns: {}", e)),
    };
    let template = render::normalize_newlines(template);
    let result = copier.copy(&split_lines(&template), &globals);

    // 5. Check error/output expectations
    let outcome = match (&config.expect_error, &config.expect_output, result) {
        (Some(expected_err), _, Err(copy_err)) => check_error(expected_err, config.expect_error_line, &copy_err),
        (Some(expected_err), _, Ok(_)) => Some(format!(
            "expected error containing \"{}\", but the copy succeeded",
            expected_err
        )),
        (None, Some(expected_output), Ok(copied)) => {
            let actual = copied.concat();
            let actual_trimmed = actual.trim();
            let expected_trimmed = expected_output.trim();
            if actual_trimmed == expected_trimmed {
                None
            } else {
                Some(format!(
                    "output mismatch\n  expected:\n{}\n  actual:\n{}",
                    indent(expected_trimmed),
                    indent(actual_trimmed)
                ))
            }
        }
        (None, _, Err(copy_err)) => Some(format!("unexpected error: {}", copy_err)),
        (None, None, Ok(_)) => None,
    };

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: match outcome {
            Some(reason) => TestOutcome::Fail(reason),
            None => TestOutcome::Pass,
        },
    }
}

/// Check a copy error against expectations. Returns `Some(reason)` on mismatch.
fn check_error(expected: &str, expected_line: Option<usize>, error: &CopyError) -> Option<String> {
    let message = error.to_string();
    if !message.contains(expected) {
        return Some(format!(
            "expected error containing \"{}\", got: {}",
            expected, message
        ));
    }
    let expected_line = expected_line?;
    match error.lines() {
        Some(lines) if lines.start + 1 == expected_line => None,
        Some(lines) => Some(format!(
            "expected error on line {}, but it points at line {}",
            expected_line,
            lines.start + 1
        )),
        None => Some(format!(
            "expected error on line {}, but the error has no location",
            expected_line
        )),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

const FIXTURE_SUFFIX: &str = ".test.txt";

/// Fixtures grouped by the subfolder they live in, relative to `root`.
/// Files directly in `root` land in category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_fixture(&path) {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                categories.entry(category).or_default().push(path);
            }
        }
    }
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn is_fixture(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(FIXTURE_SUFFIX))
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// ANSI styling, or none with `--no-color`.
struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

/// Pick the categories to run; unknown names are reported and skipped.
fn select<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }
    let mut selected = BTreeMap::new();
    for wanted in requested {
        let wanted = wanted.trim_matches('/');
        let before = selected.len();
        for (category, files) in all {
            let nested = category
                .strip_prefix(wanted)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
            if nested {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                wanted,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run all fixtures under `path` (or a single fixture file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { color: !no_color };

    let single;
    let all;
    let groups: BTreeMap<&str, &[PathBuf]> = if path.is_file() {
        single = [path.to_path_buf()];
        BTreeMap::from([("", &single[..])])
    } else {
        all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        select(&all, categories)
    };
    if groups.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &groups {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }
        for file in files.iter() {
            let result = run_single_test(file);
            let label = result.description.clone().unwrap_or_else(|| {
                file.file_name()
                    .and_then(|s| s.to_str())
                    .map(|s| s.trim_end_matches(FIXTURE_SUFFIX).to_string())
                    .unwrap_or_else(|| "?".to_string())
            });
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), label);
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), label);
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
---
description = \"loop over files\"
files = [\"a.txt\", \"b.txt\"]
expect_output = \"\"\"
- a.txt
- b.txt
\"\"\"
---
#> for f in files:
- `f`
#<
";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn frontmatter_splits_config_from_template() {
        let (config, template) = parse_test_file(FIXTURE).unwrap();
        assert_eq!(config.description.as_deref(), Some("loop over files"));
        assert_eq!(config.files, vec!["a.txt", "b.txt"]);
        assert!(template.starts_with("#> for f in files:\n"));
        assert!(parse_test_file("no frontmatter").is_err());
    }

    #[test]
    fn passing_and_failing_fixtures() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let good = write(dir.path(), "good.test.txt", FIXTURE);
        assert!(matches!(run_single_test(&good).outcome, TestOutcome::Pass));

        let wrong = write(
            dir.path(),
            "wrong.test.txt",
            "---\nexpect_output = \"2\"\n[globals]\nx = 2\n---\n`x + 1`\n",
        );
        let TestOutcome::Fail(reason) = run_single_test(&wrong).outcome else {
            panic!("expected a failure");
        };
        assert!(reason.contains("output mismatch"));
    }

    #[test]
    fn expected_errors_check_message_and_line() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let fixture = write(
            dir.path(),
            "err.test.txt",
            "---\nexpect_error = \"never closed\"\nexpect_error_line = 2\n---\nfine\n#> if True:\nbody\n",
        );
        assert!(matches!(run_single_test(&fixture).outcome, TestOutcome::Pass));

        let misplaced = write(
            dir.path(),
            "line.test.txt",
            "---\nexpect_error = \"never closed\"\nexpect_error_line = 1\n---\nfine\n#> if True:\nbody\n",
        );
        assert!(matches!(run_single_test(&misplaced).outcome, TestOutcome::Fail(_)));
    }

    #[test]
    fn fixtures_are_grouped_by_folder() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "top.test.txt", FIXTURE);
        write(dir.path(), "loops/for.test.txt", FIXTURE);
        write(dir.path(), "loops/notes.txt", "ignored");
        let categories = discover_categorized(dir.path());
        assert_eq!(categories.keys().collect::<Vec<_>>(), vec!["", "loops"]);
        assert_eq!(categories["loops"].len(), 1);

        let only_loops = select(&categories, &["loops/".to_string()]);
        assert_eq!(only_loops.keys().copied().collect::<Vec<_>>(), vec!["loops"]);
        assert_eq!(run_tests(dir.path(), true, &[]), 0);
    }

    #[test]
    fn bundled_fixtures_pass() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        assert_eq!(run_tests(&fixtures, true, &[]), 0);
    }
}
