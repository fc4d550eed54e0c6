use crate::invoke::InvocationResult;
use crate::testfile::{BlockExpectation, TestFile};
use std::collections::BTreeSet;
use std::fs;

/// How many per-byte mismatches to print per block before summarizing.
pub const DEFAULT_MISMATCH_LIMIT: usize = 6;

/// Compare the produced binary against the test's block expectations.
/// An empty result means the pair passed.
pub fn verify_blocks(test: &TestFile, result: &InvocationResult, limit: usize) -> Vec<String> {
    let mut failures = Vec::new();

    if result.exit_code != 0 {
        failures.push(format!("wiz returned failure code {}", result.exit_code));
        failures.push(format!("> {}", result.command_line));
        if !result.stdout_text.is_empty() {
            failures.push(result.stdout_text.clone());
        }
        if !result.stderr_text.is_empty() {
            failures.push(result.stderr_text.clone());
        }
        return failures;
    }

    let bin = result.output_path.display();
    let output = match fs::read(&result.output_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            failures.push(format!("{bin}: {err}"));
            return failures;
        }
    };

    let expected_length = test
        .blocks
        .iter()
        .map(BlockExpectation::end)
        .max()
        .unwrap_or(0);
    if output.len() < expected_length {
        failures.push(format!(
            "{bin}: expected at least {expected_length} bytes in output file"
        ));
        return failures;
    }

    for block in &test.blocks {
        let actual = &output[block.address..block.end()];
        if actual == block.data.as_slice() {
            continue;
        }
        let mut mismatches = 0usize;
        for (offset, (&expected, &got)) in block.data.iter().zip(actual).enumerate() {
            if expected != got {
                if mismatches < limit {
                    failures.push(format!(
                        "{bin} 0x{:06x}: expected 0x{expected:02x} got 0x{got:02x}",
                        block.address + offset
                    ));
                }
                mismatches += 1;
            }
        }
        if mismatches > limit {
            failures.push(format!("+ {} more incorrect bytes", mismatches - limit));
        }
    }

    failures
}

/// Compare the diagnostic lines on stderr against the test's expected
/// error and reference line sets.
pub fn verify_diagnostics(test: &TestFile, result: &InvocationResult) -> Vec<String> {
    let mut failures = Vec::new();

    if result.exit_code == 0 {
        failures.push("wiz unexpectedly succeeded on an error test".to_owned());
        failures.push(format!("> {}", result.command_line));
        return failures;
    }

    let path = test.filename.display().to_string();
    let mut given_errors = BTreeSet::new();
    let mut given_references = BTreeSet::new();
    for line in result.stderr_text.lines() {
        match match_diagnostic(line, &path) {
            Some((lineno, Severity::Error)) => {
                given_errors.insert(lineno);
            }
            Some((lineno, Severity::Note)) => {
                given_references.insert(lineno);
            }
            None => {}
        }
    }

    report_set_difference(&mut failures, "error", &test.errors, &given_errors);
    report_set_difference(&mut failures, "note", &test.references, &given_references);
    failures
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Error,
    Note,
}

/// Match a stderr line of the form `<path>:<line>: error: ...` or
/// `<path>:<line>: note: ...`. The path must equal the test file path
/// exactly and the match is anchored to the start of the line.
fn match_diagnostic(line: &str, path: &str) -> Option<(usize, Severity)> {
    let rest = line.strip_prefix(path)?.strip_prefix(':')?;
    let digits = rest.split(|c: char| !c.is_ascii_digit()).next()?;
    if digits.is_empty() {
        return None;
    }
    let lineno: usize = digits.parse().ok()?;
    let rest = &rest[digits.len()..];
    if rest.starts_with(": error:") {
        Some((lineno, Severity::Error))
    } else if rest.starts_with(": note:") {
        Some((lineno, Severity::Note))
    } else {
        None
    }
}

fn report_set_difference(
    failures: &mut Vec<String>,
    severity: &str,
    expected: &BTreeSet<usize>,
    given: &BTreeSet<usize>,
) {
    let mut missing: Vec<usize> = expected.difference(given).copied().collect();
    missing.reverse();
    if !missing.is_empty() {
        failures.push(set_message("missing expected", severity, &missing));
    }

    let mut unexpected: Vec<usize> = given.difference(expected).copied().collect();
    unexpected.reverse();
    if !unexpected.is_empty() {
        failures.push(set_message("unexpected", severity, &unexpected));
    }
}

fn set_message(prefix: &str, severity: &str, lines: &[usize]) -> String {
    let list = lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if lines.len() == 1 {
        format!("{prefix} {severity} on line {list}")
    } else {
        format!("{prefix} {severity}s on lines {list}")
    }
}
