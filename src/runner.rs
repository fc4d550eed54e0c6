use crate::cli::RunConfig;
use crate::invoke;
use crate::testfile;
use crate::verify;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// File extension of compiler test sources.
pub const TEST_EXTENSION: &str = "wiz";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTally {
    pub passed: u32,
    pub failed: u32,
}

/// Run every discovered test against every system it declares.
///
/// All test files are parsed up front so a malformed annotation aborts the
/// run before any PASSED/FAILED line is printed. Per-test output goes to
/// stdout, summary counts to stderr.
pub fn run(config: &RunConfig) -> anyhow::Result<RunTally> {
    let files = collect_test_files(&config.paths)?;

    let mut tests = Vec::with_capacity(files.len());
    for file in &files {
        tests.push(testfile::read_test_file(file)?);
    }

    let mut tally = RunTally::default();
    for test in &tests {
        let mut all_passed = true;
        for system in &test.systems {
            let result = invoke::invoke(&config.compiler, &test.filename, system, &config.bin_dir)?;
            let failures = if test.blocks.is_empty() {
                verify::verify_diagnostics(test, &result)
            } else {
                verify::verify_blocks(test, &result, config.mismatch_limit)
            };

            if failures.is_empty() {
                tally.passed += 1;
            } else {
                tally.failed += 1;
                all_passed = false;
                println!("{} {system}: FAILED", test.filename.display());
                for failure in &failures {
                    println!("\t{}", failure.trim_end().replace('\n', "\n\t"));
                }
            }
        }
        println!(
            "{}: {}",
            test.filename.display(),
            if all_passed { "PASSED" } else { "FAILED" }
        );
    }

    eprintln!("{} tests passed", tally.passed);
    if tally.failed > 0 {
        eprintln!("{} TESTS FAILED", tally.failed);
    }
    Ok(tally)
}

/// Expand the positional arguments into the list of test files to run.
/// Directories are walked recursively in sorted order; `.wiz` files whose
/// names start with an underscore are skipped. Explicit file arguments are
/// taken as-is.
pub fn collect_test_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_from_directory(path, &mut files)?;
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn collect_from_directory(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            collect_from_directory(&entry, files)?;
        } else if is_test_file(&entry) {
            files.push(entry);
        }
    }
    Ok(())
}

fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    !name.starts_with('_') && path.extension().is_some_and(|ext| ext == TEST_EXTENSION)
}
