use anyhow::Context;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured outcome of one compiler run. Consumed by a verifier right after
/// the subprocess exits, never kept around.
#[derive(Debug)]
pub struct InvocationResult {
    pub exit_code: i32,
    pub stdout_text: String,
    pub stderr_text: String,
    pub output_path: PathBuf,
    pub command_line: String,
}

/// Run the compiler for one (test, system) pair, blocking until it exits.
///
/// A non-zero exit code is a normal result and never an `Err`; error tests
/// rely on it. Only a failure to launch the process at all is propagated.
pub fn invoke(
    compiler: &Path,
    test_path: &Path,
    system: &str,
    bin_dir: &Path,
) -> anyhow::Result<InvocationResult> {
    let output_path = output_path_for(bin_dir, test_path, system);
    let output = Command::new(compiler)
        .arg("--system")
        .arg(system)
        .arg("-o")
        .arg(&output_path)
        .arg(test_path)
        .output()
        .with_context(|| format!("failed to launch compiler {}", compiler.display()))?;

    Ok(InvocationResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout_text: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr_text: String::from_utf8_lossy(&output.stderr).into_owned(),
        command_line: render_command_line(compiler, test_path, system, &output_path),
        output_path,
    })
}

/// `<bin_dir>/<test-basename>.<system>.bin`; the binary is left in place
/// after the run for inspection.
pub fn output_path_for(bin_dir: &Path, test_path: &Path, system: &str) -> PathBuf {
    let stem = test_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("test");
    bin_dir.join(format!("{stem}.{system}.bin"))
}

fn render_command_line(
    compiler: &Path,
    test_path: &Path,
    system: &str,
    output_path: &Path,
) -> String {
    [
        compiler.display().to_string(),
        "--system".to_owned(),
        system.to_owned(),
        "-o".to_owned(),
        output_path.display().to_string(),
        test_path.display().to_string(),
    ]
    .into_iter()
    .map(quote_argument)
    .collect::<Vec<_>>()
    .join(" ")
}

fn quote_argument(argument: String) -> String {
    let needs_quoting = argument.is_empty()
        || argument
            .chars()
            .any(|c| c.is_whitespace() || "'\"\\$`*?#;&|<>()".contains(c));
    if needs_quoting {
        format!("'{}'", argument.replace('\'', "'\\''"))
    } else {
        argument
    }
}
