use crate::verify;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "wiztest", version, about = "conformance test harness for the wiz compiler")]
pub struct Args {
    /// location of the wiz executable
    #[arg(short = 'w', long = "wiz")]
    pub wiz: PathBuf,

    /// directory where output binaries are written
    #[arg(short = 'b', long = "bin-dir")]
    pub bin_dir: PathBuf,

    /// show every mismatch in a block test instead of the first few
    #[arg(short = 'a', long = "all-mismatches")]
    pub all_mismatches: bool,

    /// test files or directories
    /// (when a directory is given, filenames starting with an underscore are skipped)
    #[arg(value_name = "TEST", required = true)]
    pub tests: Vec<PathBuf>,
}

/// Everything the driver needs for one run, assembled from validated
/// arguments and threaded through explicitly.
#[derive(Debug)]
pub struct RunConfig {
    pub compiler: PathBuf,
    pub bin_dir: PathBuf,
    pub mismatch_limit: usize,
    pub paths: Vec<PathBuf>,
}

/// Single validation pass over the parsed arguments. Collects every
/// problem before failing so a bad invocation is reported all at once.
pub fn validate(args: &Args) -> anyhow::Result<RunConfig> {
    let mut problems = Vec::new();

    if !args.bin_dir.is_dir() {
        problems.push(format!("{} is not a directory", args.bin_dir.display()));
    } else if !directory_is_writable(&args.bin_dir) {
        problems.push(format!("{} is not writable", args.bin_dir.display()));
    }

    for path in &args.tests {
        if !path.exists() {
            problems.push(format!("{} does not exist", path.display()));
        }
    }

    if !problems.is_empty() {
        anyhow::bail!("{}", problems.join("\n"));
    }

    Ok(RunConfig {
        compiler: args.wiz.clone(),
        bin_dir: args.bin_dir.clone(),
        mismatch_limit: if args.all_mismatches {
            usize::MAX
        } else {
            verify::DEFAULT_MISMATCH_LIMIT
        },
        paths: args.tests.clone(),
    })
}

fn directory_is_writable(dir: &Path) -> bool {
    let probe = dir.join(".wiztest-write-probe");
    match fs::write(&probe, b"") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let uniq = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("wiztest-cli-{label}-{uniq}"));
        fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn args_for(bin_dir: PathBuf, tests: Vec<PathBuf>) -> Args {
        Args {
            wiz: PathBuf::from("wiz"),
            bin_dir,
            all_mismatches: false,
            tests,
        }
    }

    #[test]
    fn accepts_a_writable_bin_dir() {
        let dir = temp_dir("ok");
        let test = dir.join("demo.wiz");
        fs::write(&test, "").expect("write");

        let config = validate(&args_for(dir.clone(), vec![test])).expect("validate");
        assert_eq!(config.mismatch_limit, verify::DEFAULT_MISMATCH_LIMIT);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn all_mismatches_lifts_the_display_limit() {
        let dir = temp_dir("lift");
        let test = dir.join("demo.wiz");
        fs::write(&test, "").expect("write");

        let mut args = args_for(dir.clone(), vec![test]);
        args.all_mismatches = true;
        let config = validate(&args).expect("validate");
        assert_eq!(config.mismatch_limit, usize::MAX);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn reports_every_problem_at_once() {
        let dir = temp_dir("bad");
        let missing_dir = dir.join("no-such-dir");
        let missing_test = dir.join("no-such-test.wiz");

        let err = validate(&args_for(missing_dir.clone(), vec![missing_test.clone()]))
            .expect_err("must fail");
        let message = err.to_string();
        assert!(message.contains(&format!("{} is not a directory", missing_dir.display())));
        assert!(message.contains(&format!("{} does not exist", missing_test.display())));

        let _ = fs::remove_dir_all(dir);
    }
}
