//! Unit tests for the CLI runtime.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

/// A single BlankOBF base64 layer around `print('cli')`.
const SAMPLE: &str = "import base64\n\
    _1 = 'Jzo6IFlvdSBtYW5hZ2VkIHRvIGJyZWFr'\n\
    _2 = 'IHRocm91Z2ggQmxhbmtPQkYgdjI7IEdp'\n\
    _3 = 'dmUgeW91cnNlbGYgYSBwYXQgb24geW91'\n\
    _4 = 'ciBiYWNrISA6OicKcHJpbnQoJ2NsaScp'\n\
    exec(base64.b64decode(_1 + _2 + _3 + _4))\n";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write input");
        path
    }
}

#[fixture]
fn workspace() -> Workspace {
    Workspace {
        dir: TempDir::new().expect("temporary directory"),
    }
}

struct Outcome {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke<const N: usize>(args: [&OsString; N]) -> Outcome {
    let mut argv = vec![OsString::from("pydeobf")];
    argv.extend(args.into_iter().cloned());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = run(argv, &mut stdout, &mut stderr);
    Outcome {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
    }
}

fn arg(text: &str) -> OsString {
    OsString::from(text)
}

#[rstest]
fn sample_is_deobfuscated_to_stdout(workspace: Workspace) {
    let input = workspace.file("sample.py", SAMPLE).into_os_string();
    let outcome = invoke([&input]);
    assert_eq!(outcome.exit, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert!(outcome.stdout.contains("BlankOBF v2"), "{}", outcome.stdout);
    assert!(outcome.stdout.ends_with("print('cli')\n"), "{}", outcome.stdout);
}

#[rstest]
fn output_flag_writes_a_file(workspace: Workspace) {
    let input = workspace.file("sample.py", SAMPLE).into_os_string();
    let target = workspace.dir.path().join("clean.py");
    let outcome = invoke([&input, &arg("-o"), &target.clone().into_os_string()]);
    assert_eq!(outcome.exit, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert!(outcome.stdout.is_empty());
    let written = fs::read_to_string(target).expect("output written");
    assert!(written.contains("print('cli')"));
}

#[rstest]
fn json_report_names_the_schema(workspace: Workspace) {
    let input = workspace.file("sample.py", SAMPLE).into_os_string();
    let outcome = invoke([&input, &arg("--format"), &arg("json")]);
    assert_eq!(outcome.exit, ExitCode::SUCCESS, "{}", outcome.stderr);
    let report: serde_json::Value = serde_json::from_str(&outcome.stdout).expect("json report");
    assert_eq!(report["succeeded"], true);
    assert_eq!(report["schema"], "blankobf v2");
}

#[rstest]
fn forced_schema_failure_prints_a_postmortem(workspace: Workspace) {
    let input = workspace.file("sample.py", SAMPLE).into_os_string();
    let outcome = invoke([&input, &arg("-t"), &arg("lzmaspam"), &arg("--skip-scan")]);
    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stdout.is_empty());
    assert!(
        outcome
            .stderr
            .starts_with("every candidate schema failed: lzmaspam v1\n\n[lzmaspam v1] missing_marker"),
        "{}",
        outcome.stderr
    );
}

#[rstest]
#[case::unknown_schema(&["-t", "not_a_real_schema"], "unknown schema 'not_a_real_schema'")]
#[case::no_candidates(&[], "no schema recognised the input")]
fn request_errors_are_reported_once(
    workspace: Workspace,
    #[case] extra: &[&str],
    #[case] message: &str,
) {
    let input = workspace.file("plain.py", "print('hello')\n").into_os_string();
    let mut argv = vec![OsString::from("pydeobf"), input];
    argv.extend(extra.iter().map(OsString::from));
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = run(argv, &mut stdout, &mut stderr);
    assert_eq!(exit, ExitCode::FAILURE);
    assert!(stdout.is_empty());
    assert_eq!(String::from_utf8(stderr).expect("utf8"), format!("{message}\n"));
}

#[rstest]
fn missing_input_fails(workspace: Workspace) {
    let missing = workspace.dir.path().join("missing.py").into_os_string();
    let outcome = invoke([&missing]);
    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.starts_with("failed to read"), "{}", outcome.stderr);
}

#[test]
fn help_lists_registered_schemas() {
    let outcome = invoke([&arg("--help")]);
    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("Schemas:"), "{}", outcome.stdout);
    assert!(outcome.stdout.contains("blankobf_2"), "{}", outcome.stdout);
    assert!(outcome.stdout.contains("--skip-scan"), "{}", outcome.stdout);
}

#[test]
fn missing_path_is_a_usage_error() {
    let outcome = invoke([]);
    assert_eq!(outcome.exit, ExitCode::from(USAGE_EXIT));
    assert!(outcome.stderr.contains("<PATH>"), "{}", outcome.stderr);
}

#[rstest]
#[case(&["x.py"], false, false)]
#[case(&["x.py", "-d", "--show-expected"], true, true)]
fn logging_flags_reach_the_config(
    #[case] args: &[&str],
    #[case] debug: bool,
    #[case] show_expected: bool,
) {
    let registry = default_registry().expect("schemas register");
    let argv = std::iter::once("pydeobf").chain(args.iter().copied()).map(OsString::from);
    let cli = Cli::parse_with_schemas(argv, &registry).expect("parses");
    let logging = cli.logging();
    assert_eq!(logging.debug, debug);
    assert_eq!(logging.show_expected, show_expected);
}
