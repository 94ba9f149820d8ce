//! End-to-end tests: whole scripts run through a session, and the built
//! binary run against event and script fixtures.

use std::path::Path;
use std::process::{Command, Output};
use eventsh::{Config, Event, Script, Session, State};

const EVENT: &str = r#"
entity:
  metadata:
    name: foobar
    labels:
      region: us-west
check:
  status: 2
  duration: 1.50
  interval: 3.0
  output: "disk usage 91%"
"#;

/// Run a script in a captured session; returns (status, stdout, stderr).
fn session(script: &str) -> (i32, String, String) {
    session_with(script, &Config::default())
}

fn session_with(script: &str, config: &Config) -> (i32, String, String) {
    let event = Event::parse(EVENT).unwrap();
    let session = Session::new(event, config);
    let mut state = State::captured(std::env::temp_dir());
    let script = Script::parse("test.sh", script).unwrap();
    let status = match session.run(&mut state, &script) {
        Ok(status) => status,
        Err(e) => e.exit_status(),
    };
    (status, state.stdout.take(), state.stderr.take())
}

fn eventsh(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_eventsh"))
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

fn fixture(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
fn event_field_lookup() {
    let (status, out, _) = session("event .entity.metadata.name");
    assert_eq!(status, 0);
    assert_eq!(out, "foobar");
}

#[test]
fn plain_rendering() {
    let (status, out, _) = session("event -p '.check.duration, .check.interval, \"foo\", {a: 1}'");
    assert_eq!(status, 0);
    assert_eq!(out, "1.5\n3\nfoo\n{\"a\":1}");
}

#[test]
fn json_wins_over_yaml() {
    let (status, out, _) = session("event -Y -j .entity.metadata.labels");
    assert_eq!(status, 0);
    assert_eq!(out, "{\"region\":\"us-west\"}\n");
}

#[test]
fn yaml_output() {
    let (_, out, _) = session("event -Y '.entity.metadata.labels, .check.status'");
    assert_eq!(out, "region: us-west\n---\n2\n");
}

#[test]
fn missing_event_field_is_null() {
    let (status, out, err) = session("event .entity.labels.region\necho\nevent -j '.check.missing.deep'");
    assert_eq!(status, 0, "stderr: {}", err);
    assert_eq!(out, "null\nnull\n");
}

#[test]
fn non_finite_numbers() {
    let (status, out, _) = session("event 'infinite, -infinite, nan'");
    assert_eq!(status, 0);
    assert_eq!(out, "+Inf\n-Inf\nNaN");

    let (status, out, err) = session("event -j infinite");
    assert_eq!(status, 1);
    assert_eq!(out, "");
    assert!(err.contains("encoding error: json: unsupported value: +Inf"), "stderr: {}", err);
}

#[test]
fn too_many_positionals_is_usage_error() {
    let (status, out, err) = session("query . - extra");
    assert_eq!(status, 1);
    assert_eq!(out, "");
    assert_eq!(err, "query: too many arguments to query: expected 0..2\n");
}

#[test]
fn help_flag_exits_two() {
    let (status, _, err) = session("event -h");
    assert_eq!(status, 2);
    assert!(err.starts_with("Usage of event:\n"));
}

#[test]
fn runtime_error_stops_after_first_result() {
    let (status, out, err) = session("event '1, error(\"boom\"), 2'");
    assert_eq!(status, 1);
    assert_eq!(out, "1");
    assert!(err.starts_with("event: query error:"));
}

#[test]
fn failures_do_not_abort_the_script() {
    let (status, out, _) = session("event '.[[['\necho after $?");
    assert_eq!(status, 0);
    assert_eq!(out, "after 1\n");
}

#[test]
fn errexit_aborts_on_query_failure() {
    let config = Config::default().errexit(true);
    let (status, out, _) = session_with("event '.[[['\necho unreachable", &config);
    assert_eq!(status, 1);
    assert_eq!(out, "");
}

#[test]
fn variable_shorthand_on_indexed_variable() {
    let (status, out, _) = session("array PARTS /bin:/usr/bin /sbin\n@PARTS -R 'split(\"\\n\") | length'");
    assert_eq!(status, 0);
    assert_eq!(out, "2");
}

#[test]
fn variable_shorthand_splits_indexed_path() {
    let (status, out, _) = session("array PATH /usr/bin:/bin\n@PATH -R 'split(\":\")[]'");
    assert_eq!(status, 0);
    assert_eq!(out, "/usr/bin\n/bin");

    let (status, out, _) = session("array PATH /usr/bin /bin\n@PATH -R 'split(\":\")[]'");
    assert_eq!(status, 0);
    assert_eq!(out, "/usr/bin\n/bin");
}

#[test]
fn repeated_query_output_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "docs.yaml", "a: [1, 2.5]\n---\na: {b: x}\n");
    let run = "stdin docs.yaml\nquery -Y .a\necho ==\nstdin docs.yaml\nquery .a\necho";
    let script = format!("cd {}\n{}\n{}", dir.path().display(), run, run);
    let (status, out, _) = session(&script);
    assert_eq!(status, 0);

    let expected = "- 1\n- 2.5\n---\nb: x\n==\n[1,2.5]\n{\"b\":\"x\"}\n";
    assert_eq!(out, format!("{}{}", expected, expected));
}

#[test]
fn variable_shorthand_on_scalar() {
    let (status, out, _) = session("env DOC='{\"a\": [1, 2]}'\n@DOC -j '.a[]'");
    assert_eq!(status, 0);
    assert_eq!(out, "1\n2\n");
}

#[test]
fn stdin_feeds_next_query_only() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "input.yaml", "a: 1\n---\na: 2\n");
    let script = format!("cd {}\nstdin input.yaml\nquery .a\necho\nquery .a", dir.path().display());
    let (status, out, _) = session(&script);
    assert_eq!(status, 0);
    assert_eq!(out, "1\n2\n");
}

#[cfg(unix)]
#[test]
fn unknown_variable_shorthand_runs_as_program() {
    let (status, _, err) = session("map M k=v\n@M .k");
    assert_eq!(status, 127);
    assert!(err.contains("command not found"));

    let (status, _, _) = session("@EVENTSH_UNDEFINED_VARIABLE .");
    assert_eq!(status, 127);
}

#[cfg(unix)]
#[test]
fn external_commands_run() {
    let (status, out, _) = session("sh -c 'echo external'\n! sh -c 'exit 3'");
    assert_eq!(status, 0);
    assert_eq!(out, "external\n");
}

#[test]
fn results_are_deterministic() {
    let script = "event -j .\nevent .entity";
    let first = session(script);
    for _ in 0..3 {
        assert_eq!(session(script), first);
    }
}

#[test]
fn binary_runs_script_file() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "event.json", r#"{"entity": {"metadata": {"name": "foobar"}}}"#);
    fixture(dir.path(), "check.sh", "event .entity.metadata.name\necho\necho $1\n");

    let output = eventsh(dir.path(), &["-E", "event.json", "check.sh", "param"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "foobar\nparam\n");
}

#[test]
fn binary_raw_commands_with_params() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "event.yaml", EVENT);

    let output = eventsh(dir.path(), &["-E", "event.yaml", "-R", "event .check.status", "echo", "echo $1 $#", "--", "x", "y"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\nx 2\n");
}

#[test]
fn binary_exit_code_is_final_status() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "event.yaml", EVENT);

    let output = eventsh(dir.path(), &["-E", "event.yaml", "-R", "event .a .b"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("too many arguments to event"));

    let output = eventsh(dir.path(), &["-E", "event.yaml", "-R", "exit 7"]);
    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn binary_rejects_bad_event() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "event.yaml", "- not\n- a mapping\n");
    fixture(dir.path(), "check.sh", "echo ran\n");

    let output = eventsh(dir.path(), &["-E", "event.yaml", "check.sh"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "");

    let output = eventsh(dir.path(), &["-E", "missing.yaml", "check.sh"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn binary_rejects_bad_timeout_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "event.yaml", EVENT);

    let output = Command::new(env!("CARGO_BIN_EXE_eventsh"))
        .args(["-E", "event.yaml", "-R", "echo ran"])
        .env("EVENTSH_TIMEOUT", "soon")
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "");
    assert!(String::from_utf8_lossy(&output.stderr).contains("EVENTSH_TIMEOUT=\"soon\""));
}

#[test]
fn binary_rejects_two_stdin_readers() {
    let dir = tempfile::tempdir().unwrap();
    let output = eventsh(dir.path(), &["-"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("only one can be read from standard input"));
}

#[test]
fn binary_syntax_error_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "event.yaml", EVENT);
    fixture(dir.path(), "check.sh", "echo first\necho 'unterminated\n");

    let output = eventsh(dir.path(), &["-E", "event.yaml", "check.sh"]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "");
}
