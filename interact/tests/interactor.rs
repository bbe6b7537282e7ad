//! Interactor tests against a real child process.
//!
//! The fixture is a small `sh` REPL that prints `"> "` before every command.

use interact::test_support::{Fixture, sh_config};
use interact::{HarnessError, Interactor, StderrPolicy, Stream};

fn spawn_repl(fixture: &Fixture, stderr: StderrPolicy) -> Interactor {
    Interactor::spawn(&fixture.repl(stderr)).expect("spawn fixture")
}

#[test]
fn answers_command_between_prompts() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Inherit);

    proc.expect("> ").expect("first prompt");
    proc.write("ca 0 0\n").expect("write");
    assert_eq!(proc.getline("\n").expect("line"), "A1");
    proc.expect("> ").expect("second prompt");
}

#[test]
fn literal_expectation_consumes_only_the_literal() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Inherit);

    proc.expect("> ").expect("prompt");
    proc.write("ca A1\n").expect("write");
    proc.expect("row=0").expect("prefix");
    assert_eq!(proc.getline("\n").expect("rest"), " column=0");
}

#[test]
fn mismatch_reports_expected_and_actual() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Inherit);

    proc.expect("> ").expect("prompt");
    proc.write("ca 0 0\n").expect("write");
    let err = proc.expect("B1").expect_err("mismatch");
    match err {
        HarnessError::Mismatch {
            stream,
            expected,
            actual,
        } => {
            assert_eq!(stream, Stream::Stdout);
            assert_eq!(expected, "B1");
            assert!(actual.starts_with('A'), "actual was {actual:?}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn piped_stderr_is_read_separately() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Piped);

    proc.expect("> ").expect("prompt");
    proc.write("err boom\n").expect("write");
    assert_eq!(proc.getline_on(Stream::Stderr, "\n").expect("stderr"), "boom");
    proc.expect("> ").expect("prompt after stderr output");
}

#[test]
fn merged_stderr_arrives_on_stdout() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Merged);

    proc.expect("> ").expect("prompt");
    proc.write("err boom\n").expect("write");
    assert_eq!(proc.getline("\n").expect("merged line"), "boom");

    let err = proc.expect_on(Stream::Stderr, "x").expect_err("no stderr pipe");
    assert!(matches!(
        err,
        HarnessError::StreamUnavailable {
            stream: Stream::Stderr
        }
    ));
}

#[test]
fn pipe_drains_remaining_output_and_checks_exit() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Inherit);

    proc.expect("> ").expect("prompt");
    proc.write("echo tail\n").expect("write");
    let mut sink = Vec::new();
    proc.pipe(&mut sink).expect("clean exit");
    assert_eq!(String::from_utf8(sink).expect("utf8"), "tail\n> ");
}

#[test]
fn pipe_keeps_already_buffered_output_first() {
    let mut proc = Interactor::spawn(&sh_config("printf 'head\\nbody\\n'; printf 'tail\\n'"))
        .expect("spawn");

    assert_eq!(proc.getline("\n").expect("head"), "head");
    let mut sink = Vec::new();
    proc.pipe(&mut sink).expect("clean exit");
    assert_eq!(String::from_utf8(sink).expect("utf8"), "body\ntail\n");
}

#[test]
fn pipe_reports_nonzero_exit_after_drain() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Inherit);

    proc.expect("> ").expect("prompt");
    proc.write("crash\n").expect("write");
    let mut sink = Vec::new();
    let err = proc.pipe(&mut sink).expect_err("exit 3");
    assert!(err.is_fatal());
    assert!(matches!(err, HarnessError::ProcessExit { code: Some(3), .. }));
}

#[test]
fn end_of_stream_is_an_error_not_a_hang() {
    let mut proc = Interactor::spawn(&sh_config("printf 'no newline'")).expect("spawn");

    let err = proc.getline("\n").expect_err("eof");
    assert!(matches!(
        err,
        HarnessError::EndOfStream {
            stream: Stream::Stdout
        }
    ));
}

#[test]
fn transcript_records_both_directions() {
    let fixture = Fixture::new().expect("fixture");
    let mut proc = spawn_repl(&fixture, StderrPolicy::Inherit);

    proc.expect("> ").expect("prompt");
    proc.write("ca 0 0\n").expect("write");
    proc.getline("\n").expect("line");

    let rendered = proc.transcript().render();
    assert!(rendered.contains("[stdin ] \"ca 0 0\\n\""), "{rendered}");
    assert!(rendered.contains("A1\\n"), "{rendered}");
}

#[test]
fn missing_program_fails_to_spawn() {
    let config = interact::InteractorConfig::new(interact::CommandLine::new(
        "/nonexistent/modeltest-fixture",
    ));
    let err = Interactor::spawn(&config).err().expect("spawn error");
    assert!(matches!(err, HarnessError::Spawn { .. }));
}
