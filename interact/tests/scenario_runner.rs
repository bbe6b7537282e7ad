//! Runner-level tests: scenario isolation, predicates, actions, and run
//! control, all against the scripted REPL fixture.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use interact::test_support::{Fixture, STORE_FILE};
use interact::{
    HarnessError, LinePredicate, Scenario, ScenarioRunner, StderrPolicy, changed,
};

fn runner(fixture: &Fixture) -> ScenarioRunner {
    ScenarioRunner::new(fixture.repl(StderrPolicy::Inherit))
}

#[test]
fn passing_scenario_checks_each_response_and_final_prompt() {
    let fixture = Fixture::new().expect("fixture");
    let scenario = Scenario::new("cell address")
        .exchange("ca 0 0", "A1")
        .exchange("ca A1", "row=0 column=0")
        .send("silent");

    let report = runner(&fixture).run(&[scenario]).expect("run");
    assert_eq!(report.results.len(), 1);
    assert!(report.all_passed(), "{:?}", report.results[0].status);
}

/// A failing step ends its own scenario only: later steps never run and the
/// next scenario starts from a fresh process.
#[test]
fn failure_stops_scenario_but_not_run() {
    let fixture = Fixture::new().expect("fixture");
    let reached = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&reached);

    let failing = Scenario::new("wrong address")
        .exchange("ca 0 0", "B1")
        .action("mark", move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
    let passing = Scenario::new("right address").exchange("ca 0 0", "A1");

    let report = runner(&fixture).run(&[failing, passing]).expect("run");

    assert!(!reached.load(Ordering::SeqCst), "step after failure ran");
    assert_eq!(report.passed(), 1);
    assert_eq!(report.failed(), 1);

    let failure = report.results[0].failure().expect("first failed");
    assert_eq!(failure.step, 1);
    assert_eq!(failure.expected.as_deref(), Some("B1"));
    assert!(
        failure.actual.as_deref().is_some_and(|a| a.starts_with('A')),
        "{failure:?}"
    );
    assert!(failure.transcript.contains("ca 0 0"));
    assert!(report.results[1].passed());
}

#[test]
fn changed_predicate_ignores_order() {
    let fixture = Fixture::new().expect("fixture");
    let unordered = Scenario::new("unordered").check("change B1 42", changed(&["A2", "B1"]));
    let missing = Scenario::new("missing cell").check("change B1 42", changed(&["B1"]));

    let report = runner(&fixture).run(&[unordered, missing]).expect("run");

    assert!(report.results[0].passed());
    let failure = report.results[1].failure().expect("second failed");
    assert_eq!(failure.expected.as_deref(), Some("Changed: {B1}"));
    assert_eq!(failure.actual.as_deref(), Some("Changed: B1 A2"));
}

#[test]
fn custom_predicate_sees_whole_line() {
    let fixture = Fixture::new().expect("fixture");
    let scenario = Scenario::new("echo").check(
        "echo a b c",
        LinePredicate::new("three words", |line| line.split(' ').count() == 3),
    );

    let report = runner(&fixture).run(&[scenario]).expect("run");
    assert!(report.all_passed());
}

#[test]
fn action_error_is_reported_with_label() {
    let fixture = Fixture::new().expect("fixture");
    let missing = fixture.path().join("absent.txt");
    let scenario = Scenario::new("bad rename")
        .exchange("ca 0 0", "A1")
        .action("rename absent.txt", move || {
            fs::rename(&missing, "elsewhere.txt")?;
            Ok(())
        });

    let report = runner(&fixture).run(&[scenario]).expect("run");
    let failure = report.results[0].failure().expect("failed");
    assert_eq!(failure.step, 2);
    assert_eq!(failure.step_description, "action rename absent.txt");
    assert!(failure.cause.contains("rename absent.txt"), "{}", failure.cause);
}

/// State written by one scenario survives into the next through the
/// filesystem, and an action between them can move it.
#[test]
fn file_actions_carry_state_across_scenarios() {
    let fixture = Fixture::new().expect("fixture");
    let store = fixture.store_path();
    let saved = fixture.path().join("saved.txt");

    let (from, to) = (store.clone(), saved.clone());
    let write = Scenario::new("write and move")
        .exchange("put hello", "ok")
        .action(format!("rename {STORE_FILE} saved.txt"), move || {
            fs::rename(&from, &to)?;
            Ok(())
        });
    let (from, to) = (saved.clone(), store.clone());
    let read = Scenario::new("restore and read")
        .exchange("get", "missing")
        .action(format!("rename saved.txt {STORE_FILE}"), move || {
            fs::rename(&from, &to)?;
            Ok(())
        })
        .exchange("get", "hello");

    let report = runner(&fixture).run(&[write, read]).expect("run");
    assert!(report.all_passed(), "{:?}", report.results);
    assert!(store.exists());
    assert!(!saved.exists());
}

#[test]
fn exit_before_final_prompt_fails_last_step() {
    let fixture = Fixture::new().expect("fixture");
    let scenario = Scenario::new("quits early")
        .exchange("ca 0 0", "A1")
        .send("quit");

    let report = runner(&fixture).run(&[scenario]).expect("run");
    let failure = report.results[0].failure().expect("failed");
    assert_eq!(failure.step, 3);
    assert_eq!(failure.step_description, "final prompt");
    assert!(failure.cause.contains("EOF"), "{}", failure.cause);
}

#[test]
fn filter_selects_by_name() {
    let fixture = Fixture::new().expect("fixture");
    let scenarios = vec![
        Scenario::new("ca forward").exchange("ca 0 0", "A1"),
        Scenario::new("ca reverse").exchange("ca A1", "row=0 column=0"),
        Scenario::new("echo").exchange("echo hi", "hi"),
    ];

    let report = runner(&fixture)
        .with_filter(Some("ca ".to_string()))
        .run(&scenarios)
        .expect("run");
    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["ca forward", "ca reverse"]);
}

#[test]
fn fail_fast_stops_after_first_failure() {
    let fixture = Fixture::new().expect("fixture");
    let scenarios = vec![
        Scenario::new("fails").exchange("ca 0 0", "Z9"),
        Scenario::new("never runs").exchange("ca 0 0", "A1"),
    ];

    let seen = AtomicUsize::new(0);
    let report = runner(&fixture)
        .with_fail_fast(true)
        .run_with(&scenarios, |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .expect("run");
    assert_eq!(report.results.len(), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn spawn_failure_is_step_zero() {
    let fixture = Fixture::new().expect("fixture");
    let mut config = fixture.repl(StderrPolicy::Inherit);
    config.spawn.command = interact::CommandLine::new("/nonexistent/modeltest-program");

    let report = ScenarioRunner::new(config)
        .run(&[Scenario::new("no binary").exchange("ca 0 0", "A1")])
        .expect("run");
    let failure = report.results[0].failure().expect("failed");
    assert_eq!(failure.step, 0);
    assert_eq!(failure.step_description, "spawn");
}

#[test]
fn fatal_action_error_ends_run() {
    let fixture = Fixture::new().expect("fixture");
    let scenarios = vec![
        Scenario::new("fatal").action("exit check", || {
            Err(HarnessError::ProcessExit {
                program: "main".to_string(),
                code: Some(1),
            }
            .into())
        }),
        Scenario::new("after").exchange("ca 0 0", "A1"),
    ];

    let err = runner(&fixture).run(&scenarios).expect_err("fatal");
    let harness = err.downcast_ref::<HarnessError>().expect("harness error");
    assert!(harness.is_fatal());
    assert!(format!("{err:#}").contains("scenario \"fatal\" step 1"));
}
