//! End-to-end scenarios for the phase controller, driven by a scripted
//! reasoning service and a shell interpreter in the sandbox so no network or
//! Python installation is needed.

use std::sync::Arc;

use hepcode::domain::models::{Config, Phase, ProcessOutcome, SessionOutcome};
use hepcode::infrastructure::hints::HintCorpus;
use hepcode::infrastructure::reasoning::{ScriptedReasoning, ScriptedReply};
use hepcode::{PhaseController, ReasoningError, SessionError, StepOutcome};

/// Config with a shell interpreter and hints disabled.
fn test_config(max_iterations: u32) -> Config {
    let mut config = Config::default();
    config.executor.interpreter = "sh".to_string();
    config.executor.timeout_secs = 5;
    config.session.max_iterations = max_iterations;
    config.hints.enabled = false;
    config
}

fn controller_with(
    config: &Config,
    replies: Vec<&str>,
) -> (PhaseController, Arc<ScriptedReasoning>) {
    let service = Arc::new(ScriptedReasoning::with_replies(replies));
    let controller = PhaseController::new(config, service.clone(), HintCorpus::default());
    (controller, service)
}

fn code_block(script: &str) -> String {
    format!("Here is the script:\n```\n{script}\n```")
}

/// Scenario A: reply stream ["need more info", "ready"] transitions
/// Planning -> Planning -> Generation after the second reply.
#[tokio::test]
async fn test_scenario_a_planning_to_generation() {
    let config = test_config(3);
    let (mut controller, _service) = controller_with(
        &config,
        vec![
            "What dataset are you using? NEED_MORE_INFO",
            "Summary:\n- dataset: nanoaod\nREADY_TO_CODE",
        ],
    );

    let step = controller.converse("help me plot a mass spectrum").await.unwrap();
    assert!(matches!(step, StepOutcome::AwaitingUser { .. }));
    assert_eq!(controller.session().phase(), Phase::Planning);

    let step = controller.converse("CMS open data, NanoAOD").await.unwrap();
    assert!(matches!(step, StepOutcome::PlanningComplete { .. }));
    assert_eq!(controller.session().phase(), Phase::Generation);

    // The readiness snapshot captured both the summary and the offered
    // requirement bullet.
    let requirements = controller.session().requirements();
    assert!(requirements.contains_key("summary"));
    assert_eq!(
        requirements.get("dataset").map(String::as_str),
        Some("nanoaod")
    );
}

/// Scenario B: a generation reply with no fenced code routes back to
/// Generation without incrementing the iteration count.
#[tokio::test]
async fn test_scenario_b_extraction_miss_does_not_count() {
    let config = test_config(3);
    let (mut controller, service) =
        controller_with(&config, vec!["READY_TO_CODE, requirements are clear"]);

    let step = controller.converse("run `echo ok` for me").await.unwrap();
    assert!(matches!(step, StepOutcome::PlanningComplete { .. }));

    service.push("I will write the script next, bear with me.");
    service.push(code_block("echo ok").as_str());
    service.push("Looks right. SOLUTION_APPROVED");

    let outcome = controller.drive().await.unwrap();

    // Only the real execution counted; the extraction miss did not.
    assert_eq!(controller.session().iteration_count(), 1);
    assert!(matches!(outcome, SessionOutcome::Delivered { .. }));

    // The miss left a regeneration nudge in the transcript.
    assert!(controller
        .session()
        .transcript()
        .iter()
        .any(|turn| turn.content.contains("no fenced code block")));
}

/// Scenario C: the code exits non-zero and the reviewer says approved anyway;
/// the success flag, not the sentinel, gates completion.
#[tokio::test]
async fn test_scenario_c_success_flag_gates_completion() {
    let config = test_config(5);
    let (mut controller, service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate something").await.unwrap();

    service.push(code_block("exit 3").as_str());
    service.push("Output looks plausible to me! SOLUTION_APPROVED");
    service.push(code_block("echo fixed").as_str());
    service.push("SOLUTION_APPROVED");

    let outcome = controller.drive().await.unwrap();

    // Two executor invocations: the failing one and the fixed one.
    assert_eq!(controller.session().iteration_count(), 2);
    match outcome {
        SessionOutcome::Delivered { code, test } => {
            assert!(code.contains("echo fixed"));
            assert!(test.succeeded);
        }
        other => panic!("expected delivery, got {other:?}"),
    }

    // The failure details were fed back into the transcript.
    assert!(controller
        .session()
        .transcript()
        .iter()
        .any(|turn| turn.content.contains("exit status 3")));
}

/// Scenario D: the code exits zero and the reviewer approves; the session
/// completes and exposes the code plus the passing result.
#[tokio::test]
async fn test_scenario_d_clean_run_and_approval_complete() {
    let config = test_config(3);
    let (mut controller, service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate").await.unwrap();

    service.push(code_block("echo 42").as_str());
    service.push("The answer is printed. SOLUTION_APPROVED");

    let outcome = controller.drive().await.unwrap();
    assert_eq!(controller.session().phase(), Phase::Complete);

    match outcome {
        SessionOutcome::Delivered { code, test } => {
            assert!(code.contains("echo 42"));
            assert!(test.succeeded);
            assert_eq!(test.outcome, ProcessOutcome::Exited { code: 0 });
            assert!(test.stdout.contains("42"));
        }
        other => panic!("expected delivery, got {other:?}"),
    }
}

/// Scenario E: the code loops forever; the executor enforces the timeout and
/// the result carries a timeout tag, not a crash tag.
#[tokio::test]
async fn test_scenario_e_timeout_is_tagged_distinctly() {
    let mut config = test_config(1);
    config.executor.timeout_secs = 1;
    let (mut controller, service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate").await.unwrap();

    service.push(code_block("sleep 30").as_str());

    let outcome = controller.drive().await.unwrap();
    assert_eq!(controller.session().phase(), Phase::Failed);

    match outcome {
        SessionOutcome::ManualInterventionRequired { last_test, .. } => {
            let test = last_test.expect("the timed-out run was recorded");
            assert_eq!(test.outcome, ProcessOutcome::TimedOut);
            assert!(!test.succeeded);
        }
        other => panic!("expected manual intervention, got {other:?}"),
    }

    // Feedback wording says timeout, not crash.
    assert!(controller
        .session()
        .transcript()
        .iter()
        .any(|turn| turn.content.contains("timed out")));
    assert!(!controller
        .session()
        .transcript()
        .iter()
        .any(|turn| turn.content.contains("exit status")));
}

/// Boundary: reaching the iteration cap without an approved passing run ends
/// in Failed, never Complete.
#[tokio::test]
async fn test_iteration_cap_forces_failed() {
    let config = test_config(2);
    let (mut controller, service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate").await.unwrap();

    service.push(code_block("exit 1").as_str());
    service.push("Not quite. NEEDS_REVISION");
    service.push(code_block("exit 1").as_str());
    // No review reply needed: the final failing attempt cannot be approved.

    let outcome = controller.drive().await.unwrap();
    assert_eq!(controller.session().phase(), Phase::Failed);
    assert_eq!(controller.session().iteration_count(), 2);
    assert_eq!(service.remaining(), 0);

    match outcome {
        SessionOutcome::ManualInterventionRequired { iterations, .. } => {
            assert_eq!(iterations, 2);
        }
        other => panic!("expected manual intervention, got {other:?}"),
    }
}

/// Boundary: the final allowed iteration may still complete when it passes
/// and is approved.
#[tokio::test]
async fn test_final_iteration_can_still_complete() {
    let config = test_config(2);
    let (mut controller, service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate").await.unwrap();

    service.push(code_block("exit 1").as_str());
    service.push("NEEDS_REVISION");
    service.push(code_block("echo done").as_str());
    service.push("SOLUTION_APPROVED");

    let outcome = controller.drive().await.unwrap();
    assert_eq!(controller.session().phase(), Phase::Complete);
    assert!(matches!(outcome, SessionOutcome::Delivered { .. }));
}

/// Boundary: an empty extracted code unit is treated as an execution failure,
/// not skipped.
#[tokio::test]
async fn test_empty_code_unit_is_an_execution_failure() {
    let config = test_config(1);
    let (mut controller, service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate").await.unwrap();

    service.push("```\n```");

    let outcome = controller.drive().await.unwrap();

    // The empty unit consumed a testing iteration.
    assert_eq!(controller.session().iteration_count(), 1);
    assert_eq!(controller.session().phase(), Phase::Failed);
    match outcome {
        SessionOutcome::ManualInterventionRequired { last_test, .. } => {
            assert_eq!(
                last_test.expect("recorded").outcome,
                ProcessOutcome::NothingToRun
            );
        }
        other => panic!("expected manual intervention, got {other:?}"),
    }
}

/// Conflicting readiness sentinels keep the session in Planning.
#[tokio::test]
async fn test_conflicting_planning_sentinels_stay_put() {
    let config = test_config(3);
    let (mut controller, _service) = controller_with(
        &config,
        vec!["READY_TO_CODE... wait, NEED_MORE_INFO about the trigger."],
    );

    let step = controller.converse("plot the spectrum").await.unwrap();
    assert!(matches!(step, StepOutcome::AwaitingUser { .. }));
    assert_eq!(controller.session().phase(), Phase::Planning);
    // The ill-formed turn was still appended.
    assert_eq!(controller.session().transcript().len(), 2);
}

/// A transport failure that survives the client's retries aborts the session
/// as an infrastructure fault, distinct from the Failed phase.
#[tokio::test]
async fn test_transport_failure_is_fatal_not_failed_phase() {
    let config = test_config(3);
    let service = Arc::new(ScriptedReasoning::with_replies([ScriptedReply::Error(
        ReasoningError::RateLimitExceeded,
    )]));
    let mut controller = PhaseController::new(&config, service, HintCorpus::default());

    let err = controller.converse("hello").await.unwrap_err();
    assert!(matches!(err, SessionError::Reasoning(_)));
    // The session phase is untouched: this is not a code-quality failure.
    assert_eq!(controller.session().phase(), Phase::Planning);
}

/// Cancellation interrupts the loop and forces the Failed phase.
#[tokio::test]
async fn test_cancellation_forces_failed() {
    let config = test_config(3);
    let (mut controller, _service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate").await.unwrap();

    controller.cancellation_token().cancel();
    let outcome = controller.drive().await.unwrap();

    assert_eq!(controller.session().phase(), Phase::Failed);
    assert!(matches!(
        outcome,
        SessionOutcome::ManualInterventionRequired { .. }
    ));
}

/// Repeated extraction misses cannot loop forever: they share the iteration
/// cap and end in Failed.
#[tokio::test]
async fn test_persistent_extraction_misses_give_up() {
    let config = test_config(2);
    let (mut controller, service) = controller_with(&config, vec!["READY_TO_CODE"]);
    controller.converse("generate").await.unwrap();

    service.push("still thinking, no code");
    service.push("more prose, still no code");

    let outcome = controller.drive().await.unwrap();
    assert_eq!(controller.session().phase(), Phase::Failed);
    // No executor invocation ever happened.
    assert_eq!(controller.session().iteration_count(), 0);
    match outcome {
        SessionOutcome::ManualInterventionRequired { last_test, .. } => {
            assert!(last_test.is_none());
        }
        other => panic!("expected manual intervention, got {other:?}"),
    }
}

/// The reasoning service only ever sees the configured transcript window.
#[tokio::test]
async fn test_context_window_bounds_replayed_transcript() {
    let mut config = test_config(3);
    config.session.context_window = 2;
    let (mut controller, service) = controller_with(
        &config,
        vec!["NEED_MORE_INFO", "NEED_MORE_INFO", "NEED_MORE_INFO"],
    );

    for input in ["one", "two", "three"] {
        controller.converse(input).await.unwrap();
    }

    let seen = service.seen();
    assert_eq!(seen.len(), 3);
    // Later calls are clamped to the window even though the transcript grew.
    assert!(seen.iter().all(|call| call.transcript_len <= 2));
    assert_eq!(seen[2].last_turn.as_deref(), Some("three"));
}
