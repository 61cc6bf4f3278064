//! The phase controller: a deterministic state machine that drives one
//! conversation through Planning -> Generation -> Testing -> Complete/Failed.
//!
//! The controller owns its `SessionState` exclusively. Each testing iteration
//! couples extraction, execution, and review into one atomic cycle: the
//! session never exposes a partially-updated test result to the next
//! reasoning call. The iteration cap is the single fatal code-quality
//! trigger; every other failure re-enters Generation with the prior error
//! appended to the transcript.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::SessionResult;
use crate::domain::models::{
    Config, Phase, ProcessOutcome, SessionConfig, SessionOutcome, SessionState, Turn,
};
use crate::domain::ports::ReasoningService;
use crate::infrastructure::hints::HintCorpus;
use crate::services::executor::SandboxExecutor;
use crate::services::extractor;
use crate::services::imports::ImportProbe;
use crate::services::prompts::{self, PromptLibrary};
use crate::services::signals::{self, SignalReading};

/// One observable trigger from the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A planning reply was received and scanned for the ready signal.
    PlanningReply(SignalReading),
    /// A generation reply was scanned for fenced code.
    Extraction {
        /// Whether at least one fenced region was present.
        found: bool,
    },
    /// A testing cycle executed the code and reviewed the outcome.
    Evaluated {
        /// Whether the sandbox run exited zero in time.
        succeeded: bool,
        /// Reading of the approval sentinel pair in the review reply.
        approval: SignalReading,
    },
    /// The iteration budget is spent.
    BudgetExhausted,
    /// The session was cancelled.
    Cancelled,
}

/// The transition function of the state machine, total over every pair the
/// controller can produce. Feeding it a pair the controller never produces
/// (say, an extraction event while planning) is a programmer error.
pub fn next_phase(current: Phase, event: &PhaseEvent) -> Phase {
    match (current, event) {
        (Phase::Planning, PhaseEvent::PlanningReply(SignalReading::Present)) => Phase::Generation,
        (Phase::Planning, PhaseEvent::PlanningReply(_)) => Phase::Planning,

        (Phase::Generation, PhaseEvent::Extraction { found: true }) => Phase::Testing,
        (Phase::Generation, PhaseEvent::Extraction { found: false }) => Phase::Generation,

        (
            Phase::Testing,
            PhaseEvent::Evaluated {
                succeeded: true,
                approval: SignalReading::Present,
            },
        ) => Phase::Complete,
        // Conflicting approval sentinels fail open: stay in Testing and ask
        // again (the self-loop re-executes; the iteration cap bounds it).
        (
            Phase::Testing,
            PhaseEvent::Evaluated {
                approval: SignalReading::Conflicting,
                ..
            },
        ) => Phase::Testing,
        (Phase::Testing, PhaseEvent::Evaluated { .. }) => Phase::Generation,

        (Phase::Generation | Phase::Testing, PhaseEvent::BudgetExhausted) => Phase::Failed,

        (current, PhaseEvent::Cancelled) if !current.is_terminal() => Phase::Failed,

        (current, event) => {
            unreachable!("no transition from {current} on {event:?}")
        }
    }
}

/// What a planning turn produced.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Planning continues; show the reply and wait for the next user turn.
    AwaitingUser {
        /// The assistant's planning reply.
        reply: String,
    },
    /// The planner signalled readiness; call [`PhaseController::drive`] to
    /// run the generation/testing loop to completion.
    PlanningComplete {
        /// The assistant's final planning reply.
        reply: String,
    },
}

/// Drives one session to completion.
pub struct PhaseController {
    session: SessionState,
    reasoning: Arc<dyn ReasoningService>,
    executor: SandboxExecutor,
    probe: ImportProbe,
    prompts: PromptLibrary,
    config: SessionConfig,
    cancel: CancellationToken,
    consecutive_extraction_misses: u32,
}

impl PhaseController {
    /// Create a controller for a fresh session.
    pub fn new(config: &Config, reasoning: Arc<dyn ReasoningService>, hints: HintCorpus) -> Self {
        Self {
            session: SessionState::new(),
            reasoning,
            executor: SandboxExecutor::new(config.executor.clone()),
            probe: ImportProbe::new(config.executor.clone()),
            prompts: PromptLibrary::new(hints),
            config: config.session.clone(),
            cancel: CancellationToken::new(),
            consecutive_extraction_misses: 0,
        }
    }

    /// Read access to the session for reporting.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// A handle that aborts the session, interrupting an in-flight sandbox
    /// run if necessary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Feed one user turn into the planning conversation.
    ///
    /// Returns `AwaitingUser` while requirements are still being gathered and
    /// `PlanningComplete` once the planner signals readiness, at which point
    /// [`Self::drive`] takes over.
    ///
    /// Calling this on a session past planning is a programmer error.
    pub async fn converse(&mut self, user_input: &str) -> SessionResult<StepOutcome> {
        assert_eq!(
            self.session.phase(),
            Phase::Planning,
            "converse called outside the planning phase"
        );

        self.session.append_turn(Turn::user(user_input));
        self.planning_step().await
    }

    /// Run the autonomous generation/testing loop to a terminal phase and
    /// hand back the deliverable. No user input is consumed; recoverable
    /// failures only lengthen the iteration count.
    ///
    /// Calling this before planning has completed is a programmer error.
    pub async fn drive(&mut self) -> SessionResult<SessionOutcome> {
        assert!(
            matches!(self.session.phase(), Phase::Generation | Phase::Testing),
            "drive called in phase {}",
            self.session.phase()
        );

        while !self.session.phase().is_terminal() {
            if self.cancel.is_cancelled() {
                let next = next_phase(self.session.phase(), &PhaseEvent::Cancelled);
                self.session.advance_phase(next);
                break;
            }
            match self.session.phase() {
                Phase::Generation => self.generation_step().await?,
                Phase::Testing => self.testing_step().await?,
                Phase::Planning | Phase::Complete | Phase::Failed => unreachable!(),
            }
        }

        info!(
            session_id = %self.session.id(),
            phase = %self.session.phase(),
            iterations = self.session.iteration_count(),
            "session finished"
        );
        Ok(self.outcome())
    }

    /// One planning turn: ask, scan for the ready signal, merge offered
    /// requirements.
    async fn planning_step(&mut self) -> SessionResult<StepOutcome> {
        let instructions = self.prompts.planning();
        let reply = self.request(&instructions).await?;
        let reading = signals::read_ready(&reply);
        self.session.append_turn(Turn::assistant(reply.clone()));

        match reading {
            SignalReading::Conflicting => {
                // Ill-formed reply: append the turn only, stay put, and
                // effectively ask again.
                warn!(session_id = %self.session.id(), "conflicting readiness sentinels, staying in planning");
            }
            SignalReading::Present => {
                merge_offered_requirements(&mut self.session, &reply);
                self.session.set_requirement("summary", reply.clone());
                let next = next_phase(Phase::Planning, &PhaseEvent::PlanningReply(reading));
                self.session.advance_phase(next);
                return Ok(StepOutcome::PlanningComplete { reply });
            }
            SignalReading::Absent => {
                merge_offered_requirements(&mut self.session, &reply);
            }
        }

        Ok(StepOutcome::AwaitingUser { reply })
    }

    /// One generation turn: ask for code, extract it, move to testing.
    async fn generation_step(&mut self) -> SessionResult<()> {
        let instructions = self.prompts.generation(self.session.requirements());
        let reply = self.request(&instructions).await?;
        self.session.append_turn(Turn::assistant(reply.clone()));

        let extraction = extractor::extract_code(&reply);
        let next = next_phase(
            Phase::Generation,
            &PhaseEvent::Extraction {
                found: extraction.found,
            },
        );

        if extraction.found {
            self.consecutive_extraction_misses = 0;
            for warning in &extraction.warnings {
                warn!(session_id = %self.session.id(), warning = %warning, "extraction ambiguity");
                self.session
                    .append_turn(Turn::user(format!("[test harness] Note: {warning}.")));
            }
            self.session.set_generated_code(extraction.code);
            self.session.advance_phase(next);
        } else {
            // Re-prompt without touching the iteration count. A model that
            // never produces code would loop forever, so consecutive misses
            // share the iteration cap.
            self.consecutive_extraction_misses += 1;
            if self.consecutive_extraction_misses >= self.config.max_iterations {
                warn!(session_id = %self.session.id(), "generation kept producing no code, giving up");
                self.session
                    .advance_phase(next_phase(Phase::Generation, &PhaseEvent::BudgetExhausted));
                return Ok(());
            }
            self.session.append_turn(Turn::user(prompts::regeneration_nudge()));
        }
        Ok(())
    }

    /// One testing cycle: execute, record, review, route.
    async fn testing_step(&mut self) -> SessionResult<()> {
        let code = self
            .session
            .generated_code()
            .expect("testing phase implies a stored code unit")
            .to_string();

        let report = self.executor.run(&code, &self.cancel).await?;
        self.session.set_test_result(report.clone());
        self.session.increment_iteration();

        if report.outcome == ProcessOutcome::Cancelled {
            self.session
                .advance_phase(next_phase(Phase::Testing, &PhaseEvent::Cancelled));
            return Ok(());
        }

        // A failed run gets its imports probed so the feedback can name
        // missing modules instead of leaving the model a bare traceback.
        let imports = if report.succeeded || report.outcome == ProcessOutcome::NothingToRun {
            None
        } else {
            Some(self.probe.probe_code(&code).await)
        };

        self.session.append_turn(Turn::user(prompts::execution_feedback(
            &report,
            imports.as_ref(),
        )));

        let budget_spent = self.session.iteration_count() >= self.config.max_iterations;

        // Nothing can approve a failed run, so skip the review call when the
        // budget is already spent.
        if budget_spent && !report.succeeded {
            self.session
                .advance_phase(next_phase(Phase::Testing, &PhaseEvent::BudgetExhausted));
            return Ok(());
        }

        let instructions = self.prompts.review();
        let reply = self.request(&instructions).await?;
        let approval = signals::read_approval(&reply);
        self.session.append_turn(Turn::assistant(reply));

        let next = next_phase(
            Phase::Testing,
            &PhaseEvent::Evaluated {
                succeeded: report.succeeded,
                approval,
            },
        );

        if next == Phase::Complete {
            self.session.advance_phase(next);
        } else if budget_spent {
            // The final attempt did not yield an approved, passing run.
            self.session
                .advance_phase(next_phase(Phase::Testing, &PhaseEvent::BudgetExhausted));
        } else if next == Phase::Testing {
            warn!(session_id = %self.session.id(), "conflicting approval sentinels, re-running the testing cycle");
        } else {
            self.session.advance_phase(next);
        }
        Ok(())
    }

    async fn request(&self, instructions: &str) -> SessionResult<String> {
        let tail = self.session.transcript_tail(self.config.context_window);
        Ok(self.reasoning.next_turn(instructions, tail).await?)
    }

    /// Build the caller-facing deliverable from a terminal session.
    fn outcome(&self) -> SessionOutcome {
        match self.session.phase() {
            Phase::Complete => SessionOutcome::Delivered {
                code: self
                    .session
                    .generated_code()
                    .expect("complete phase implies a stored code unit")
                    .to_string(),
                test: self
                    .session
                    .test_result()
                    .cloned()
                    .expect("complete phase implies a test result"),
            },
            Phase::Failed => SessionOutcome::ManualInterventionRequired {
                transcript_tail: self.session.transcript_tail(6).to_vec(),
                last_test: self.session.test_result().cloned(),
                iterations: self.session.iteration_count(),
            },
            phase => unreachable!("outcome requested in non-terminal phase {phase}"),
        }
    }
}

/// Merge `- key: value` bullet lines from a planning reply into the
/// requirements map. Free text around the bullets is left alone.
fn merge_offered_requirements(session: &mut SessionState, reply: &str) {
    static BULLET: OnceLock<Regex> = OnceLock::new();
    let bullet = BULLET.get_or_init(|| {
        Regex::new(r"(?m)^\s*[-*]\s*([A-Za-z][A-Za-z0-9 _/]{0,40})\s*:\s+(\S.*)$")
            .expect("static regex")
    });

    for captures in bullet.captures_iter(reply) {
        let key = captures[1].trim().to_lowercase();
        let value = captures[2].trim().to_string();
        session.set_requirement(key, value);
    }
}
