//! Phase-specific instruction text for the reasoning service.
//!
//! Wording lives here, away from the state machine: the controller only ever
//! sees sentinel tokens coming back, never prompt text going out.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::domain::models::{ExecutionReport, ProcessOutcome};
use crate::infrastructure::hints::HintCorpus;
use crate::services::imports::ImportReport;
use crate::services::signals::{APPROVED_TOKEN, NOT_READY_TOKEN, READY_TOKEN, REVISE_TOKEN};

const BASE_INSTRUCTIONS: &str = "\
You are a particle physics analysis assistant. Keep language academic and \
to-the-point, stay on physics and data analysis, and prefer established \
analysis tooling over hand-rolled solutions.";

/// Builds instruction text per phase, embedding the hint corpus where the
/// generation phase needs it.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    hints: HintCorpus,
}

impl PromptLibrary {
    /// Create a library over a loaded hint corpus.
    pub fn new(hints: HintCorpus) -> Self {
        Self { hints }
    }

    /// Instructions for the planning phase: gather requirements, signal
    /// readiness with the fixed sentinel tokens.
    pub fn planning(&self) -> String {
        format!(
            "{BASE_INSTRUCTIONS}\n\n\
             You are in PLANNING mode. Gather everything needed to generate \
             working analysis code: dataset format and location, the physics \
             quantity to extract, selection cuts, and output format. Ask one \
             focused question at a time.\n\n\
             When requirements are still incomplete, include the token \
             {NOT_READY_TOKEN} in your reply. Once you have enough to write \
             code, summarize the requirements and include the token \
             {READY_TOKEN}. Never include both tokens in one reply."
        )
    }

    /// Instructions for the generation phase, embedding the requirements
    /// snapshot and the hint corpus.
    pub fn generation(&self, requirements: &BTreeMap<String, String>) -> String {
        let mut text = format!(
            "{BASE_INSTRUCTIONS}\n\n\
             You are in CODE GENERATION mode. Produce one complete, \
             self-contained, executable script as a SINGLE fenced code block: \
             imports first, then configuration, then helper functions, then a \
             main() guarded by __main__. No placeholders; if something is \
             unknown, make a stated assumption instead."
        );

        if !requirements.is_empty() {
            text.push_str("\n\nAgreed requirements:\n");
            for (key, value) in requirements {
                let _ = writeln!(text, "- {key}: {value}");
            }
        }

        if !self.hints.is_empty() {
            let _ = write!(
                text,
                "\n\n## Reference examples\n\
                 Follow the structure and idioms of these examples:\n{}",
                self.hints.content
            );
        }

        text
    }

    /// Instructions for the testing review: judge the captured run, answer
    /// with the fixed approval sentinels.
    pub fn review(&self) -> String {
        format!(
            "{BASE_INSTRUCTIONS}\n\n\
             You are in REVIEW mode. The latest script was executed in a \
             sandbox and the outcome is in the conversation. Judge whether \
             the run output matches the agreed requirements.\n\n\
             Reply with the token {APPROVED_TOKEN} only if the run succeeded \
             and the output is what was asked for; otherwise explain what is \
             wrong and include the token {REVISE_TOKEN}. Never include both \
             tokens in one reply."
        )
    }
}

/// Render an execution report as transcript context for the next reasoning
/// call. Timeouts are worded as timeouts, crashes as crashes: the correct fix
/// often differs (infinite loop vs. logic bug), and the prior error is never
/// silently dropped.
pub fn execution_feedback(report: &ExecutionReport, imports: Option<&ImportReport>) -> String {
    let mut text = String::from("[test harness] ");

    match &report.outcome {
        ProcessOutcome::Exited { code: 0 } => {
            let _ = write!(
                text,
                "The script ran and exited cleanly in {} ms.",
                report.duration_ms
            );
        }
        ProcessOutcome::Exited { code } => {
            let _ = write!(text, "The script ran and failed with exit status {code}.");
        }
        ProcessOutcome::TimedOut => {
            text.push_str(
                "The script did not finish: it timed out and was killed. \
                 Check for infinite loops or unbounded reads before anything else.",
            );
        }
        ProcessOutcome::Cancelled => {
            text.push_str("The run was cancelled before it finished.");
        }
        ProcessOutcome::NothingToRun => {
            text.push_str("The extracted code block was empty, so there was nothing to run.");
        }
    }

    if !report.stdout.is_empty() {
        let _ = write!(text, "\n\nstdout:\n{}", report.stdout);
    }
    if !report.stderr.is_empty() {
        let _ = write!(text, "\n\nstderr:\n{}", report.stderr);
    }
    if report.truncated {
        text.push_str("\n\n(output was truncated at the capture limit)");
    }

    if let Some(imports) = imports {
        if !imports.missing.is_empty() {
            let _ = write!(
                text,
                "\n\nMissing modules (not installed here): {}. \
                 Regenerate using only available packages.",
                imports.missing.join(", ")
            );
        }
        for (module, diagnostic) in &imports.failed {
            let _ = write!(text, "\nModule `{module}` failed to import: {diagnostic}");
        }
    }

    text
}

/// Context appended when a generation reply contained no fenced code.
pub fn regeneration_nudge() -> String {
    "[test harness] Your previous reply contained no fenced code block. \
     Reply with the complete script in a single fenced code block."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExecutionReport;

    fn report(outcome: ProcessOutcome) -> ExecutionReport {
        ExecutionReport {
            succeeded: outcome.is_success(),
            outcome,
            stdout: String::new(),
            stderr: String::new(),
            truncated: false,
            duration_ms: 10,
        }
    }

    #[test]
    fn test_planning_names_both_sentinels() {
        let prompts = PromptLibrary::new(HintCorpus::default());
        let text = prompts.planning();
        assert!(text.contains(READY_TOKEN));
        assert!(text.contains(NOT_READY_TOKEN));
    }

    #[test]
    fn test_generation_embeds_requirements_and_hints() {
        let hints = HintCorpus {
            content: "## dimuon\n\nuse uproot".to_string(),
            ..HintCorpus::default()
        };
        let prompts = PromptLibrary::new(hints);
        let mut requirements = BTreeMap::new();
        requirements.insert("dataset".to_string(), "nanoaod".to_string());

        let text = prompts.generation(&requirements);
        assert!(text.contains("- dataset: nanoaod"));
        assert!(text.contains("use uproot"));
    }

    #[test]
    fn test_timeout_feedback_is_worded_as_timeout() {
        let text = execution_feedback(&report(ProcessOutcome::TimedOut), None);
        assert!(text.contains("timed out"));
        assert!(!text.contains("exit status"));
    }

    #[test]
    fn test_crash_feedback_carries_exit_status_and_stderr() {
        let mut r = report(ProcessOutcome::Exited { code: 2 });
        r.stderr = "Traceback: NameError".to_string();
        let text = execution_feedback(&r, None);
        assert!(text.contains("exit status 2"));
        assert!(text.contains("NameError"));
    }

    #[test]
    fn test_missing_modules_are_listed() {
        let imports = ImportReport {
            modules: vec!["coffea".to_string()],
            missing: vec!["coffea".to_string()],
            failed: vec![],
        };
        let text = execution_feedback(&report(ProcessOutcome::Exited { code: 1 }), Some(&imports));
        assert!(text.contains("Missing modules"));
        assert!(text.contains("coffea"));
    }
}
