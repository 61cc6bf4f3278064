//! hepcode - phase-driven assistant that plans, generates, and sandbox-tests
//! particle-physics analysis code.
//!
//! A session moves through a small state machine - Planning, Generation,
//! Testing, then Complete or Failed - driven by a deterministic controller
//! that consults an external reasoning service, extracts fenced code from its
//! replies, executes the code in an isolated subprocess, and feeds the
//! outcome back as context for the next attempt, up to an iteration budget.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): session state, outcome records, config
//!   model, ports, and the error taxonomy
//! - **Service Layer** (`services`): the phase controller plus the
//!   capabilities it composes (extractor, sandbox executor, sentinel parser,
//!   prompts, import diagnostics)
//! - **Infrastructure Layer** (`infrastructure`): reasoning service clients,
//!   configuration loading, the hint corpus
//! - **CLI Layer** (`cli`): command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ReasoningError, SandboxError, SessionError, SessionResult};
pub use domain::models::{
    Config, ExecutionReport, ExecutorConfig, HintsConfig, Phase, ProcessOutcome, Role,
    SessionConfig, SessionOutcome, SessionState, Turn,
};
pub use domain::ports::ReasoningService;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::reasoning::{AnthropicClient, ScriptedReasoning};
pub use services::{PhaseController, SandboxExecutor, StepOutcome};
