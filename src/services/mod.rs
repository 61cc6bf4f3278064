//! Service layer: the phase controller and the capabilities it composes.

pub mod controller;
pub mod executor;
pub mod extractor;
pub mod imports;
pub mod prompts;
pub mod signals;

pub use controller::{next_phase, PhaseController, PhaseEvent, StepOutcome};
pub use executor::SandboxExecutor;
pub use extractor::{extract_code, Extraction};
pub use imports::{imported_modules, ImportProbe, ImportReport};
pub use prompts::PromptLibrary;
pub use signals::SignalReading;
