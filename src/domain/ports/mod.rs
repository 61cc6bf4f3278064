//! Ports: interfaces the domain consumes, implemented in `infrastructure`.

pub mod reasoning;

pub use reasoning::ReasoningService;
