mod directive;
mod errors;
mod models;
mod runner;
mod runtime;

#[cfg(test)]
mod tests;

pub use errors::AgentError;
pub use models::{AgentOptions, AgentOutcome, AgentStep};
pub use runner::{Agent, MAX_TOOL_STEPS};
