use crate::infrastructure::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("agent response was not a recognised action: {0}")]
    InvalidResponse(String),
    #[error("agent exceeded the limit of {0} tool invocations")]
    StepLimit(usize),
}
