pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{adapter, agent, client, operations, sync, tooling, tracker};
pub use domain::{change, content, types};
pub use infrastructure::{model, server};
