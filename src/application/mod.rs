pub mod adapter;
pub mod agent;
pub mod client;
pub mod operations;
pub mod sync;
pub mod tooling;
pub mod tracker;
