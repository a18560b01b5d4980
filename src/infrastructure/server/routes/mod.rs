pub mod agent;
pub mod changes;
pub mod sync;
pub mod tools;
