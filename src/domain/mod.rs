pub mod change;
pub mod content;
pub mod types;
