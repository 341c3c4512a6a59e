pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod validation;

pub use generator::*;
pub use orchestrator::*;
pub use validation::*;
