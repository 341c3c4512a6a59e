pub mod embedding;
pub mod error;
pub mod factory;
pub mod gated;
pub mod llm_provider;
pub mod mock;
pub mod openai_compatible_provider;
pub mod retry;

pub use embedding::*;
pub use error::*;
pub use factory::*;
pub use gated::*;
pub use llm_provider::*;
pub use mock::*;
pub use openai_compatible_provider::*;
pub use retry::*;
