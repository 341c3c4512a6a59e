pub mod config;
pub mod corpus;
pub mod error;
pub mod filter;
pub mod types;

pub use config::*;
pub use corpus::*;
pub use error::*;
pub use filter::*;
pub use types::*;
