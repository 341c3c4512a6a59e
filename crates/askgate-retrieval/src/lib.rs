pub mod error;
pub mod fusion;
pub mod lexical;
pub mod memory_vector;
pub mod search;
pub mod text;

pub use error::*;
pub use fusion::*;
pub use lexical::*;
pub use memory_vector::*;
pub use search::*;
pub use text::{content_terms, is_stopword, tokenize};
