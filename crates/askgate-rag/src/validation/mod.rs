pub mod grounding;
pub mod judge;
pub mod llm_judge;
pub mod mock_judge;
pub mod pipeline;
pub mod report;
pub mod strategist;

pub use grounding::*;
pub use judge::*;
pub use llm_judge::*;
pub use mock_judge::*;
pub use pipeline::*;
pub use report::*;
pub use strategist::*;
