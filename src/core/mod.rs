pub mod document;
pub mod pipeline;
pub mod template;
pub mod transform;

pub use crate::domain::model::{Rule, RuleSet};
pub use crate::domain::ports::FeedSource;
pub use crate::utils::error::Result;
