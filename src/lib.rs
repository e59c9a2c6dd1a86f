pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{create_router, serve, AppState, HttpFeedSource};
pub use config::ServiceConfig;
pub use crate::core::{pipeline::FeedPipeline, transform::TransformEngine};
pub use domain::model::{Rule, RuleSet};
pub use utils::error::{FeedError, Result};

/// Wires the fetch adapter, rule set and transform engine described by `config`.
pub fn build_pipeline(config: &ServiceConfig) -> Result<FeedPipeline<HttpFeedSource>> {
    let source = HttpFeedSource::with_timeout(
        config.feed_url()?,
        config.encoding_override(),
        config.fetch_timeout(),
    )?;
    let engine = TransformEngine::new(config.rule_set());
    Ok(FeedPipeline::new(source, engine))
}
