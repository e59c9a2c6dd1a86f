use crate::core::document::Document;
use crate::core::transform::TransformEngine;
use crate::domain::ports::FeedSource;
use crate::utils::error::Result;

/// Fetch, rewrite and re-serialize one feed per call. Holds no per-request state.
pub struct FeedPipeline<S: FeedSource> {
    source: S,
    engine: TransformEngine,
}

impl<S: FeedSource> FeedPipeline<S> {
    pub fn new(source: S, engine: TransformEngine) -> Self {
        Self { source, engine }
    }

    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    pub async fn extract(&self) -> Result<String> {
        self.source.fetch().await
    }

    pub fn transform(&self, feed_text: &str) -> Result<Document> {
        let mut document = Document::parse(feed_text)?;
        let report = self.engine.apply(&mut document);
        tracing::debug!(
            "Applied {} rules to {} items: {} fields rewritten, {} skipped, {} errors",
            self.engine.rules().len(),
            report.items,
            report.fields_rewritten,
            report.rules_skipped,
            report.rule_errors
        );
        Ok(document)
    }

    pub fn load(&self, document: &Document) -> Result<Vec<u8>> {
        document.to_bytes()
    }

    pub async fn run(&self) -> Result<Vec<u8>> {
        let feed_text = self.extract().await?;
        tracing::debug!("Fetched feed ({} chars)", feed_text.len());

        let document = self.transform(&feed_text)?;
        let output = self.load(&document)?;
        tracing::debug!("Generated feed ({} bytes)", output.len());

        Ok(output)
    }
}
