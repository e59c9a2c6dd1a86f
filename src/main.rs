use anyhow::Context;
use clap::Parser;
use feed_transform::utils::{logger, validation::Validate};
use feed_transform::{build_pipeline, serve, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::parse();

    logger::init_logger(&config.log_level, config.json_logs());

    tracing::info!("Starting feed-transform");

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let pipeline = match build_pipeline(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Failed to initialise the feed pipeline: {}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Proxying {} with {} transformation rules",
        config.feed_url()?,
        pipeline.engine().rules().len()
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(listener, AppState::new(pipeline))
        .await
        .context("HTTP server stopped")?;

    Ok(())
}
