use std::sync::Arc;

use anyhow::Context;

use mail_relay::config::RelayConfig;
use mail_relay::llm::create_provider;
use mail_relay::pipeline::IntakePipeline;
use mail_relay::webhook::{WEBHOOK_PATH, webhook_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = RelayConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    let llm = create_provider(&config)?;
    let pipeline = Arc::new(
        IntakePipeline::from_config(&config, llm).context("failed to build intake pipeline")?,
    );

    let addr = config.listen_addr()?;
    let app = webhook_routes(pipeline, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        webhook = WEBHOOK_PATH,
        downstream = %config.downstream_url,
        model = %config.model,
        classify_timeout_secs = config.classify_timeout.as_secs(),
        "Webhook server listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
