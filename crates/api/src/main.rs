use anyhow::Context;

use opsflow_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    opsflow_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let app = opsflow_api::app::build_app(&config).context("failed to start execution services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(stage = %config.stage, "listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
