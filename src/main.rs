use anyhow::{Context, Result};
use citydesk::{api, auth::AccessGate, aws::AwsClient, config::Config, logging, query::QueryService};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = Config::load().context("failed to load configuration")?;

    let client = Arc::new(AwsClient::new(&config.aws).context("failed to build AWS client")?);
    let query = Arc::new(QueryService::from_config(&config, client));
    let app = api::create_router(query, AccessGate::new(config.api_key.clone()));

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.server_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.server_port))?;
    tracing::info!("Listening on http://0.0.0.0:{}", config.server_port);
    axum::serve(listener, app).await.context("server terminated")?;
    Ok(())
}
