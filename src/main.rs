use anyhow::Result;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present, then initialize tracing to stdout
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::try_init().ok();

    info!(
        "Starting Attendance API server v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let app = attendance_api::create_router()?;

    // Wait for the database and apply the schema before accepting traffic
    attendance_api::init_database_with_retry_from_env().await?;

    // Get optional bind endpoint from environment
    let endpoint = env::var("API_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    info!("Starting at endpoint:{}", endpoint);

    let listener = tokio::net::TcpListener::bind(&endpoint).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
