use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use blog_quiz::{
    config::Config,
    api::routes::create_router,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("blog_quiz=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;
    tracing::info!(
        ollama_host = %config.ollama_host,
        model = %config.ollama_model,
        "starting server on {}",
        server_addr
    );

    let app_state = AppState::from_config(config)?;
    let model = app_state.generator.model().to_string();
    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;

    tracing::info!("Ollama Quiz API running on http://{}", server_addr);
    tracing::info!("Make sure Ollama is running with the model installed (run: ollama pull {})", model);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
