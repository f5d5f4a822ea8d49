//! Political intelligence service
//!
//! Answers political questions through a fixed pipeline of stages (router,
//! planner, researcher, synthesizer, neutralizer, fact-checker) driven by an
//! explicit state machine, and serves it over HTTP.

mod api;
mod config;
mod conversation;
mod llm;
mod runtime;
mod search;
mod stages;
mod state_machine;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{LlmService, LoggingService, OpenAICompatService};
use runtime::{LlmClient, SearchClient, ServiceLlmClient, ServiceSearchClient, TurnRuntime};
use search::{LoggingSearch, SearchService, TavilyService};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polintel=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration; a missing credential is the only fatal startup error
    let config = AppConfig::from_env()?;
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let llm_service: Arc<dyn LlmService> = Arc::new(OpenAICompatService::new(
        &config.llm_base_url,
        &config.llm_model,
        config.llm_api_key.clone(),
    )?);
    let llm: Arc<dyn LlmClient> = Arc::new(ServiceLlmClient::new(Arc::new(LoggingService::new(
        llm_service,
    ))));

    let tavily_key = config.tavily_api_key.clone().unwrap_or_default();
    let search_service: Arc<dyn SearchService> =
        Arc::new(TavilyService::new(tavily_key, config.search_max_results)?);
    let search: Arc<dyn SearchClient> = Arc::new(ServiceSearchClient::new(Arc::new(
        LoggingSearch::new(search_service),
    )));

    tracing::info!(
        model = %config.llm_model,
        base_url = %config.llm_base_url,
        max_retries = config.pipeline.max_retries,
        max_plan_size = config.pipeline.max_plan_size,
        tolerance = config.pipeline.unsupported_claim_tolerance,
        max_sessions = config.sessions.max_sessions,
        "Pipeline configured"
    );

    // Create application state
    let runtime = TurnRuntime::new(config.pipeline.clone(), llm, search);
    let state = AppState::new(runtime, config.sessions);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Political intelligence server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
