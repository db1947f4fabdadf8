//! services/studio/src/bin/studio.rs

use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use std::sync::Arc;
use studio_lib::{
    adapters::{OpenAiTtsAdapter, PostgrestAdapter, StorageAdapter, SupabaseClient},
    config::Config,
    error::ApiError,
    web::{router, AppState},
};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect the Hosted Backend ---
    let http = reqwest::Client::builder().build()?;
    let supabase = SupabaseClient::new(http, &config.supabase_url, config.supabase_anon_key.clone());
    let auth = Arc::new(supabase.clone());
    let db = Arc::new(PostgrestAdapter::new(supabase.clone()));
    let storage = Arc::new(StorageAdapter::new(supabase, config.audio_bucket.clone()));
    info!("Using hosted backend at {}", config.supabase_url);

    // --- 3. Initialize the Speech Provider ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let tts = Arc::new(OpenAiTtsAdapter::new(
        Client::with_config(openai_config),
        config.tts_model,
    ));
    info!("Speech synthesis model: {}", config.tts_model.as_str());

    // --- 4. Build the Shared AppState ---
    // Starting the state also starts the session bootstrap.
    let app_state = Arc::new(AppState::new(auth, db, storage, tts));

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    let app = router(app_state.clone()).layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    app_state.session.shutdown();
    Ok(())
}
