//! services/api/src/bin/api.rs

use async_openai::{config::OpenAIConfig, types::audio::SpeechModel, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use pictolink_api::{
    adapters::{
        tts::parse_voice, CatalogFileSource, DbAdapter, NlpHttpAdapter, OpenAiGlossAdapter,
        OpenAiSstAdapter, OpenAiTtsAdapter,
    },
    config::{Config, ConfigError},
    error::ApiError,
    web::{
        category_pictograms_handler, conversation_messages_handler, get_preferences_handler,
        list_categories_handler, logout_handler, middleware::require_auth, rest::ApiDoc,
        search_pictograms_handler,
        state::{AppState, PreferenceRegistry},
        toggle_favorite_handler, ws_handler,
    },
};
use pictolink_core::ports::{GlossService, SpeechToTextService, TextToSpeechService};
use pictolink_core::{ComposerServices, CuratedCategories, PictogramCatalog, SuggestionClient};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool).with_inbox_poll(config.inbox_poll));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder().build()?;
    let nlp_adapter = Arc::new(NlpHttpAdapter::new(http_client, config.nlp_api_url.clone()));

    let curated = match &config.curated_categories_path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            CuratedCategories::from_json(&json).map_err(|e| {
                ApiError::Internal(format!("Invalid curated categories {}: {}", path.display(), e))
            })?
        }
        None => CuratedCategories::default(),
    };
    let catalog = Arc::new(PictogramCatalog::new(
        Arc::new(CatalogFileSource::new(config.catalog_path.clone())),
        config.catalog_config(),
        curated,
    ));

    let openai_client = config
        .openai_api_key
        .as_ref()
        .map(|key| Client::with_config(OpenAIConfig::new().with_api_key(key)));

    let glosser: Arc<dyn GlossService> = match (&openai_client, &config.gloss_model) {
        (Some(client), Some(model)) => {
            info!("Glosses will be generated with {}.", model);
            Arc::new(OpenAiGlossAdapter::new(client.clone(), model.clone()))
        }
        _ => nlp_adapter.clone(),
    };

    let (sst_adapter, tts_adapter) = match &openai_client {
        Some(client) => {
            let voice = parse_voice(&config.tts_voice).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TTS_VOICE".to_string(),
                    format!("'{}' is not a known voice", config.tts_voice),
                )
            })?;
            let sst: Arc<dyn SpeechToTextService> =
                Arc::new(OpenAiSstAdapter::new(client.clone(), config.sst_model.clone()));
            let tts: Arc<dyn TextToSpeechService> =
                Arc::new(OpenAiTtsAdapter::new(client.clone(), SpeechModel::Tts1, voice));
            (Some(sst), Some(tts))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; audio dictation and auto-read are disabled.");
            (None, None)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth: db_adapter.clone(),
        transport: db_adapter.clone(),
        catalog,
        suggestions: Arc::new(SuggestionClient::new(nlp_adapter.clone())),
        composer_services: ComposerServices {
            translator: nlp_adapter,
            glosser,
            transport: db_adapter.clone(),
        },
        preferences: Arc::new(PreferenceRegistry::new(db_adapter)),
        sst_adapter,
        tts_adapter,
    });

    let allowed_origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new().route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/ws", get(ws_handler))
        .route("/pictograms/search", get(search_pictograms_handler))
        .route("/pictograms/categories", get(list_categories_handler))
        .route(
            "/pictograms/categories/{category}",
            get(category_pictograms_handler),
        )
        .route("/preferences", get(get_preferences_handler))
        .route("/preferences/favorites", post(toggle_favorite_handler))
        .route(
            "/conversations/{contact_id}/messages",
            get(conversation_messages_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
