//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{auth, protocol::MessageView, state::AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use pictolink_core::{Language, Pictogram, SessionContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        search_pictograms_handler,
        list_categories_handler,
        category_pictograms_handler,
        get_preferences_handler,
        toggle_favorite_handler,
        conversation_messages_handler,
        auth::logout_handler,
    ),
    components(
        schemas(
            PictogramListResponse,
            CategoriesResponse,
            PreferencesResponse,
            ToggleFavoriteRequest,
            ToggleFavoriteResponse,
            ConversationResponse,
            MessageView,
        )
    ),
    tags(
        (name = "PictoLink API", description = "Pictogram catalog, preferences and conversation history.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct SearchParams {
    /// Text to look for in labels and synonyms.
    pub q: String,
    /// Label language, `es` (default) or `en`.
    pub lang: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct CategoryParams {
    /// Overrides the configured cap for tag-scanned categories.
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct PictogramListResponse {
    #[schema(value_type = Vec<Object>)]
    pub pictograms: Vec<Pictogram>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PreferencesResponse {
    /// Most recently used first.
    #[schema(value_type = Vec<Object>)]
    pub recent: Vec<Pictogram>,
    /// Most recently favorited first.
    #[schema(value_type = Vec<Object>)]
    pub favorites: Vec<Pictogram>,
}

#[derive(Deserialize, ToSchema)]
pub struct ToggleFavoriteRequest {
    #[schema(value_type = Object)]
    pub pictogram: Pictogram,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleFavoriteResponse {
    pub pictogram_id: u32,
    pub is_favorite: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    pub contact_id: Uuid,
    pub messages: Vec<MessageView>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Search the pictogram catalog by label or synonym.
#[utoipa::path(
    get,
    path = "/pictograms/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching pictograms, at most the configured limit", body = PictogramListResponse),
        (status = 400, description = "Unsupported language")
    )
)]
pub async fn search_pictograms_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<PictogramListResponse>, (StatusCode, String)> {
    let lang = match params.lang.as_deref() {
        Some(lang) => lang
            .parse::<Language>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?,
        None => Language::default(),
    };
    let pictograms = app_state.catalog.search(&params.q, lang).await;
    Ok(Json(PictogramListResponse { pictograms }))
}

/// List the browsable category keys.
#[utoipa::path(
    get,
    path = "/pictograms/categories",
    responses(
        (status = 200, description = "Curated categories first, then catalog tags", body = CategoriesResponse)
    )
)]
pub async fn list_categories_handler(
    State(app_state): State<Arc<AppState>>,
) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: app_state.catalog.categories(),
    })
}

/// Pictograms of one category.
#[utoipa::path(
    get,
    path = "/pictograms/categories/{category}",
    params(
        ("category" = String, Path, description = "Category key, e.g. `food`."),
        CategoryParams
    ),
    responses(
        (status = 200, description = "Curated ids in curated order, or a catalog tag scan", body = PictogramListResponse)
    )
)]
pub async fn category_pictograms_handler(
    State(app_state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(params): Query<CategoryParams>,
) -> Json<PictogramListResponse> {
    let pictograms = app_state.catalog.by_category(&category, params.limit).await;
    Json(PictogramListResponse { pictograms })
}

/// The caller's recent and favorite pictograms.
#[utoipa::path(
    get,
    path = "/preferences",
    responses(
        (status = 200, description = "Current preference lists", body = PreferencesResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn get_preferences_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Json<PreferencesResponse> {
    let snapshot = app_state.preferences.store_for(session).await.snapshot();
    Json(PreferencesResponse {
        recent: snapshot.recent,
        favorites: snapshot.favorites,
    })
}

/// Flip the favorite state of a pictogram.
#[utoipa::path(
    post,
    path = "/preferences/favorites",
    request_body = ToggleFavoriteRequest,
    responses(
        (status = 200, description = "The new favorite state", body = ToggleFavoriteResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn toggle_favorite_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<ToggleFavoriteRequest>,
) -> Json<ToggleFavoriteResponse> {
    let store = app_state.preferences.store_for(session).await;
    let is_favorite = store.toggle_favorite(&request.pictogram).await;
    Json(ToggleFavoriteResponse {
        pictogram_id: request.pictogram.id,
        is_favorite,
    })
}

/// The full history with one contact, oldest first, each message decoded.
#[utoipa::path(
    get,
    path = "/conversations/{contact_id}/messages",
    params(
        ("contact_id" = Uuid, Path, description = "The other participant.")
    ),
    responses(
        (status = 200, description = "Conversation history", body = ConversationResponse),
        (status = 401, description = "Not logged in"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn conversation_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(contact_id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, (StatusCode, String)> {
    let messages = app_state
        .transport
        .get_conversation(session.user_id, contact_id)
        .await
        .map_err(|e| {
            error!("Failed to load conversation with {}: {:?}", contact_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load conversation".to_string(),
            )
        })?;

    Ok(Json(ConversationResponse {
        contact_id,
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}
