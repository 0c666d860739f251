pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the main handlers to make them easily accessible
// to the binary that builds the web server router.
pub use auth::logout_handler;
pub use middleware::require_auth;
pub use rest::{
    category_pictograms_handler, conversation_messages_handler, get_preferences_handler,
    list_categories_handler, search_pictograms_handler, toggle_favorite_handler,
};
pub use ws_handler::ws_handler;
