//! HTTP surface of the Campus Hub backend: router, handlers, services and the
//! OpenAPI document.

mod error;
mod extract;
mod state;
mod util;

pub mod docs;
pub mod models;
pub mod routes;
pub mod services;

pub use error::{ApiError, ErrorBody, ErrorResponse};
pub use state::AppState;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origins());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", api_routes())
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", docs::ApiDoc::openapi()))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/verify", post(routes::auth::verify_email))
        .route(
            "/auth/resend-verification",
            post(routes::auth::resend_verification),
        )
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/password", put(routes::auth::change_password))
        // Users
        .route("/users/me", put(routes::users::update_me))
        .route("/users/:id", get(routes::users::get_user))
        // Marketplace
        .route(
            "/market/items",
            get(routes::market::list_items).post(routes::market::create_item),
        )
        .route(
            "/market/items/:id",
            get(routes::market::get_item)
                .put(routes::market::update_item)
                .delete(routes::market::delete_item),
        )
        .route(
            "/market/items/:id/comments",
            get(routes::market::list_comments).post(routes::market::create_comment),
        )
        .route(
            "/market/comments/:id",
            axum::routing::delete(routes::market::delete_comment),
        )
        // Carpool
        .route(
            "/rides",
            get(routes::rides::list_rides).post(routes::rides::create_ride),
        )
        .route(
            "/rides/:id",
            get(routes::rides::get_ride).put(routes::rides::update_ride),
        )
        .route("/rides/:id/cancel", post(routes::rides::cancel_ride))
        .route("/rides/:id/join", post(routes::rides::join_ride))
        .route("/rides/:id/leave", post(routes::rides::leave_ride))
        .route("/rides/:id/passengers", get(routes::rides::list_passengers))
        // Messaging
        .route(
            "/conversations",
            get(routes::conversations::list_conversations)
                .post(routes::conversations::create_conversation),
        )
        .route(
            "/conversations/:id/messages",
            get(routes::conversations::list_messages).post(routes::conversations::send_message),
        )
        .route("/conversations/:id/read", post(routes::conversations::mark_read))
        // Groups
        .route(
            "/groups",
            get(routes::groups::list_groups).post(routes::groups::create_group),
        )
        .route(
            "/groups/:id",
            get(routes::groups::get_group)
                .put(routes::groups::update_group)
                .delete(routes::groups::delete_group),
        )
        .route("/groups/:id/join", post(routes::groups::join_group))
        .route("/groups/:id/leave", post(routes::groups::leave_group))
        .route("/groups/:id/members", get(routes::groups::list_members))
        .route(
            "/groups/:id/messages",
            get(routes::groups::list_messages).post(routes::groups::post_message),
        )
        // Notifications
        .route(
            "/notifications",
            get(routes::notifications::list_notifications),
        )
        .route(
            "/notifications/unread-count",
            get(routes::notifications::get_unread_count),
        )
        .route(
            "/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id",
            axum::routing::delete(routes::notifications::delete_notification),
        )
        .route(
            "/notifications/:id/read",
            post(routes::notifications::mark_notification_read),
        )
        // Admin
        .route("/admin/stats", get(routes::admin::stats))
        .route("/admin/users", get(routes::admin::list_users))
        .route("/admin/users/:id", patch(routes::admin::update_user))
}

/// An empty origin list allows any origin; otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}
