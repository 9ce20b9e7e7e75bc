//! # goflex-edge
//!
//! HTTP front door for GoFlexConnect email: a generic send endpoint, the
//! SMTP and admin test emails, and the new-user webhook.
//!
//! Every route shares one [`AppState`]. Without relay credentials the
//! service still answers, with 503 on every sending route.
//!
//! ```ignore
//! let config = EdgeConfig::load()?;
//! let app = goflex_edge::router(AppState::from_config(&config));
//! let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
//! axum::serve(listener, app).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod state;
pub mod templates;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::EdgeConfig;
pub use error::ApiError;
pub use state::{AppState, RelayInfo};

/// Builds the service router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/send-email", post(handlers::send_email))
        .route("/test-email", post(handlers::test_email))
        .route("/admin-test-email", post(handlers::admin_test_email))
        .route("/new-user-notification", post(handlers::new_user_notification))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Browser clients call from any origin.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}
