use axum::http::HeaderValue;
use enviromind_core::config::HttpConfig;
use tower_http::cors::{Any, CorsLayer};

/// Browser access policy from `http.cors_allowed_origins`.
///
/// `*` (or an empty list) allows any origin; otherwise only the listed ones.
pub fn cors_layer(config: &HttpConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new().allow_headers(Any).allow_methods(Any);

    if origins.is_empty() {
        tracing::debug!("CORS: allowing any origin");
        cors.allow_origin(Any)
    } else {
        tracing::debug!(count = origins.len(), "CORS: restricting to configured origins");
        cors.allow_origin(origins)
    }
}
