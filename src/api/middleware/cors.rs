use http::HeaderValue;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// CORS policy from a `CORS_ALLOW_ORIGINS` value.
///
/// `*` allows any origin, method and header. This is a development default and should be narrowed
/// to the deployed front-end's origin in production. Any other value is read as a comma-separated
/// origin allow-list.
pub fn cors_layer(allowed: &str) -> CorsLayer {
    let allowed = allowed.trim();

    let origin = if allowed == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
        .allow_origin(origin)
}
