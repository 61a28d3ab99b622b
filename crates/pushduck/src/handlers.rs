//! HTTP handlers for the wire protocol.
//!
//! Two endpoints on one path: `GET` lists the defined routes, `POST`
//! dispatches `presign` and `complete`. Action and route name are accepted
//! from the query string (`?action=presign&route=avatar`) or the JSON body;
//! the query string wins when both are present.

use axum::{
    extract::rejection::JsonRejection,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pushduck_common::{ProtocolError, RoutesResponse, UploadAction, UploadRequestBody};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::router::UploadRouter;

/// `action` / `route` taken from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
}

impl UploadRouter {
    /// Mount the two handlers on an [`axum::Router`], with CORS and request
    /// tracing. Hosts nest this wherever their upload endpoint lives:
    ///
    /// ```ignore
    /// let app = axum::Router::new().nest("/api/upload", router.into_axum_router());
    /// ```
    pub fn into_axum_router(self) -> Router {
        let cors = cors_layer(&self.config().security().allowed_origins);
        let mut router = Router::new()
            .route("/", get(handle_get).post(handle_post))
            .with_state(self);
        if let Some(cors) = cors {
            router = router.layer(cors);
        }
        router.layer(TraceLayer::new_for_http())
    }
}

/// Route discovery. Never touches storage.
pub async fn handle_get(State(router): State<UploadRouter>) -> Json<RoutesResponse> {
    Json(router.describe_routes())
}

/// Protocol dispatch for both phases.
pub async fn handle_post(
    State(router): State<UploadRouter>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Result<Json<UploadRequestBody>, JsonRejection>,
) -> Result<Response, ProtocolError> {
    router.check_rate_limit(&client_key(&headers))?;

    let Json(body) = body.map_err(|rejection| {
        ProtocolError::InvalidRequest(format!("Invalid JSON body: {rejection}"))
    })?;

    let action = query
        .action
        .or(body.action)
        .ok_or_else(|| ProtocolError::InvalidRequest("Missing 'action'".to_string()))?;
    let action = UploadAction::parse(&action)
        .ok_or_else(|| ProtocolError::InvalidRequest(format!("Unknown action '{action}'")))?;
    let route = query
        .route
        .or(body.route)
        .ok_or_else(|| ProtocolError::InvalidRequest("Missing 'route'".to_string()))?;

    match action {
        UploadAction::Presign => {
            let files = body.files.ok_or_else(|| {
                ProtocolError::InvalidRequest("Presign requests need 'files'".to_string())
            })?;
            let response = router.presign(&route, files).await?;
            Ok(Json(response).into_response())
        }
        UploadAction::Complete => {
            let completions = body.completions.ok_or_else(|| {
                ProtocolError::InvalidRequest("Completion requests need 'completions'".to_string())
            })?;
            let response = router.complete(&route, completions).await?;
            Ok(Json(response).into_response())
        }
    }
}

/// Client key for rate limiting: first `X-Forwarded-For` hop when present.
/// Hosts terminating TLS themselves can also enforce limits upstream.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// CORS layer from `security.allowed_origins`. `*` means any origin; an
/// empty list disables the layer entirely.
fn cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    if allowed_origins.is_empty() {
        return None;
    }
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any);
    if allowed_origins.iter().any(|origin| origin == "*") {
        return Some(layer.allow_origin(Any));
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin = %origin, "Invalid CORS origin, skipping");
                None
            })
        })
        .collect();
    Some(layer.allow_origin(AllowOrigin::list(origins)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 198.51.100.1".parse().unwrap(),
        );
        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_key_defaults_when_absent() {
        assert_eq!(client_key(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_cors_layer_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["https://app.example.com".to_string()]).is_some());
        assert!(cors_layer(&["*".to_string()]).is_some());
    }
}
