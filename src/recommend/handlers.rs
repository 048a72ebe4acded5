use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::warn;

use super::engine::EngineError;
use super::types::*;
use crate::server::AppState;

/// GET /recommend?anime=<name>
///
/// Hands the title to the recommendation script and passes its JSON output
/// through unmodified.
pub async fn get_recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<Value>, ApiError> {
    let anime = match query.anime.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ApiError::MissingAnime),
    };

    let payload = state.engine.recommend(anime).await?;
    Ok(Json(payload))
}

#[derive(Debug)]
pub enum ApiError {
    MissingAnime,
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::MissingAnime => {
                (StatusCode::BAD_REQUEST, "Anime name is required", None)
            }
            ApiError::Engine(EngineError::Invocation(detail)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error executing the Python script",
                Some(detail),
            ),
            ApiError::Engine(EngineError::Diagnostic(stderr)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Python script stderr",
                Some(stderr),
            ),
            ApiError::Engine(EngineError::OutputFormat(detail)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error parsing Python script output",
                Some(detail),
            ),
        };

        warn!(
            status = status.as_u16(),
            error = error,
            details = details.as_deref().unwrap_or(""),
            "recommendation request failed"
        );

        let body = ErrorBody {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::recommend::engine::Recommender;
    use crate::server::{build_router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct SpyEngine {
        calls: AtomicUsize,
        result: fn() -> Result<Value, EngineError>,
    }

    #[async_trait]
    impl Recommender for SpyEngine {
        async fn recommend(&self, _anime: &str) -> Result<Value, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    struct EchoEngine;

    #[async_trait]
    impl Recommender for EchoEngine {
        async fn recommend(&self, anime: &str) -> Result<Value, EngineError> {
            Ok(json!({ "title": anime }))
        }
    }

    fn test_config() -> Config {
        serde_yaml::from_str("recommender:\n  script: rec.py\n").unwrap()
    }

    fn spy(result: fn() -> Result<Value, EngineError>) -> Arc<SpyEngine> {
        Arc::new(SpyEngine {
            calls: AtomicUsize::new(0),
            result,
        })
    }

    fn router_with(engine: Arc<SpyEngine>) -> axum::Router {
        build_router(AppState::new(test_config(), engine))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_anime_is_rejected_without_invoking() {
        let engine = spy(|| Ok(json!({})));
        let response = router_with(engine.clone())
            .oneshot(get("/recommend"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "Error": "Anime name is required" })
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_anime_is_rejected_without_invoking() {
        let engine = spy(|| Ok(json!({})));
        let response = router_with(engine.clone())
            .oneshot(get("/recommend?anime="))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "Error": "Anime name is required" })
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_passes_payload_through() {
        let engine = spy(|| {
            Ok(json!({
                "title": "Naruto",
                "recommendations": ["Bleach", "One Piece"]
            }))
        });
        let response = router_with(engine)
            .oneshot(get("/recommend?anime=Naruto"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "title": "Naruto",
                "recommendations": ["Bleach", "One Piece"]
            })
        );
    }

    #[tokio::test]
    async fn test_invocation_failure_maps_to_500() {
        let engine = spy(|| Err(EngineError::Invocation("script exited with 1".to_string())));
        let response = router_with(engine)
            .oneshot(get("/recommend?anime=Unknown123"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["Error"], "Error executing the Python script");
        assert!(!body["Details"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stderr_maps_to_500() {
        let engine = spy(|| Err(EngineError::Diagnostic("deprecation warning".to_string())));
        let response = router_with(engine)
            .oneshot(get("/recommend?anime=Bleach"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["Error"], "Python script stderr");
        assert_eq!(body["Details"], "deprecation warning");
    }

    #[tokio::test]
    async fn test_unparseable_output_maps_to_500() {
        let engine = spy(|| {
            Err(EngineError::OutputFormat(
                "expected value at line 1 column 1".to_string(),
            ))
        });
        let response = router_with(engine)
            .oneshot(get("/recommend?anime=Bleach"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["Error"], "Error parsing Python script output");
        assert!(!body["Details"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_resolve_independently() {
        let app = build_router(AppState::new(test_config(), Arc::new(EchoEngine)));

        let first = app.clone().oneshot(get("/recommend?anime=Naruto"));
        let second = app.oneshot(get("/recommend?anime=Bleach"));
        let (first, second) = tokio::join!(first, second);

        let first = body_json(first.unwrap()).await;
        let second = body_json(second.unwrap()).await;
        assert_eq!(first["title"], "Naruto");
        assert_eq!(second["title"], "Bleach");
    }
}
