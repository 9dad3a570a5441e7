use crate::{config::RequestVariant, error::ApiError, state::AppState};
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use inference::Detector;
use schema::{DetectionRequest, DetectionResponse};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    #[serde(alias = "Path")]
    pub path: Option<String>,
}

/// `POST /event/create`: detect objects in the image at `Path`.
#[tracing::instrument(skip_all)]
pub async fn create_event<D: Detector>(
    State(state): State<AppState<D>>,
    Query(query): Query<PathQuery>,
    body: Bytes,
) -> Result<Json<DetectionResponse>, ApiError> {
    let request = parse_request(query, &body)?;

    let results = state.service.detect(&request.path).await?;

    let header = match state.variant {
        RequestVariant::Event => Some(request),
        RequestVariant::Minimal => {
            if request.has_header_fields() {
                tracing::debug!("Ignoring event header fields in minimal mode");
            }
            None
        }
    };

    Ok(Json(DetectionResponse { header, results }))
}

/// The JSON body wins; an empty body falls back to the `path` query parameter.
fn parse_request(query: PathQuery, body: &[u8]) -> Result<DetectionRequest, ApiError> {
    let request = if !body.trim_ascii().is_empty() {
        serde_json::from_slice::<DetectionRequest>(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    } else if let Some(path) = query.path {
        DetectionRequest::new(path)
    } else {
        return Err(ApiError::BadRequest("Missing image path".to_string()));
    };

    if request.path.trim().is_empty() {
        return Err(ApiError::BadRequest("Path must not be empty".to_string()));
    }

    Ok(request)
}
