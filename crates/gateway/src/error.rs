use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::DetectionError;
use schema::ErrorReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Detection(DetectionError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Detection(DetectionError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Detection(
                DetectionError::Decode(_)
                | DetectionError::Storage(_)
                | DetectionError::Inference(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorReport::new(self.to_string()))).into_response()
    }
}
