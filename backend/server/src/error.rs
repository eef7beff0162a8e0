use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::recommend::RecommendError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Page {0} is out of range")]
    PageOutOfRange(u32),

    #[error(transparent)]
    Recommend(#[from] RecommendError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload | AppError::PageOutOfRange(_) => StatusCode::BAD_REQUEST,
            AppError::Recommend(error) => match error {
                RecommendError::InvalidVectorLength { .. } | RecommendError::InvalidWeight { .. } => {
                    StatusCode::BAD_REQUEST
                }
                RecommendError::NotFound { .. } => StatusCode::NOT_FOUND,
                RecommendError::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                RecommendError::PersistenceFailure { .. }
                | RecommendError::Store(_)
                | RecommendError::Task(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        };

        (status, self.to_string()).into_response()
    }
}
