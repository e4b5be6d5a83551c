//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use biomark_common::BiomarkError;
use biomark_ranker::api::AggregationResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Biomark(#[from] BiomarkError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Biomark(e) => match e {
                BiomarkError::InvalidStrategy { .. }
                | BiomarkError::InvalidParameter { .. }
                | BiomarkError::InvalidClassPair(_)
                | BiomarkError::InvalidRankTable { .. } => StatusCode::BAD_REQUEST,
                BiomarkError::NoData { .. } | BiomarkError::NoEligibleData => StatusCode::NOT_FOUND,
                BiomarkError::AmbiguousSelection { .. } => StatusCode::OK,
                BiomarkError::Io(_) | BiomarkError::Csv(_) | BiomarkError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Biomark(e) => e.kind(),
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ambiguity is answered with a selection prompt, not an error body
        if let ApiError::Biomark(BiomarkError::AmbiguousSelection { candidates }) = self {
            return (StatusCode::OK, Json(AggregationResponse::needs_selection(candidates))).into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "Request rejected");
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomark_common::ClassPair;

    #[test]
    fn test_status_mapping() {
        let bad = ApiError::from(BiomarkError::invalid_parameter("rrfK", "must be positive"));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.kind(), "invalid_parameter");

        let missing = ApiError::from(BiomarkError::NoData { class_pair: None });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let io = ApiError::from(BiomarkError::Io(std::io::Error::other("disk")));
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_ambiguity_is_ok() {
        let err = ApiError::from(BiomarkError::AmbiguousSelection {
            candidates: vec![ClassPair::parse("A_B").unwrap()],
        });
        assert_eq!(err.into_response().status(), StatusCode::OK);
    }
}
