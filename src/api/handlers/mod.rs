//! REST API handlers organized by domain.

pub mod anchoring;
pub mod assets;
pub mod certificates;
pub mod verification;

pub use anchoring::*;
pub use assets::*;
pub use certificates::*;
pub use verification::*;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::api::error::{ApiError, ErrorCode};

/// Unwrap a JSON body, answering malformed input with the API error envelope
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::new(ErrorCode::InvalidRequestBody, rejection.body_text()))
}
