//! Structured API error responses with error codes
//!
//! Every failing endpoint answers with the same envelope: a stable
//! machine-readable code, its numeric form and a human-readable message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::AnchorError;
use crate::ledger::{ContractError, ValidationError};

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (3xxx)
    InvalidRequestBody,
    MissingRequiredField,
    InvalidFieldValue,

    // Resource errors (4xxx)
    CertificateNotFound,
    BatchNotFound,
    AssetNotFound,

    // Conflict errors (5xxx)
    CertificateExists,
    AlreadyConfirmed,
    AlreadyBatched,
    AlreadyExists,
    /// The ledger holds a different root under the same globalRootID
    ConflictingAnchor,
    AlreadyWrittenBack,

    // State errors (7xxx)
    /// Certificate has no local-chain proof yet
    NotLocallyCommitted,
    /// No confirmed certificates to batch
    NothingToAnchor,

    // Infrastructure errors (8xxx)
    DatabaseError,
    InternalError,

    // Ledger errors (9xxx)
    /// The contract rejected the transaction during simulation
    LedgerRejected,
    /// The transaction lost an MVCC race at commit
    CommitConflict,
    /// Submission outcome could not be observed
    CommitStatusUnknown,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::InvalidRequestBody => 3001,
            ErrorCode::MissingRequiredField => 3002,
            ErrorCode::InvalidFieldValue => 3003,

            ErrorCode::CertificateNotFound => 4002,
            ErrorCode::BatchNotFound => 4003,
            ErrorCode::AssetNotFound => 4004,

            ErrorCode::CertificateExists => 5001,
            ErrorCode::AlreadyConfirmed => 5002,
            ErrorCode::AlreadyBatched => 5003,
            ErrorCode::AlreadyExists => 5004,
            ErrorCode::ConflictingAnchor => 5005,
            ErrorCode::AlreadyWrittenBack => 5006,

            ErrorCode::NotLocallyCommitted => 7001,
            ErrorCode::NothingToAnchor => 7002,

            ErrorCode::DatabaseError => 8001,
            ErrorCode::InternalError => 8999,

            ErrorCode::LedgerRejected => 9001,
            ErrorCode::CommitConflict => 9002,
            ErrorCode::CommitStatusUnknown => 9003,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequestBody
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,

            ErrorCode::CertificateNotFound
            | ErrorCode::BatchNotFound
            | ErrorCode::AssetNotFound => StatusCode::NOT_FOUND,

            ErrorCode::CertificateExists
            | ErrorCode::AlreadyConfirmed
            | ErrorCode::AlreadyBatched
            | ErrorCode::AlreadyExists
            | ErrorCode::ConflictingAnchor
            | ErrorCode::AlreadyWrittenBack
            | ErrorCode::CommitConflict => StatusCode::CONFLICT,

            ErrorCode::NotLocallyCommitted | ErrorCode::NothingToAnchor => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ErrorCode::LedgerRejected => StatusCode::BAD_GATEWAY,
            ErrorCode::CommitStatusUnknown => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::CertificateNotFound => "CERTIFICATE_NOT_FOUND",
            ErrorCode::BatchNotFound => "BATCH_NOT_FOUND",
            ErrorCode::AssetNotFound => "ASSET_NOT_FOUND",
            ErrorCode::CertificateExists => "CERTIFICATE_EXISTS",
            ErrorCode::AlreadyConfirmed => "ALREADY_CONFIRMED",
            ErrorCode::AlreadyBatched => "ALREADY_BATCHED",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::ConflictingAnchor => "CONFLICTING_ANCHOR",
            ErrorCode::AlreadyWrittenBack => "ALREADY_WRITTEN_BACK",
            ErrorCode::NotLocallyCommitted => "NOT_LOCALLY_COMMITTED",
            ErrorCode::NothingToAnchor => "NOTHING_TO_ANCHOR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::LedgerRejected => "LEDGER_REJECTED",
            ErrorCode::CommitConflict => "COMMIT_CONFLICT",
            ErrorCode::CommitStatusUnknown => "COMMIT_STATUS_UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetails,
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Related resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                details: None,
                resource_id: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error.code.as_str();
        let mut response = (status, Json(self)).into_response();

        response.headers_mut().insert(
            axum::http::header::HeaderName::from_static("x-error-code"),
            axum::http::HeaderValue::from_static(code),
        );

        response
    }
}

// ============================================================================
// Conversion from AnchorError
// ============================================================================

impl From<AnchorError> for ApiError {
    fn from(err: AnchorError) -> Self {
        let message = err.to_string();

        match err {
            AnchorError::Database(_) => ApiError::new(ErrorCode::DatabaseError, message),
            AnchorError::Contract(ContractError::AlreadyExists(id)) => {
                ApiError::new(ErrorCode::AlreadyExists, message).with_resource_id(id)
            }
            AnchorError::Contract(ContractError::NotFound(id)) => {
                ApiError::new(ErrorCode::AssetNotFound, message).with_resource_id(id)
            }
            AnchorError::Contract(ContractError::InvalidArgument(_)) => {
                ApiError::new(ErrorCode::InvalidFieldValue, message)
            }
            AnchorError::Contract(_) => ApiError::new(ErrorCode::LedgerRejected, message),
            AnchorError::Validation { tx_id, source } => {
                let key = match &source {
                    ValidationError::MvccReadConflict { key } => Some(key.clone()),
                    ValidationError::DuplicateTxId(_) => None,
                };
                ApiError::new(ErrorCode::CommitConflict, message).with_details(
                    serde_json::json!({
                        "txID": tx_id,
                        "key": key,
                    }),
                )
            }
            AnchorError::CommitStatusUnknown { tx_id } => {
                ApiError::new(ErrorCode::CommitStatusUnknown, message)
                    .with_details(serde_json::json!({ "txID": tx_id }))
            }
            AnchorError::ConflictingAnchor {
                global_root_id,
                ledger_root,
                local_root,
            } => ApiError::new(ErrorCode::ConflictingAnchor, message)
                .with_details(serde_json::json!({
                    "ledgerRoot": ledger_root,
                    "localRoot": local_root,
                }))
                .with_resource_id(global_root_id),
            AnchorError::CertificateNotFound(id) => {
                ApiError::new(ErrorCode::CertificateNotFound, message).with_resource_id(id)
            }
            AnchorError::CertificateExists(id) => {
                ApiError::new(ErrorCode::CertificateExists, message).with_resource_id(id)
            }
            AnchorError::AlreadyConfirmed(id) => {
                ApiError::new(ErrorCode::AlreadyConfirmed, message).with_resource_id(id)
            }
            AnchorError::NotLocallyCommitted(id) => {
                ApiError::new(ErrorCode::NotLocallyCommitted, message).with_resource_id(id)
            }
            AnchorError::AlreadyBatched { cert_id, .. } => {
                ApiError::new(ErrorCode::AlreadyBatched, message).with_resource_id(cert_id)
            }
            AnchorError::BatchNotFound(id) => {
                ApiError::new(ErrorCode::BatchNotFound, message).with_resource_id(id)
            }
            AnchorError::AlreadyWrittenBack(id) => {
                ApiError::new(ErrorCode::AlreadyWrittenBack, message).with_resource_id(id)
            }
            AnchorError::EmptyBatch(id) => {
                ApiError::new(ErrorCode::NothingToAnchor, message).with_resource_id(id)
            }
            AnchorError::InvalidInput(_) => ApiError::new(ErrorCode::InvalidFieldValue, message),
            AnchorError::Serialization(_) | AnchorError::Internal(_) => {
                ApiError::new(ErrorCode::InternalError, message)
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Create a not found error for a specific resource type
pub fn not_found(code: ErrorCode, resource_type: &str, id: impl std::fmt::Display) -> ApiError {
    ApiError::new(code, format!("{} not found: {}", resource_type, id))
        .with_resource_id(id.to_string())
}

/// Create a validation error with field details
pub fn validation_error(field: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InvalidFieldValue, message.into())
        .with_details(serde_json::json!({ "field": field }))
}

/// Create a missing-field error
pub fn missing_field(field: &str) -> ApiError {
    ApiError::new(ErrorCode::MissingRequiredField, format!("{field} is required"))
        .with_details(serde_json::json!({ "field": field }))
}
