//! Typed error handling for the triage service
//!
//! Every failure surfaced by a store, the triage service or the HTTP layer is
//! a [`NayaError`]. Callers can match on the category they care about instead
//! of inspecting strings.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed input (price below minimum, missing reason, missing field)
//! - [`NotFoundError`]: id absent, or no longer in the state the operation expects
//! - [`ConflictError`]: explicit concurrent-write detection
//! - [`AuthError`]: missing/invalid credentials or insufficient role
//! - [`StorageError`]: backend failures
//! - [`ConfigError`]: configuration parsing and validation
//!
//! # Example
//!
//! ```rust,ignore
//! use naya::prelude::*;
//!
//! match triage.validate_order(&id, 1500.0).await {
//!     Ok(order) => println!("validated {}", order.code),
//!     Err(NayaError::NotFound(NotFoundError::Order { id })) => {
//!         println!("order {} already processed", id);
//!     }
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// The main error type of the crate
#[derive(Debug, Error)]
pub enum NayaError {
    /// Malformed input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing record, or record no longer in the expected state
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// Concurrent write detected
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Authentication / authorization failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Storage backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl NayaError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            NayaError::Validation(_) => StatusCode::BAD_REQUEST,
            NayaError::NotFound(_) => StatusCode::NOT_FOUND,
            NayaError::Conflict(_) => StatusCode::CONFLICT,
            NayaError::Auth(e) => e.status_code(),
            NayaError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NayaError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NayaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            NayaError::Validation(e) => e.error_code(),
            NayaError::NotFound(e) => e.error_code(),
            NayaError::Conflict(e) => e.error_code(),
            NayaError::Auth(e) => e.error_code(),
            NayaError::Storage(_) => "STORAGE_ERROR",
            NayaError::Config(_) => "CONFIG_ERROR",
            NayaError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message may be shown to a client as-is
    fn is_client_facing(&self) -> bool {
        !matches!(
            self,
            NayaError::Storage(_) | NayaError::Config(_) | NayaError::Internal(_)
        )
    }

    /// Convert to an error response
    ///
    /// Infrastructure errors are rendered with a generic message; the real
    /// cause only goes to the logs.
    pub fn to_response(&self) -> ErrorResponse {
        if !self.is_client_facing() {
            return ErrorResponse {
                code: self.error_code().to_string(),
                message: "Internal server error".to_string(),
                details: None,
            };
        }

        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    /// Get additional details for the error
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            NayaError::Validation(ValidationError::PriceTooLow { price, min }) => {
                Some(serde_json::json!({ "price": price, "min": min }))
            }
            NayaError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            NayaError::NotFound(e) => Some(serde_json::json!({
                "resource": e.resource(),
                "id": e.id().to_string(),
            })),
            _ => None,
        }
    }
}

impl IntoResponse for NayaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Price below the configured minimum
    #[error("Price {price} is below the minimum of {min}")]
    PriceTooLow { price: f64, min: f64 },

    /// Price is not a finite number
    #[error("Price must be a finite number")]
    InvalidPrice,

    /// Cancellation without a reason
    #[error("A cancellation reason is required")]
    MissingReason,

    /// Single field validation error
    #[error("Validation error for field '{field}': {message}")]
    FieldError { field: String, message: String },

    /// Multiple field validation errors
    #[error("Validation errors: {}", format_field_errors(.0))]
    FieldErrors(Vec<FieldValidationError>),

    /// Invalid JSON body
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    /// Invalid UUID format
    #[error("Invalid UUID format: {value}")]
    InvalidUuid { value: String },
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

fn format_field_errors(errors: &[FieldValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::PriceTooLow { .. } => "PRICE_TOO_LOW",
            ValidationError::InvalidPrice => "INVALID_PRICE",
            ValidationError::MissingReason => "MISSING_REASON",
            ValidationError::FieldError { .. } => "VALIDATION_ERROR",
            ValidationError::FieldErrors(_) => "VALIDATION_ERROR",
            ValidationError::InvalidJson { .. } => "INVALID_JSON",
            ValidationError::InvalidUuid { .. } => "INVALID_UUID",
        }
    }

    /// Shorthand for a single missing/invalid field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Not Found Errors
// =============================================================================

/// A record is absent, or is no longer in the state the operation expects
///
/// "Already processed" races surface as this error too.
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("Order '{id}' not found or no longer pending")]
    Order { id: Uuid },

    #[error("Inbox entry '{id}' not found")]
    InboxEntry { id: Uuid },

    #[error("Trash entry '{id}' not found")]
    TrashEntry { id: Uuid },
}

impl NotFoundError {
    pub fn error_code(&self) -> &'static str {
        match self {
            NotFoundError::Order { .. } => "ORDER_NOT_FOUND",
            NotFoundError::InboxEntry { .. } => "INBOX_ENTRY_NOT_FOUND",
            NotFoundError::TrashEntry { .. } => "TRASH_ENTRY_NOT_FOUND",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            NotFoundError::Order { .. } => "order",
            NotFoundError::InboxEntry { .. } => "inbox",
            NotFoundError::TrashEntry { .. } => "trash",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            NotFoundError::Order { id }
            | NotFoundError::InboxEntry { id }
            | NotFoundError::TrashEntry { id } => *id,
        }
    }
}

// =============================================================================
// Conflict Errors
// =============================================================================

/// Errors raised when a write collides with existing state
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A record with this id is already stored
    #[error("{resource} with id '{id}' already exists")]
    AlreadyExists { resource: &'static str, id: Uuid },

    /// The record changed between read and write
    #[error("{resource} with id '{id}' was modified concurrently")]
    ConcurrentModification { resource: &'static str, id: Uuid },

    /// Another order already carries this code
    #[error("order code '{code}' is already taken")]
    DuplicateCode { code: String },
}

impl ConflictError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConflictError::AlreadyExists { .. } => "ALREADY_EXISTS",
            ConflictError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            ConflictError::DuplicateCode { .. } => "DUPLICATE_CODE",
        }
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

/// Errors raised by the authentication layer
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential supplied
    #[error("Unauthorized: missing bearer token")]
    MissingCredentials,

    /// Credential supplied but not recognised
    #[error("Unauthorized: invalid bearer token")]
    InvalidCredentials,

    /// Authenticated but lacking the required role
    #[error("Forbidden: role '{role}' may not {action}")]
    Forbidden { role: String, action: String },
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidCredentials => "UNAUTHORIZED",
            AuthError::Forbidden { .. } => "FORBIDDEN",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Query or command failed on the backend
    #[error("{backend} error: {message}")]
    Backend { backend: String, message: String },

    /// A lock guarding an in-memory store was poisoned
    #[error("Lock poisoned on {store} store")]
    LockPoisoned { store: &'static str },

    /// A record could not be (de)serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl StorageError {
    pub fn backend(backend: impl Into<String>, message: impl ToString) -> Self {
        StorageError::Backend {
            backend: backend.into(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse configuration
    #[error("Failed to parse config{}: {message}", .file.as_ref().map(|f| format!(" file '{}'", f)).unwrap_or_default())]
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Invalid value in configuration
    #[error("Invalid value '{value}' for field '{field}': {message}")]
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// IO error while reading configuration
    #[error("IO error: {message}")]
    IoError { message: String },
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for NayaError {
    fn from(err: serde_json::Error) -> Self {
        NayaError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for NayaError {
    fn from(err: serde_yaml::Error) -> Self {
        NayaError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for NayaError {
    fn from(err: std::io::Error) -> Self {
        NayaError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<uuid::Error> for NayaError {
    fn from(err: uuid::Error) -> Self {
        NayaError::Validation(ValidationError::InvalidUuid {
            value: err.to_string(),
        })
    }
}

impl From<validator::ValidationErrors> for NayaError {
    fn from(errors: validator::ValidationErrors) -> Self {
        NayaError::Validation(ValidationError::FieldErrors(field_errors(&errors)))
    }
}

/// Flatten `validator` errors into dotted field paths, sorted by path
pub fn field_errors(errors: &validator::ValidationErrors) -> Vec<FieldValidationError> {
    let mut fields = Vec::new();
    flatten_validation_errors("", errors, &mut fields);
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

/// Walk nested `validator` errors, producing dotted field paths
fn flatten_validation_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<FieldValidationError>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    out.push(FieldValidationError {
                        field: path.clone(),
                        message,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                flatten_validation_errors(&path, inner, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_validation_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

impl From<anyhow::Error> for NayaError {
    fn from(err: anyhow::Error) -> Self {
        NayaError::Internal(err.to_string())
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for triage operations
pub type NayaResult<T> = Result<T, NayaError>;
