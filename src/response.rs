use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::ability::AbilityError;
use crate::services::catalog::CatalogError;
use crate::services::interaction_log::InteractionError;
use crate::services::learning_path::PathError;
use crate::services::model_registry::RegistryError;
use crate::services::recalibration::RecalibrationError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse { success: true, data })
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    is_operational: bool,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            tracing::error!(code = %self.code, error = %self.message, "request failed");
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

pub fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
        is_operational: true,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<PathError> for AppError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::LearnerNotFound(_) => Self::not_found(err.to_string()),
            PathError::CatalogNotInitialized => json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "CATALOG_NOT_INITIALIZED",
                err.to_string(),
            ),
            PathError::Store(e) => e.into(),
        }
    }
}

impl From<AbilityError> for AppError {
    fn from(err: AbilityError) -> Self {
        match err {
            AbilityError::LearnerNotFound(_) | AbilityError::ItemNotFound(_) => {
                Self::not_found(err.to_string())
            }
            AbilityError::Validation(msg) => Self::validation(msg),
            AbilityError::Store(e) => e.into(),
        }
    }
}

impl From<InteractionError> for AppError {
    fn from(err: InteractionError) -> Self {
        match err {
            InteractionError::Anonymization(_) => Self::bad_request(err.to_string()),
            InteractionError::RetentionOutOfRange(_) => Self::validation(err.to_string()),
            InteractionError::Store(e) => e.into(),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(msg) => Self::validation(msg),
            CatalogError::Sql(e) => e.into(),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::not_found(err.to_string()),
            RegistryError::NotPromotable { .. } | RegistryError::NotTraining(_) => {
                Self::conflict(err.to_string())
            }
            RegistryError::Store(e) => e.into(),
        }
    }
}

impl From<RecalibrationError> for AppError {
    fn from(err: RecalibrationError) -> Self {
        match err {
            RecalibrationError::AlreadyInProgress => Self::conflict(err.to_string()),
            RecalibrationError::EmptyBatch => Self::validation(err.to_string()),
            RecalibrationError::Log(e) => e.into(),
            RecalibrationError::Registry(e) => e.into(),
        }
    }
}
