use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{catalog::CatalogError, response::ApiResponse};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized(String),

    #[error("Conflict {0}")]
    Conflict(String),

    #[error("Catalog service unavailable")]
    CatalogUnavailable(String),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::CatalogUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::OrmError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(product_id) => {
                AppError::NotFound(format!("Product {product_id} not found"))
            }
            CatalogError::Unavailable(reason) => AppError::CatalogUnavailable(reason),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::OrmError(err) => tracing::error!(error = %err, "database error"),
            AppError::Internal(err) => tracing::error!(error = ?err, "internal error"),
            AppError::CatalogUnavailable(reason) => {
                tracing::warn!(reason = %reason, "catalog unavailable")
            }
            AppError::Unauthorized(reason) => tracing::debug!(reason = %reason, "unauthorized"),
            _ => {}
        }

        // upstream details stay in the logs
        (status, axum::Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
