use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::core::error::LedgerError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Lookup(#[from] LedgerError),
    #[error("Amount set failed!")]
    SetFailed(#[source] LedgerError),
    #[error("Amount modified failed!")]
    ModifyFailed(#[source] LedgerError),
    #[error("Not Found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Lookup(LedgerError::UnknownCurrency(_)) => StatusCode::NOT_FOUND,
            ApiError::Lookup(_) => StatusCode::BAD_REQUEST,
            ApiError::SetFailed(e) | ApiError::ModifyFailed(e) => {
                warn!(error = %e, "Rejected balance update");
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
