// SPDX-FileCopyrightText: 2026 Botfactory Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use botfactory_core::{BotFactoryError, ConnectionError};
use serde::Serialize;

/// Error response body: `{"error": ..., "code": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// An error returned by a gateway handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: "missing or invalid bearer token".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request",
            message: message.into(),
        }
    }
}

impl From<BotFactoryError> for ApiError {
    fn from(err: BotFactoryError) -> Self {
        let status = match &err {
            BotFactoryError::BotNotFound(_) => StatusCode::NOT_FOUND,
            BotFactoryError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            BotFactoryError::InvalidState { .. } => StatusCode::CONFLICT,
            BotFactoryError::Connection(ConnectionError::NotImplemented { .. }) => {
                StatusCode::NOT_IMPLEMENTED
            }
            BotFactoryError::Connection(ConnectionError::MissingCredentials(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BotFactoryError::Connection(_)
            | BotFactoryError::Delivery(_)
            | BotFactoryError::Ai(_) => StatusCode::BAD_GATEWAY,
            BotFactoryError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BotFactoryError::Config(_)
            | BotFactoryError::Persistence { .. }
            | BotFactoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "admin request failed");
        }
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use botfactory_core::{BotId, BotStatus, Platform};

    use super::*;

    #[test]
    fn status_follows_error_class() {
        let cases = [
            (BotFactoryError::BotNotFound(BotId::from("b1")), StatusCode::NOT_FOUND),
            (
                BotFactoryError::QuotaExceeded {
                    reason: "full".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                BotFactoryError::InvalidState {
                    bot_id: BotId::from("b1"),
                    status: BotStatus::Active,
                    action: "delete",
                },
                StatusCode::CONFLICT,
            ),
            (
                ConnectionError::NotImplemented {
                    platform: Platform::Whatsapp,
                }
                .into(),
                StatusCode::NOT_IMPLEMENTED,
            ),
            (
                ConnectionError::Rejected("bad token".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                BotFactoryError::persistence("disk full"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn body_carries_code_and_message() {
        let err = ApiError::from(BotFactoryError::BotNotFound(BotId::from("b9")));
        assert_eq!(err.code, "bot_not_found");
        let body = serde_json::to_value(ErrorBody {
            error: err.message,
            code: err.code,
        })
        .unwrap();
        assert_eq!(body["error"], "bot not found: b9");
        assert_eq!(body["code"], "bot_not_found");
    }
}
