use std::fmt::Display;

use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use todo_core::{DecodeError, DomainError, EncodeError, Envelope, ValidationErrors};

use crate::json::write_json;

const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";
const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
const EDIT_CONFLICT_MESSAGE: &str =
    "unable to update the record due to an edit conflict, please try again";
const TIMEOUT_MESSAGE: &str = "the server timed out processing the request, please try again";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ErrorBody {
    Message(String),
    Fields(ValidationErrors),
}

/// An error response: a status plus the value stored under `"error"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiFailure {
    fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody::Message(message.into()) }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn bad_request(err: &DecodeError) -> Self {
        Self::message(StatusCode::BAD_REQUEST, err.to_string())
    }

    pub(crate) fn failed_validation(errors: ValidationErrors) -> Self {
        Self { status: StatusCode::UNPROCESSABLE_ENTITY, body: ErrorBody::Fields(errors) }
    }

    pub(crate) fn not_found() -> Self {
        Self::message(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    pub(crate) fn method_not_allowed(method: &Method) -> Self {
        Self::message(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("the {method} method is not supported for this resource"),
        )
    }

    pub(crate) fn edit_conflict() -> Self {
        Self::message(StatusCode::CONFLICT, EDIT_CONFLICT_MESSAGE)
    }

    pub(crate) fn timeout() -> Self {
        Self::message(StatusCode::SERVICE_UNAVAILABLE, TIMEOUT_MESSAGE)
    }

    /// Logs the cause and hides it from the client.
    pub(crate) fn server_error(err: &dyn Display) -> Self {
        tracing::error!(error = %err, "request failed");
        Self::message(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
    }

    fn envelope(&self) -> Result<Envelope, EncodeError> {
        match &self.body {
            ErrorBody::Message(message) => Envelope::new().with("error", message),
            ErrorBody::Fields(errors) => Envelope::new().with("error", errors),
        }
    }
}

impl From<DomainError> for ApiFailure {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound => Self::not_found(),
            DomainError::EditConflict => Self::edit_conflict(),
            // The store has already logged the timeout with its operation name.
            DomainError::Timeout { .. } => Self::timeout(),
            DomainError::Invalid { .. } | DomainError::Internal(_) => Self::server_error(&err),
        }
    }
}

impl From<EncodeError> for ApiFailure {
    fn from(err: EncodeError) -> Self {
        Self::server_error(&err)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let written = self
            .envelope()
            .map_err(|err| Self::server_error(&err))
            .and_then(|envelope| write_json(self.status, &envelope, HeaderMap::new()));
        match written {
            Ok(response) => response,
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE).into_response(),
        }
    }
}
