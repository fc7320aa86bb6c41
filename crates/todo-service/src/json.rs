use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use todo_core::{decode, encode, DecodeError, Envelope, Shape, MAX_BODY_BYTES};

use crate::errors::ApiFailure;

/// Decodes a request body into `T`, mapping every failure to a 400.
///
/// Takes the raw extractor result so an over-limit body is reported with
/// the same wording as any other decode failure.
pub(crate) fn read_json<T: Shape>(payload: Result<Bytes, BytesRejection>) -> Result<T, ApiFailure> {
    let body = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiFailure::bad_request(&DecodeError::BodyTooLarge(MAX_BODY_BYTES))
        } else {
            ApiFailure::bad_request(&DecodeError::Other(rejection.body_text()))
        }
    })?;
    decode(&body).map_err(|err| ApiFailure::bad_request(&err))
}

/// Writes `envelope` as the response body. Entries in `headers` replace
/// any defaults; `Content-Type` is always `application/json`.
pub(crate) fn write_json(
    status: StatusCode,
    envelope: &Envelope,
    headers: HeaderMap,
) -> Result<Response, ApiFailure> {
    let body = encode(envelope)?;
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}
