//! Turns a raw HTTP exchange into a typed envelope or a classified error.

use chrono::Utc;
use serde::de::DeserializeOwned;

use super::headers;
use super::response::ApiResponse;
use crate::error::{ApiClientError, ServerError};
use crate::http::HttpResponse;

/// Validate `response` and decode its body as `T`.
///
/// - status outside 100..=599: [`ApiClientError::InvalidResponse`]
/// - non-2xx: [`ApiClientError::ServerError`] when the body is a known error
///   document, [`ApiClientError::StatusCode`] otherwise
/// - 2xx: `T`, or [`ApiClientError::CannotParse`]
pub fn validate<T>(
    response: &HttpResponse,
    request_id_header: Option<&str>,
) -> Result<ApiResponse<T>, ApiClientError>
where
    T: DeserializeOwned,
{
    let status = response.status;
    if !(100..=599).contains(&status) {
        return Err(ApiClientError::InvalidResponse);
    }

    if !(200..300).contains(&status) {
        return Err(match ServerError::decode(status, &response.body) {
            Some(error) => ApiClientError::ServerError(error),
            None => ApiClientError::StatusCode(status),
        });
    }

    let result = serde_json::from_slice::<T>(&response.body).map_err(ApiClientError::CannotParse)?;

    Ok(ApiResponse {
        result,
        date: headers::response_date(&response.headers).unwrap_or_else(Utc::now),
        links: headers::links(&response.headers),
        rate_info: headers::rate_limit(&response.headers),
        request_id: headers::request_id(&response.headers, request_id_header),
    })
}
