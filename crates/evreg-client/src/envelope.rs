//! Response envelopes
//!
//! Success: `{ "success": true, "code": ..., "data": ..., "pagination"?: ... }`
//! Error:   `{ "success": false, "code": ..., "message": ..., "statusCode": ..., "errors"?: ... }`
//!
//! Older endpoints answer errors as `{ "error": "..." }`. Bodies that are not
//! enveloped at all are passed through as the payload.

use crate::error::{ApiError, FieldErrors};
use crate::types::Pagination;
use serde::Deserialize;
use serde_json::Value;

/// Known error body shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorBody {
    Envelope {
        message: String,
        #[serde(default, rename = "statusCode")]
        status_code: Option<u16>,
        #[serde(default)]
        code: Option<Value>,
        #[serde(default)]
        errors: Option<Value>,
    },
    Legacy {
        error: String,
    },
}

/// Unwrapped success payload
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
    pub pagination: Option<Pagination>,
}

impl ApiResponse {
    /// Deserialize the payload
    pub fn into_data<T: serde::de::DeserializeOwned>(self) -> Result<T, ApiError> {
        let status = self.status;
        serde_json::from_value(self.data).map_err(|e| ApiError::unexpected_payload(status, &e))
    }
}

/// Interpret a 2xx response body
pub(crate) fn parse_success(status: u16, body: &str) -> Result<ApiResponse, ApiError> {
    if body.trim().is_empty() {
        return Ok(ApiResponse {
            status,
            data: Value::Null,
            pagination: None,
        });
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| ApiError::unexpected_payload(status, &e))?;

    let success = value.get("success").and_then(Value::as_bool);
    match success {
        Some(true) => {
            let pagination = match value.get("pagination") {
                Some(p) if !p.is_null() => Some(
                    serde_json::from_value(p.clone())
                        .map_err(|e| ApiError::unexpected_payload(status, &e))?,
                ),
                _ => None,
            };
            let data = match value {
                Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
                _ => Value::Null,
            };
            Ok(ApiResponse {
                status,
                data,
                pagination,
            })
        }
        Some(false) => {
            let err = match serde_json::from_value::<ErrorBody>(value) {
                Ok(parsed) => ApiError::from_error_body(status, parsed),
                Err(_) => ApiError::new(500, crate::error::GENERIC_ERROR_MESSAGE),
            };
            Err(err)
        }
        None => Ok(ApiResponse {
            status,
            data: value,
            pagination: None,
        }),
    }
}

/// Decode `errors` when it is a map of field to message(s)
///
/// Other shapes are ignored rather than guessed at.
pub(crate) fn decode_field_errors(errors: Value) -> Option<FieldErrors> {
    let Value::Object(map) = errors else {
        return None;
    };

    let mut fields = FieldErrors::new();
    for (field, messages) in map {
        let messages: Vec<String> = match messages {
            Value::String(s) => vec![s],
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => continue,
        };
        if !messages.is_empty() {
            fields.insert(field, messages);
        }
    }

    (!fields.is_empty()).then_some(fields)
}
