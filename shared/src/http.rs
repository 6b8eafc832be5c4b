//! HTTP helpers for Lambda functions.

use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Success body: `{"message": ...}`.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body used by the subscribe route: `{"error": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(
    status: u16,
    data: &T,
) -> Result<Response<Body>, lambda_http::Error> {
    let response = with_cors(Response::builder())
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))?;

    Ok(response)
}

/// Empty 204 answer to a CORS preflight.
pub fn preflight_response() -> Result<Response<Body>, lambda_http::Error> {
    Ok(with_cors(Response::builder()).status(204).body(Body::Empty)?)
}

fn with_cors(builder: lambda_http::http::response::Builder) -> lambda_http::http::response::Builder {
    builder
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-headers", "content-type")
        .header("access-control-allow-methods", "OPTIONS,POST")
}

/// Parse a request body that must be a JSON object.
///
/// Returns `None` for an empty body, invalid JSON, a non-object document, or
/// an object whose fields do not fit `T`.
pub fn parse_json_object<T: DeserializeOwned>(body: &Body) -> Option<T> {
    let value: serde_json::Value = serde_json::from_slice(body.as_ref()).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscribeRequest;

    #[test]
    fn test_json_response_headers() {
        let response = json_response(200, &MessageBody::new("ok")).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let body = std::str::from_utf8(response.body().as_ref()).unwrap();
        assert_eq!(body, r#"{"message":"ok"}"#);
    }

    #[test]
    fn test_error_body_shape() {
        let response = json_response(400, &ErrorBody::new("Email not provided.")).unwrap();
        let body = std::str::from_utf8(response.body().as_ref()).unwrap();
        assert_eq!(body, r#"{"error":"Email not provided."}"#);
    }

    #[test]
    fn test_parse_json_object() {
        let parsed: Option<SubscribeRequest> =
            parse_json_object(&Body::from(r#"{"email":"fan@example.com"}"#));
        assert_eq!(parsed.unwrap().email.as_deref(), Some("fan@example.com"));

        assert!(parse_json_object::<SubscribeRequest>(&Body::Empty).is_none());
        assert!(parse_json_object::<SubscribeRequest>(&Body::from("not json")).is_none());
        assert!(parse_json_object::<SubscribeRequest>(&Body::from("[]")).is_none());
        assert!(parse_json_object::<SubscribeRequest>(&Body::from(r#"{"email":42}"#)).is_none());
    }
}
