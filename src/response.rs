//! HTTP-shaped responses produced by the limiter and the validation helper.

use http::header::{CONTENT_TYPE, RETRY_AFTER};
use http::{HeaderValue, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// Message carried in every 429 body. Existing clients match on it verbatim.
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests, please try again later";

/// A complete "too many requests" response, returned to the client without further handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenyResponse {
    retry_after: Duration,
}

impl DenyResponse {
    pub fn new(retry_after: Duration) -> Self {
        Self { retry_after }
    }

    /// Always `429 Too Many Requests`.
    pub fn status(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    /// Time until the client's window resets.
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// `Retry-After` value: whole seconds, rounded up so clients never retry early.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// `{"error": "Too many requests, please try again later"}`
    pub fn body(&self) -> Value {
        json!({ "error": TOO_MANY_REQUESTS_MESSAGE })
    }

    /// Render as an `http` response with a JSON body and a `Retry-After` header.
    pub fn into_http<B: From<String>>(self) -> Response<B> {
        let mut response = json_response(self.status(), &self.body());
        response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(self.retry_after_secs()));
        response
    }
}

/// Build a JSON response with the given status.
pub fn json_response<B: From<String>>(status: StatusCode, body: &Value) -> Response<B> {
    let mut response = Response::new(B::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_response_wire_shape_is_exact() {
        let response: Response<String> = DenyResponse::new(Duration::from_secs(59)).into_http();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[RETRY_AFTER], "59");
        assert_eq!(response.body(), r#"{"error":"Too many requests, please try again later"}"#);
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(DenyResponse::new(Duration::from_millis(59_001)).retry_after_secs(), 60);
        assert_eq!(DenyResponse::new(Duration::from_millis(1)).retry_after_secs(), 1);
        assert_eq!(DenyResponse::new(Duration::from_secs(2)).retry_after_secs(), 2);
    }

    #[test]
    fn json_response_sets_status_and_type() {
        let response: Response<String> =
            json_response(StatusCode::BAD_REQUEST, &json!({"error": "nope"}));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.body(), r#"{"error":"nope"}"#);
    }
}
