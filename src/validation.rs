//! JSON-schema validation in front of a typed handler.
//!
//! [`Validated`] parses a request body, checks it against a compiled schema, deserializes it
//! into the handler's payload type and only then calls the handler. Any failure short-circuits
//! with `400 Bad Request` and `{"error": <details>}`.

use crate::error::PolicyError;
use crate::response::json_response;
use futures::future::BoxFuture;
use http::{Request, Response, StatusCode};
use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_service::Service;

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer to the offending value (`""` for the document root).
    pub path: String,
    pub message: String,
}

/// Why a body was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The body is not JSON.
    #[error("malformed JSON body: {0}")]
    MalformedJson(String),
    /// The body is JSON but breaks the schema.
    #[error("body failed schema validation ({} violations)", .0.len())]
    Schema(Vec<Violation>),
    /// The body passed the schema but does not fit the handler's payload type.
    #[error("payload does not match expected shape: {0}")]
    Payload(String),
}

impl Rejection {
    /// Value placed under `"error"` in the 400 body.
    pub fn details(&self) -> Value {
        match self {
            Rejection::Schema(violations) => Value::Array(
                violations
                    .iter()
                    .map(|v| json!({ "path": v.path, "message": v.message }))
                    .collect(),
            ),
            other => Value::String(other.to_string()),
        }
    }

    /// Render as `400 Bad Request` with `{"error": <details>}`.
    pub fn into_http<B: From<String>>(self) -> Response<B> {
        json_response(StatusCode::BAD_REQUEST, &json!({ "error": self.details() }))
    }
}

/// A handler guarded by a JSON schema.
pub struct Validated<T, H> {
    schema: Arc<JSONSchema>,
    handler: H,
    _payload: PhantomData<fn() -> T>,
}

impl<T, H: Clone> Clone for Validated<T, H> {
    fn clone(&self) -> Self {
        Self { schema: self.schema.clone(), handler: self.handler.clone(), _payload: PhantomData }
    }
}

impl<T, H> std::fmt::Debug for Validated<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validated").finish_non_exhaustive()
    }
}

impl<T, H> Validated<T, H>
where
    T: DeserializeOwned,
{
    /// Compile `schema` and wrap `handler`. Errors if the schema itself is invalid.
    pub fn new(schema: &Value, handler: H) -> Result<Self, PolicyError> {
        let compiled =
            JSONSchema::compile(schema).map_err(|e| PolicyError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema: Arc::new(compiled), handler, _payload: PhantomData })
    }

    /// Parse, check and deserialize a body.
    pub fn validate(&self, body: &[u8]) -> Result<T, Rejection> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| Rejection::MalformedJson(e.to_string()))?;

        if let Err(errors) = self.schema.validate(&value) {
            let violations = errors
                .map(|e| Violation { path: e.instance_path.to_string(), message: e.to_string() })
                .collect();
            return Err(Rejection::Schema(violations));
        }

        serde_json::from_value(value).map_err(|e| Rejection::Payload(e.to_string()))
    }

    /// Validate `body` and, if it passes, run the handler on the typed payload.
    pub async fn handle<Fut, B>(&self, body: &[u8]) -> Response<B>
    where
        H: Fn(T) -> Fut,
        Fut: Future<Output = Response<B>>,
        B: From<String>,
    {
        match self.validate(body) {
            Ok(payload) => (self.handler)(payload).await,
            Err(rejection) => {
                tracing::debug!(target: "turnstile::validation", error = %rejection, "request body rejected");
                rejection.into_http()
            }
        }
    }
}

impl<T, H, Fut, ReqBody, ResBody> Service<Request<ReqBody>> for Validated<T, H>
where
    T: DeserializeOwned,
    H: Fn(T) -> Fut,
    Fut: Future<Output = Response<ResBody>> + Send + 'static,
    ReqBody: AsRef<[u8]>,
    ResBody: From<String> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        match self.validate(req.body().as_ref()) {
            Ok(payload) => {
                let fut = (self.handler)(payload);
                Box::pin(async move { Ok(fut.await) })
            }
            Err(rejection) => {
                tracing::debug!(target: "turnstile::validation", route = req.uri().path(), error = %rejection, "request body rejected");
                let response = rejection.into_http();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}
