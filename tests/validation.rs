//! Validation helper composed under the rate limiter, the way API routes stack them.
use http::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use tower::{Layer, ServiceExt};
use turnstile::identity::FORWARDED_FOR;
use turnstile::{FixedWindow, Policy, RateLimitLayer, Validated};

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    amount: u64,
    currency: String,
}

type Handler = fn(PaymentIntent) -> Pin<Box<dyn Future<Output = Response<String>> + Send>>;

fn create_intent(intent: PaymentIntent) -> Pin<Box<dyn Future<Output = Response<String>> + Send>> {
    Box::pin(async move {
        Response::new(json!({ "amount": intent.amount, "currency": intent.currency }).to_string())
    })
}

fn endpoint() -> Validated<PaymentIntent, Handler> {
    let schema = json!({
        "type": "object",
        "required": ["amount", "currency"],
        "properties": {
            "amount": {"type": "integer", "minimum": 50},
            "currency": {"type": "string", "enum": ["usd", "eur"]}
        },
        "additionalProperties": false
    });
    Validated::new(&schema, create_intent as Handler).expect("schema compiles")
}

fn post(body: &str) -> Request<String> {
    Request::post("/api/create-payment-intent")
        .header(FORWARDED_FOR, "1.2.3.4")
        .body(body.to_string())
        .expect("valid request")
}

#[tokio::test]
async fn valid_body_reaches_handler() {
    let res = endpoint().oneshot(post(r#"{"amount": 1200, "currency": "usd"}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(res.body()).unwrap();
    assert_eq!(body, json!({"amount": 1200, "currency": "usd"}));
}

#[tokio::test]
async fn schema_failure_is_400_with_details() {
    let res = endpoint().oneshot(post(r#"{"amount": 10, "currency": "gbp"}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(res.body()).unwrap();
    let errors = body["error"].as_array().expect("error details are a list");
    let paths: Vec<&str> = errors.iter().filter_map(|e| e["path"].as_str()).collect();
    assert!(paths.contains(&"/amount"));
    assert!(paths.contains(&"/currency"));
}

#[tokio::test]
async fn malformed_json_is_400() {
    let res = endpoint().oneshot(post("amount=12")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(res.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("malformed JSON"));
}

#[tokio::test]
async fn rate_limit_runs_before_validation() {
    let limiter = FixedWindow::new(Policy::from_millis(60_000, 1).unwrap());
    let svc = RateLimitLayer::new(limiter).layer(endpoint());

    let first = svc.clone().oneshot(post("not json")).await.unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    // Rejected bodies still count against the limit.
    let second = svc.oneshot(post(r#"{"amount": 1200, "currency": "usd"}"#)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
