//! Ready-made policies for a storefront API.
//!
//! ## Quick Start
//!
//! ```rust
//! use turnstile::{presets, RateLimitLayer};
//! use http::{Request, Response};
//! use std::convert::Infallible;
//! use tower::{ServiceBuilder, ServiceExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let limits = presets::storefront()?;
//!     let app = ServiceBuilder::new()
//!         .layer(RateLimitLayer::new(limits.clone()))
//!         .service_fn(|_req: Request<String>| async {
//!             Ok::<_, Infallible>(Response::new(String::from("[]")))
//!         });
//!
//!     let req = Request::get("/api/products").body(String::new())?;
//!     let response = app.oneshot(req).await?;
//!     assert_eq!(response.status(), 200);
//!     limits.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Available Presets
//!
//! - [`api_default`]: general API routes (100 requests per minute)
//! - [`payment_intent`]: payment-intent creation (5 requests per minute)
//! - [`storefront`]: both, wired into a [`RouteLimits`] table

use crate::config::RouteLimits;
use crate::error::PolicyError;
use crate::handle::create_limiter;
use crate::rate_limit::Policy;
use std::time::Duration;

const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_REQUESTS: u32 = 100;
const PAYMENT_WINDOW_SECS: u64 = 60;
const PAYMENT_MAX_REQUESTS: u32 = 5;

/// Path of the payment-intent creation endpoint.
pub const PAYMENT_INTENT_ROUTE: &str = "/api/create-payment-intent";

/// 100 requests per client per route per minute.
pub fn api_default() -> Policy {
    Policy::new_unchecked(Duration::from_secs(DEFAULT_WINDOW_SECS), DEFAULT_MAX_REQUESTS)
}

/// 5 requests per client per minute; each call creates a payment-provider object.
pub fn payment_intent() -> Policy {
    Policy::new_unchecked(Duration::from_secs(PAYMENT_WINDOW_SECS), PAYMENT_MAX_REQUESTS)
}

/// [`api_default`] everywhere, [`payment_intent`] on [`PAYMENT_INTENT_ROUTE`].
///
/// Starts two sweepers; must run inside a tokio runtime.
pub fn storefront() -> Result<RouteLimits, PolicyError> {
    Ok(RouteLimits::new(create_limiter(api_default())?)
        .with_route(PAYMENT_INTENT_ROUTE, create_limiter(payment_intent())?))
}
