//! Derive the rate-limit key from an inbound request.

use crate::rate_limit::RateKey;
use http::{HeaderMap, Request};

/// Set by the trusted proxy in front of the service.
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Fallback proxy header.
pub const REAL_IP: &str = "x-real-ip";
/// Identity shared by every request that carries neither proxy header.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client identity: `x-forwarded-for`, then `x-real-ip`, then [`UNKNOWN_CLIENT`].
///
/// The header value is used verbatim (trimmed); a forwarded chain like `"1.1.1.1, 10.0.0.1"`
/// is one identity. Empty or non-UTF-8 values count as absent.
pub fn client_identity(headers: &HeaderMap) -> &str {
    [FORWARDED_FOR, REAL_IP]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
}

/// Route identifier: the URI path, without query string.
pub fn route<B>(request: &Request<B>) -> &str {
    request.uri().path()
}

/// Key for `request`.
pub fn rate_key<B>(request: &Request<B>) -> RateKey {
    RateKey::new(client_identity(request.headers()), route(request))
}
