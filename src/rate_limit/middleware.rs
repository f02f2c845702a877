use crate::identity;
use crate::rate_limit::{AdmissionControl, Decision};
use crate::response::DenyResponse;
use http::{Request, Response};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that enforces admission control on `http` requests.
///
/// The key is the client identity from the proxy headers plus the request path. Denied requests
/// never reach the inner service; they are answered with a 429 [`DenyResponse`].
#[derive(Debug)]
pub struct RateLimitLayer<L> {
    limiter: Arc<L>,
}

impl<L> Clone for RateLimitLayer<L> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone() }
    }
}

impl<L> RateLimitLayer<L> {
    /// Create a new rate limit layer.
    pub fn new(limiter: L) -> Self {
        Self { limiter: Arc::new(limiter) }
    }

    /// Share an existing limiter between several layers.
    pub fn from_shared(limiter: Arc<L>) -> Self {
        Self { limiter }
    }
}

impl<S, L> Layer<S> for RateLimitLayer<L> {
    type Service = RateLimitService<S, L>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService { inner: service, limiter: self.limiter.clone() }
    }
}

/// Middleware service that enforces admission control.
#[derive(Debug)]
pub struct RateLimitService<S, L> {
    inner: S,
    limiter: Arc<L>,
}

impl<S: Clone, L> Clone for RateLimitService<S, L> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), limiter: self.limiter.clone() }
    }
}

impl<S, L, ReqBody, ResBody> Service<Request<ReqBody>> for RateLimitService<S, L>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    L: AdmissionControl,
    ResBody: From<String>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let decision =
            self.limiter.admit(identity::client_identity(req.headers()), identity::route(&req));
        match decision {
            Decision::Allow { .. } => ResponseFuture::inner(self.inner.call(req)),
            Decision::Deny { retry_after, .. } => {
                ResponseFuture::denied(DenyResponse::new(retry_after).into_http())
            }
        }
    }
}

/// Response future of [`RateLimitService`].
#[pin_project]
pub struct ResponseFuture<F, B> {
    #[pin]
    kind: Kind<F, B>,
}

#[pin_project(project = KindProj)]
enum Kind<F, B> {
    Inner {
        #[pin]
        future: F,
    },
    Denied {
        response: Option<Response<B>>,
    },
}

impl<F, B> ResponseFuture<F, B> {
    fn inner(future: F) -> Self {
        Self { kind: Kind::Inner { future } }
    }

    fn denied(response: Response<B>) -> Self {
        Self { kind: Kind::Denied { response: Some(response) } }
    }
}

impl<F, B, E> Future for ResponseFuture<F, B>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<B>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().kind.project() {
            KindProj::Inner { future } => future.poll(cx),
            KindProj::Denied { response } => {
                Poll::Ready(Ok(response.take().expect("ResponseFuture polled after completion")))
            }
        }
    }
}

impl<F, B> std::fmt::Debug for ResponseFuture<F, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.kind {
            Kind::Inner { .. } => "Inner",
            Kind::Denied { .. } => "Denied",
        };
        f.debug_struct("ResponseFuture").field("kind", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{FixedWindow, Policy};
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn echo(req: Request<String>) -> futures::future::Ready<Result<Response<String>, Infallible>> {
        futures::future::ready(Ok(Response::new(req.into_body())))
    }

    fn request(path: &str) -> Request<String> {
        Request::builder()
            .uri(path)
            .header(identity::FORWARDED_FOR, "1.2.3.4")
            .body("ok".to_string())
            .unwrap()
    }

    #[tokio::test]
    async fn denied_request_never_reaches_inner() {
        let layer = RateLimitLayer::new(FixedWindow::new(Policy::from_millis(60_000, 1).unwrap()));
        let svc = layer.layer(tower::service_fn(echo));

        let first = svc.clone().oneshot(request("/api/test")).await.unwrap();
        assert_eq!(first.status(), http::StatusCode::OK);
        assert_eq!(first.body(), "ok");

        let second = svc.oneshot(request("/api/test")).await.unwrap();
        assert_eq!(second.status(), http::StatusCode::TOO_MANY_REQUESTS);
        assert_ne!(second.body(), "ok");
    }
}
