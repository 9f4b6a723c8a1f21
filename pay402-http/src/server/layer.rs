//! Tower layer wiring the payment gate in front of a service.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::body::Body;
use axum_core::response::{IntoResponse, Response};
use http::Request;
use tower::{Layer, Service};

use pay402::facilitator::Facilitator;

use super::paygate::Paygate;

/// Tower [`Layer`] that enforces x402 payment on the wrapped service.
pub struct X402Layer<TFacilitator> {
    paygate: Arc<Paygate<TFacilitator>>,
}

impl<TFacilitator> X402Layer<TFacilitator> {
    /// Creates a layer from a configured payment gate.
    #[must_use]
    pub fn new(paygate: Paygate<TFacilitator>) -> Self {
        Self {
            paygate: Arc::new(paygate),
        }
    }
}

impl<TFacilitator> Clone for X402Layer<TFacilitator> {
    fn clone(&self) -> Self {
        Self {
            paygate: Arc::clone(&self.paygate),
        }
    }
}

impl<TFacilitator> std::fmt::Debug for X402Layer<TFacilitator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Layer").finish_non_exhaustive()
    }
}

impl<S, TFacilitator> Layer<S> for X402Layer<TFacilitator> {
    type Service = X402Middleware<S, TFacilitator>;

    fn layer(&self, inner: S) -> Self::Service {
        X402Middleware {
            inner,
            paygate: Arc::clone(&self.paygate),
        }
    }
}

/// The middleware service produced by [`X402Layer`].
pub struct X402Middleware<S, TFacilitator> {
    inner: S,
    paygate: Arc<Paygate<TFacilitator>>,
}

impl<S: Clone, TFacilitator> Clone for X402Middleware<S, TFacilitator> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            paygate: Arc::clone(&self.paygate),
        }
    }
}

impl<S, TFacilitator> std::fmt::Debug for X402Middleware<S, TFacilitator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Middleware").finish_non_exhaustive()
    }
}

impl<S, TFacilitator> Service<Request<Body>> for X402Middleware<S, TFacilitator>
where
    S: Service<Request<Body>> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Error: IntoResponse,
    S::Future: Send,
    TFacilitator: Facilitator + Send + Sync + 'static,
{
    type Response = Response;
    type Error = std::convert::Infallible;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Inner readiness errors re-surface at call time, where they become
        // responses via IntoResponse.
        self.inner.poll_ready(cx).map(|_| Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Swap keeps the polled-ready instance for this call.
        let inner = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, inner);
        let paygate = Arc::clone(&self.paygate);
        Box::pin(async move { Ok(paygate.handle_request(inner, request).await) })
    }
}
