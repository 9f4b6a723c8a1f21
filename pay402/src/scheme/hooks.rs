//! Lifecycle hooks for the facilitator payment pipeline.
//!
//! Three hook points surround each of verify and settle:
//!
//! - **Before hooks** run first, in registration order; the first abort wins
//!   and the inner handler is never called.
//! - **After hooks** run only after the operation succeeds; their errors are
//!   logged and never flip a success into a failure.
//! - **Failure hooks** run on error; the first to recover substitutes its
//!   response for the error. This is the sole sanctioned recovery path.
//!
//! Wrap any [`SchemeHandler`] in a [`HookedSchemeHandler`] to attach hooks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto;

use super::handler::{BoxFuture, SchemeHandler, SchemeHandlerError};

/// Context passed to facilitator verify hooks.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    /// The raw verify request (payload and requirements as JSON).
    pub request: proto::VerifyRequest,
}

/// Context passed to facilitator settle hooks.
#[derive(Debug, Clone)]
pub struct SettleContext {
    /// The raw settle request.
    pub request: proto::SettleRequest,
}

/// Decision returned by a before-hook.
#[derive(Debug, Clone)]
pub enum HookDecision {
    /// Proceed with the operation.
    Continue,
    /// Abort the operation with the given reason.
    Abort {
        /// Machine-readable abort reason.
        reason: String,
    },
}

/// Decision returned by a failure hook.
#[derive(Debug, Clone)]
pub enum FailureRecovery<T> {
    /// Let the original error propagate.
    Propagate,
    /// Replace the error with this response.
    Recovered(T),
}

type BeforeVerifyHookFn =
    dyn Fn(VerifyContext) -> BoxFuture<'static, HookDecision> + Send + Sync;
type AfterVerifyHookFn = dyn Fn(VerifyContext, proto::VerifyResponse) -> BoxFuture<'static, Result<(), String>>
    + Send
    + Sync;
type VerifyFailureHookFn = dyn Fn(VerifyContext, String) -> BoxFuture<'static, FailureRecovery<proto::VerifyResponse>>
    + Send
    + Sync;
type BeforeSettleHookFn =
    dyn Fn(SettleContext) -> BoxFuture<'static, HookDecision> + Send + Sync;
type AfterSettleHookFn = dyn Fn(SettleContext, proto::SettleResponse) -> BoxFuture<'static, Result<(), String>>
    + Send
    + Sync;
type SettleFailureHookFn = dyn Fn(SettleContext, String) -> BoxFuture<'static, FailureRecovery<proto::SettleResponse>>
    + Send
    + Sync;

/// Collection of lifecycle hooks for the facilitator pipeline.
///
/// All hooks are optional; multiple hooks of one kind run in registration
/// order.
#[derive(Clone, Default)]
pub struct SchemeHandlerHooks {
    before_verify: Vec<Arc<BeforeVerifyHookFn>>,
    after_verify: Vec<Arc<AfterVerifyHookFn>>,
    on_verify_failure: Vec<Arc<VerifyFailureHookFn>>,
    before_settle: Vec<Arc<BeforeSettleHookFn>>,
    after_settle: Vec<Arc<AfterSettleHookFn>>,
    on_settle_failure: Vec<Arc<SettleFailureHookFn>>,
}

impl std::fmt::Debug for SchemeHandlerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemeHandlerHooks")
            .field("before_verify", &self.before_verify.len())
            .field("after_verify", &self.after_verify.len())
            .field("on_verify_failure", &self.on_verify_failure.len())
            .field("before_settle", &self.before_settle.len())
            .field("after_settle", &self.after_settle.len())
            .field("on_settle_failure", &self.on_settle_failure.len())
            .finish()
    }
}

impl SchemeHandlerHooks {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before_verify.is_empty()
            && self.after_verify.is_empty()
            && self.on_verify_failure.is_empty()
            && self.before_settle.is_empty()
            && self.after_settle.is_empty()
            && self.on_settle_failure.is_empty()
    }

    /// Registers a hook to run before payment verification.
    #[must_use]
    pub fn on_before_verify<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(VerifyContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookDecision> + Send + 'static,
    {
        self.before_verify
            .push(Arc::new(move |ctx| Box::pin(hook(ctx))));
        self
    }

    /// Registers a hook to run after successful payment verification.
    #[must_use]
    pub fn on_after_verify<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(VerifyContext, proto::VerifyResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.after_verify
            .push(Arc::new(move |ctx, res| Box::pin(hook(ctx, res))));
        self
    }

    /// Registers a hook to run when payment verification fails.
    #[must_use]
    pub fn on_verify_failure<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(VerifyContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FailureRecovery<proto::VerifyResponse>> + Send + 'static,
    {
        self.on_verify_failure
            .push(Arc::new(move |ctx, err| Box::pin(hook(ctx, err))));
        self
    }

    /// Registers a hook to run before payment settlement.
    #[must_use]
    pub fn on_before_settle<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(SettleContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookDecision> + Send + 'static,
    {
        self.before_settle
            .push(Arc::new(move |ctx| Box::pin(hook(ctx))));
        self
    }

    /// Registers a hook to run after successful payment settlement.
    #[must_use]
    pub fn on_after_settle<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(SettleContext, proto::SettleResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.after_settle
            .push(Arc::new(move |ctx, res| Box::pin(hook(ctx, res))));
        self
    }

    /// Registers a hook to run when payment settlement fails.
    #[must_use]
    pub fn on_settle_failure<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(SettleContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FailureRecovery<proto::SettleResponse>> + Send + 'static,
    {
        self.on_settle_failure
            .push(Arc::new(move |ctx, err| Box::pin(hook(ctx, err))));
        self
    }
}

/// A [`SchemeHandler`] decorator that runs [`SchemeHandlerHooks`] around an
/// inner handler's verify and settle operations.
pub struct HookedSchemeHandler {
    inner: Box<dyn SchemeHandler>,
    hooks: Arc<SchemeHandlerHooks>,
}

impl std::fmt::Debug for HookedSchemeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookedSchemeHandler")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl HookedSchemeHandler {
    /// Wraps an inner handler with the given hooks.
    #[must_use]
    pub fn new(inner: Box<dyn SchemeHandler>, hooks: SchemeHandlerHooks) -> Self {
        Self {
            inner,
            hooks: Arc::new(hooks),
        }
    }
}

impl SchemeHandler for HookedSchemeHandler {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> Pin<Box<dyn Future<Output = Result<proto::VerifyResponse, SchemeHandlerError>> + Send + '_>>
    {
        let hooks = Arc::clone(&self.hooks);
        let hook_ctx = VerifyContext {
            request: request.clone(),
        };

        Box::pin(async move {
            for hook in &hooks.before_verify {
                if let HookDecision::Abort { reason } = hook(hook_ctx.clone()).await {
                    return Err(SchemeHandlerError::Aborted { reason });
                }
            }

            match self.inner.verify(request).await {
                Ok(response) => {
                    for hook in &hooks.after_verify {
                        if let Err(_err) = hook(hook_ctx.clone(), response.clone()).await {
                            #[cfg(feature = "telemetry")]
                            tracing::warn!(error = %_err, "after-verify hook failed");
                        }
                    }
                    Ok(response)
                }
                Err(err) => {
                    let message = err.to_string();
                    for hook in &hooks.on_verify_failure {
                        if let FailureRecovery::Recovered(response) =
                            hook(hook_ctx.clone(), message.clone()).await
                        {
                            return Ok(response);
                        }
                    }
                    Err(err)
                }
            }
        })
    }

    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<proto::SettleResponse, SchemeHandlerError>> + Send + '_>>
    {
        let hooks = Arc::clone(&self.hooks);
        let hook_ctx = SettleContext {
            request: request.clone(),
        };

        Box::pin(async move {
            for hook in &hooks.before_settle {
                if let HookDecision::Abort { reason } = hook(hook_ctx.clone()).await {
                    return Err(SchemeHandlerError::Aborted { reason });
                }
            }

            match self.inner.settle(request).await {
                Ok(response) => {
                    for hook in &hooks.after_settle {
                        if let Err(_err) = hook(hook_ctx.clone(), response.clone()).await {
                            #[cfg(feature = "telemetry")]
                            tracing::warn!(error = %_err, "after-settle hook failed");
                        }
                    }
                    Ok(response)
                }
                Err(err) => {
                    let message = err.to_string();
                    for hook in &hooks.on_settle_failure {
                        if let FailureRecovery::Recovered(response) =
                            hook(hook_ctx.clone(), message.clone()).await
                        {
                            return Ok(response);
                        }
                    }
                    Err(err)
                }
            }
        })
    }

    fn supported(
        &self,
    ) -> Pin<
        Box<dyn Future<Output = Result<proto::SupportedResponse, SchemeHandlerError>> + Send + '_>,
    > {
        self.inner.supported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::PaymentVerificationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl SchemeHandler for CountingHandler {
        fn verify(
            &self,
            _request: proto::VerifyRequest,
        ) -> BoxFuture<'_, Result<proto::VerifyResponse, SchemeHandlerError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(PaymentVerificationError::PaymentNotSigned.into())
                } else {
                    Ok(proto::VerifyResponse::valid("payer".into()))
                }
            })
        }

        fn settle(
            &self,
            _request: proto::SettleRequest,
        ) -> BoxFuture<'_, Result<proto::SettleResponse, SchemeHandlerError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(proto::SettleResponse::Success {
                    payer: "payer".into(),
                    transaction: "tx".into(),
                    network: "test".into(),
                    extensions: None,
                })
            })
        }

        fn supported(
            &self,
        ) -> BoxFuture<'_, Result<proto::SupportedResponse, SchemeHandlerError>> {
            Box::pin(async { Ok(proto::SupportedResponse::default()) })
        }
    }

    fn request() -> proto::VerifyRequest {
        proto::VerifyRequest::from(serde_json::Value::Null)
    }

    #[tokio::test]
    async fn before_hook_abort_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            calls: Arc::clone(&calls),
            fail: false,
        };
        let hooks = SchemeHandlerHooks::new().on_before_verify(|_ctx| async {
            HookDecision::Abort {
                reason: "blocked by policy".into(),
            }
        });
        let hooked = HookedSchemeHandler::new(Box::new(handler), hooks);

        let err = hooked.verify(request()).await.unwrap_err();
        assert!(matches!(err, SchemeHandlerError::Aborted { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_hook_recovers() {
        let handler = CountingHandler {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: true,
        };
        let hooks = SchemeHandlerHooks::new().on_verify_failure(|_ctx, _err| async {
            FailureRecovery::Recovered(proto::VerifyResponse::valid("recovered".into()))
        });
        let hooked = HookedSchemeHandler::new(Box::new(handler), hooks);

        let response = hooked.verify(request()).await.unwrap();
        assert!(response.is_valid());
    }

    #[tokio::test]
    async fn after_hook_error_does_not_fail_operation() {
        let handler = CountingHandler {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        };
        let hooks = SchemeHandlerHooks::new()
            .on_after_verify(|_ctx, _res| async { Err("observer blew up".to_owned()) });
        let hooked = HookedSchemeHandler::new(Box::new(handler), hooks);

        assert!(hooked.verify(request()).await.is_ok());
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order_first_abort_wins() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = Arc::clone(&order);
        let o2 = Arc::clone(&order);
        let hooks = SchemeHandlerHooks::new()
            .on_before_verify(move |_ctx| {
                let order = Arc::clone(&o1);
                async move {
                    order.lock().unwrap().push(1);
                    HookDecision::Abort {
                        reason: "first".into(),
                    }
                }
            })
            .on_before_verify(move |_ctx| {
                let order = Arc::clone(&o2);
                async move {
                    order.lock().unwrap().push(2);
                    HookDecision::Continue
                }
            });
        let handler = CountingHandler {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        };
        let hooked = HookedSchemeHandler::new(Box::new(handler), hooks);

        let err = hooked.verify(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "aborted_by_hook: first");
        assert_eq!(*order.lock().unwrap(), vec![1]);
    }
}
