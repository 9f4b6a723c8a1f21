//! Client-side payment creation: scheme clients, candidate selection, and
//! the payment-creation engine with lifecycle hooks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::chain::ChainId;
use crate::proto;

use super::handler::BoxFuture;

/// Errors produced on the client side of the protocol.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum X402Error {
    /// The 402 response could not be parsed.
    #[error("malformed_header: {0}")]
    ParseError(String),
    /// No offered payment option matches a registered scheme client.
    #[error("no_mutually_supported_option")]
    NoMatchingPaymentOption,
    /// The selector returned a candidate that was not offered.
    #[error("selector returned a foreign candidate")]
    SelectorContractViolation,
    /// A before-hook aborted payment creation.
    #[error("aborted_by_hook: {reason}")]
    AbortedByHook {
        /// The reason supplied by the aborting hook.
        reason: String,
    },
    /// Building or signing the payload failed.
    #[error("signing failed: {0}")]
    SigningError(String),
    /// The original request cannot be replayed with payment headers.
    #[error("request is not cloneable")]
    RequestNotCloneable,
}

impl From<serde_json::Error> for X402Error {
    fn from(value: serde_json::Error) -> Self {
        Self::SigningError(value.to_string())
    }
}

/// A signed payment produced by a candidate's signer.
///
/// `header_value` is the base64(JSON(PaymentPayload)) string ready to be put
/// on the wire; `x402_version` tells the transport which header name to use.
#[derive(Debug, Clone)]
pub struct SignedPayment {
    /// Base64-encoded payment payload for the signature header.
    pub header_value: String,
    /// Protocol version of the payload (1 or 2).
    pub x402_version: u8,
}

/// Trait for the deferred signing step of a payment candidate.
///
/// A signer captures the selected requirements; calling [`sign_payment`]
/// performs whatever chain interaction and cryptography the scheme needs and
/// returns the finished payload.
///
/// [`sign_payment`]: PaymentCandidateSigner::sign_payment
pub trait PaymentCandidateSigner: Send + Sync {
    /// Builds and signs the payment payload.
    fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>>;
}

/// A payment option the client is able to fulfill.
///
/// Produced by [`X402SchemeClient::accept`] from one entry of a 402
/// response's `accepts` list, preserving the server's ordering.
pub struct PaymentCandidate {
    /// The network the payment would execute on.
    pub chain_id: ChainId,
    /// The asset to pay with (family-specific encoding).
    pub asset: String,
    /// The amount in atomic units, as a decimal string.
    pub amount: String,
    /// The recipient address.
    pub pay_to: String,
    /// The payment scheme name.
    pub scheme: String,
    /// The protocol version of the offer this candidate came from.
    pub x402_version: u8,
    /// The deferred signer for this candidate.
    pub signer: Box<dyn PaymentCandidateSigner>,
}

impl fmt::Debug for PaymentCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCandidate")
            .field("chain_id", &self.chain_id)
            .field("asset", &self.asset)
            .field("amount", &self.amount)
            .field("scheme", &self.scheme)
            .field("x402_version", &self.x402_version)
            .finish_non_exhaustive()
    }
}

/// Trait for scheme clients that can turn 402 offers into candidates.
///
/// A scheme client owns a signer for one blockchain family and recognizes
/// the offers it can pay (network pattern and version match). Offers it
/// cannot handle yield no candidates.
pub trait X402SchemeClient: Send + Sync {
    /// Returns candidates for every offer this client can fulfill,
    /// preserving the server's preference order.
    fn accept(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate>;
}

/// Strategy for choosing among payment candidates.
///
/// The selector receives the filtered candidate list in server preference
/// order and must return a reference into that list.
pub trait PaymentSelector: Send + Sync {
    /// Selects the candidate to pay with, or `None` to refuse all.
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate>;
}

/// Default selector: the first mutually-supported option, preserving the
/// server's preference order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMatch;

impl PaymentSelector for FirstMatch {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        candidates.first()
    }
}

/// Selector preferring namespaces in the given order, e.g.
/// `["algorand", "solana", "eip155"]`. Candidates from unlisted namespaces
/// rank last; within one rank the server's order is kept.
#[derive(Debug, Clone)]
pub struct PreferNamespaces(pub Vec<String>);

impl PaymentSelector for PreferNamespaces {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        candidates.iter().min_by_key(|c| {
            self.0
                .iter()
                .position(|ns| ns == c.chain_id.namespace())
                .unwrap_or(self.0.len())
        })
    }
}

/// Selector refusing any candidate above a maximum atomic amount.
#[derive(Debug, Clone, Copy)]
pub struct MaxAmount(pub u128);

impl PaymentSelector for MaxAmount {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        candidates
            .iter()
            .find(|c| c.amount.parse::<u128>().is_ok_and(|a| a <= self.0))
    }
}

/// Context passed to client payment-creation hooks.
#[derive(Debug, Clone)]
pub struct PaymentCreationContext {
    /// The parsed 402 response.
    pub payment_required: proto::PaymentRequired,
    /// Scheme and network of the selected candidate.
    pub selected: SelectedCandidate,
}

/// A lightweight description of the selected candidate for hook consumers.
#[derive(Debug, Clone)]
pub struct SelectedCandidate {
    /// The selected network.
    pub chain_id: ChainId,
    /// The selected scheme name.
    pub scheme: String,
    /// The amount in atomic units.
    pub amount: String,
}

/// Decision returned by a before-payment-creation hook.
#[derive(Debug, Clone)]
pub enum ClientHookDecision {
    /// Proceed with payment creation.
    Continue,
    /// Abort with the given reason.
    Abort {
        /// Machine-readable abort reason.
        reason: String,
    },
}

/// Decision returned by a payment-creation failure hook.
#[derive(Debug, Clone)]
pub enum ClientFailureRecovery {
    /// Let the error propagate.
    Propagate,
    /// Substitute this signed payment for the failure.
    Recovered(SignedPayment),
}

type BeforeCreationHookFn =
    dyn Fn(PaymentCreationContext) -> BoxFuture<'static, ClientHookDecision> + Send + Sync;
type AfterCreationHookFn = dyn Fn(PaymentCreationContext, SignedPayment) -> BoxFuture<'static, Result<(), String>>
    + Send
    + Sync;
type CreationFailureHookFn =
    dyn Fn(PaymentCreationContext, String) -> BoxFuture<'static, ClientFailureRecovery>
        + Send
        + Sync;

/// Lifecycle hooks for client-side payment creation.
#[derive(Clone, Default)]
pub struct ClientHooks {
    before: Vec<Arc<BeforeCreationHookFn>>,
    after: Vec<Arc<AfterCreationHookFn>>,
    on_failure: Vec<Arc<CreationFailureHookFn>>,
}

impl fmt::Debug for ClientHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("on_failure", &self.on_failure.len())
            .finish()
    }
}

impl ClientHooks {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook to run before payment creation.
    #[must_use]
    pub fn on_before_payment_creation<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(PaymentCreationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientHookDecision> + Send + 'static,
    {
        self.before.push(Arc::new(move |ctx| Box::pin(hook(ctx))));
        self
    }

    /// Registers a hook to run after successful payment creation.
    #[must_use]
    pub fn on_after_payment_creation<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(PaymentCreationContext, SignedPayment) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.after
            .push(Arc::new(move |ctx, signed| Box::pin(hook(ctx, signed))));
        self
    }

    /// Registers a hook to run when payment creation fails.
    #[must_use]
    pub fn on_payment_creation_failure<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(PaymentCreationContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientFailureRecovery> + Send + 'static,
    {
        self.on_failure
            .push(Arc::new(move |ctx, err| Box::pin(hook(ctx, err))));
        self
    }
}

/// The client-side payment engine.
///
/// Holds the registered scheme clients, the candidate selector, and the
/// lifecycle hooks. Transport integrations (e.g., the reqwest middleware in
/// `pay402-http`) call [`create_payment_payload`] and put the result on the
/// wire.
///
/// [`create_payment_payload`]: X402PaymentClient::create_payment_payload
pub struct X402PaymentClient<TSelector = FirstMatch> {
    schemes: Vec<Arc<dyn X402SchemeClient>>,
    selector: TSelector,
    hooks: ClientHooks,
}

impl fmt::Debug for X402PaymentClient<FirstMatch> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X402PaymentClient")
            .field("schemes", &self.schemes.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl X402PaymentClient<FirstMatch> {
    /// Creates a payment client with the default [`FirstMatch`] selector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for X402PaymentClient<FirstMatch> {
    fn default() -> Self {
        Self {
            schemes: Vec::new(),
            selector: FirstMatch,
            hooks: ClientHooks::default(),
        }
    }
}

impl<TSelector> X402PaymentClient<TSelector> {
    /// Registers a scheme client.
    #[must_use]
    pub fn register<S: X402SchemeClient + 'static>(mut self, scheme: S) -> Self {
        self.schemes.push(Arc::new(scheme));
        self
    }

    /// Replaces the candidate selector.
    #[must_use]
    pub fn with_selector<P: PaymentSelector + 'static>(self, selector: P) -> X402PaymentClient<P> {
        X402PaymentClient {
            schemes: self.schemes,
            selector,
            hooks: self.hooks,
        }
    }

    /// Replaces the lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ClientHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Collects candidates for every offer a registered client can fulfill.
    #[must_use]
    pub fn candidates(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
        let mut candidates = Vec::new();
        for client in &self.schemes {
            candidates.extend(client.accept(payment_required));
        }
        candidates
    }
}

impl<TSelector: PaymentSelector> X402PaymentClient<TSelector> {
    /// Creates a signed payment payload for a 402 response.
    ///
    /// Filters the offered requirements to those a registered scheme client
    /// supports, runs the selector, executes the lifecycle hooks, and signs
    /// the selected candidate.
    ///
    /// # Errors
    ///
    /// - [`X402Error::NoMatchingPaymentOption`] when no offer is supported
    /// - [`X402Error::AbortedByHook`] when a before-hook aborts
    /// - [`X402Error::SigningError`] when signing fails and no failure hook
    ///   recovers
    pub async fn create_payment_payload(
        &self,
        payment_required: &proto::PaymentRequired,
    ) -> Result<SignedPayment, X402Error> {
        let candidates = self.candidates(payment_required);
        if candidates.is_empty() {
            return Err(X402Error::NoMatchingPaymentOption);
        }

        let selected = self
            .selector
            .select(&candidates)
            .ok_or(X402Error::NoMatchingPaymentOption)?;
        // The selector contract: the selection must be one of the offered
        // candidates, not a candidate it fabricated.
        if !candidates
            .iter()
            .any(|c| std::ptr::eq(c, selected))
        {
            return Err(X402Error::SelectorContractViolation);
        }

        let ctx = PaymentCreationContext {
            payment_required: payment_required.clone(),
            selected: SelectedCandidate {
                chain_id: selected.chain_id.clone(),
                scheme: selected.scheme.clone(),
                amount: selected.amount.clone(),
            },
        };

        for hook in &self.hooks.before {
            if let ClientHookDecision::Abort { reason } = hook(ctx.clone()).await {
                return Err(X402Error::AbortedByHook { reason });
            }
        }

        match selected.signer.sign_payment().await {
            Ok(signed) => {
                for hook in &self.hooks.after {
                    if let Err(_err) = hook(ctx.clone(), signed.clone()).await {
                        #[cfg(feature = "telemetry")]
                        tracing::warn!(error = %_err, "after-payment-creation hook failed");
                    }
                }
                Ok(signed)
            }
            Err(err) => {
                let message = err.to_string();
                for hook in &self.hooks.on_failure {
                    if let ClientFailureRecovery::Recovered(signed) =
                        hook(ctx.clone(), message.clone()).await
                    {
                        return Ok(signed);
                    }
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::v1;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSigner {
        header: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl PaymentCandidateSigner for StaticSigner {
        fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let header = self.header;
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(X402Error::SigningError("no key".into()))
                } else {
                    Ok(SignedPayment {
                        header_value: header.to_owned(),
                        x402_version: 2,
                    })
                }
            })
        }
    }

    struct StaticSchemeClient {
        namespace: &'static str,
        header: &'static str,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl X402SchemeClient for StaticSchemeClient {
        fn accept(&self, _payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
            vec![PaymentCandidate {
                chain_id: ChainId::new(self.namespace, "ref"),
                asset: "asset".into(),
                amount: "1000".into(),
                pay_to: "receiver".into(),
                scheme: "exact".into(),
                x402_version: 2,
                signer: Box::new(StaticSigner {
                    header: self.header,
                    fail: self.fail,
                    calls: Arc::clone(&self.calls),
                }),
            }]
        }
    }

    fn scheme_client(namespace: &'static str, header: &'static str) -> StaticSchemeClient {
        StaticSchemeClient {
            namespace,
            header,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn payment_required() -> proto::PaymentRequired {
        proto::PaymentRequired::V1(v1::PaymentRequired {
            x402_version: v1::V1,
            accepts: vec![],
            error: None,
        })
    }

    #[tokio::test]
    async fn default_selector_takes_first_candidate() {
        let client = X402PaymentClient::new()
            .register(scheme_client("eip155", "evm-header"))
            .register(scheme_client("algorand", "avm-header"));

        let signed = client
            .create_payment_payload(&payment_required())
            .await
            .unwrap();
        assert_eq!(signed.header_value, "evm-header");
    }

    #[tokio::test]
    async fn prefer_namespaces_reorders() {
        let client = X402PaymentClient::new()
            .register(scheme_client("eip155", "evm-header"))
            .register(scheme_client("algorand", "avm-header"))
            .with_selector(PreferNamespaces(vec!["algorand".into(), "eip155".into()]));

        let signed = client
            .create_payment_payload(&payment_required())
            .await
            .unwrap();
        assert_eq!(signed.header_value, "avm-header");
    }

    #[tokio::test]
    async fn no_registered_client_fails_without_signing() {
        let client = X402PaymentClient::new();
        let err = client
            .create_payment_payload(&payment_required())
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::NoMatchingPaymentOption));
    }

    #[tokio::test]
    async fn before_hook_abort_skips_signer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scheme = StaticSchemeClient {
            namespace: "eip155",
            header: "h",
            fail: false,
            calls: Arc::clone(&calls),
        };
        let hooks = ClientHooks::new().on_before_payment_creation(|_ctx| async {
            ClientHookDecision::Abort {
                reason: "budget exceeded".into(),
            }
        });
        let client = X402PaymentClient::new().register(scheme).with_hooks(hooks);

        let err = client
            .create_payment_payload(&payment_required())
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::AbortedByHook { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_hook_recovers_payload() {
        let scheme = StaticSchemeClient {
            namespace: "eip155",
            header: "h",
            fail: true,
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let hooks = ClientHooks::new().on_payment_creation_failure(|_ctx, _err| async {
            ClientFailureRecovery::Recovered(SignedPayment {
                header_value: "recovered".into(),
                x402_version: 2,
            })
        });
        let client = X402PaymentClient::new().register(scheme).with_hooks(hooks);

        let signed = client
            .create_payment_payload(&payment_required())
            .await
            .unwrap();
        assert_eq!(signed.header_value, "recovered");
    }

    #[tokio::test]
    async fn after_hook_error_is_swallowed() {
        let scheme = scheme_client("eip155", "h");
        let hooks = ClientHooks::new()
            .on_after_payment_creation(|_ctx, _signed| async { Err("boom".to_owned()) });
        let client = X402PaymentClient::new().register(scheme).with_hooks(hooks);

        assert!(client.create_payment_payload(&payment_required()).await.is_ok());
    }
}
