//! In-memory verified-payment cache.
//!
//! Facilitators that want settlement gated on a preceding verification of the
//! same payload attach the hook pair from [`VerifiedPaymentCache::hooks`]:
//! after-verify records a fingerprint of the payment, before-settle aborts
//! when no live fingerprint exists. Entries expire after a TTL that callers
//! should bound by the requirement's `maxTimeoutSeconds`.
//!
//! The cache keys on a SHA-256 fingerprint of the stable payment identity
//! (scheme, network, payer, asset, amount, and the scheme's nonce or the
//! payload hash), so a re-encoded but identical payload still matches.
//!
//! The default store is process-local. [`VerifiedPaymentStore`] is the seam
//! for replacing it with an external store.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::proto;
use crate::scheme::{HookDecision, SchemeHandlerHooks};
use std::sync::Arc;

/// Pluggable storage seam for the verified-payment cache.
pub trait VerifiedPaymentStore: Send + Sync {
    /// Records a fingerprint with a time-to-live.
    fn record(&self, fingerprint: [u8; 32], ttl: Duration);
    /// Returns `true` if the fingerprint is present and not expired, and
    /// consumes it. A fingerprint gates exactly one settlement.
    fn take(&self, fingerprint: &[u8; 32]) -> bool;
}

/// Process-local [`VerifiedPaymentStore`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryStore(DashMap<[u8; 32], Instant>);

impl VerifiedPaymentStore for InMemoryStore {
    fn record(&self, fingerprint: [u8; 32], ttl: Duration) {
        self.0.insert(fingerprint, Instant::now() + ttl);
    }

    fn take(&self, fingerprint: &[u8; 32]) -> bool {
        match self.0.remove(fingerprint) {
            Some((_, deadline)) => Instant::now() <= deadline,
            None => false,
        }
    }
}

/// Computes the payment fingerprint for a raw verify/settle request.
///
/// Hashes the stable identity fields when present and falls back to the full
/// canonical payload JSON for the nonce component, so every scheme gets a
/// usable fingerprint even without a dedicated nonce field.
#[must_use]
pub fn payment_fingerprint(request: &serde_json::Value) -> [u8; 32] {
    let payload = request.get("paymentPayload");
    let accepted = payload
        .and_then(|p| p.get("accepted"))
        .or_else(|| request.get("paymentRequirements"));

    let mut hasher = Sha256::new();
    for field in ["scheme", "network", "amount", "maxAmountRequired", "asset", "payTo"] {
        if let Some(value) = accepted.and_then(|a| a.get(field)) {
            hasher.update(value.to_string().as_bytes());
        }
        hasher.update([0u8]);
    }
    if let Some(inner) = payload.and_then(|p| p.get("payload")) {
        hasher.update(inner.to_string().as_bytes());
    }
    hasher.finalize().into()
}

/// TTL-bounded cache of verified payments.
#[derive(Clone)]
pub struct VerifiedPaymentCache {
    store: Arc<dyn VerifiedPaymentStore>,
    ttl: Duration,
}

impl std::fmt::Debug for VerifiedPaymentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiedPaymentCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl VerifiedPaymentCache {
    /// Creates a cache over the process-local store.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(Arc::new(InMemoryStore::default()), ttl)
    }

    /// Creates a cache over a custom store.
    #[must_use]
    pub fn with_store(store: Arc<dyn VerifiedPaymentStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Records a verified payment.
    pub fn record(&self, request: &proto::VerifyRequest) {
        let fingerprint = payment_fingerprint(request.as_json());
        self.store.record(fingerprint, self.ttl);
    }

    /// Consumes the fingerprint for a settle request, returning whether a
    /// live verification existed.
    #[must_use]
    pub fn take(&self, request: &proto::SettleRequest) -> bool {
        let fingerprint = payment_fingerprint(request.as_json());
        self.store.take(&fingerprint)
    }

    /// Produces the hook pair implementing verify-gated settlement.
    ///
    /// Attach the result to a handler via
    /// [`HookedSchemeHandler`](crate::scheme::HookedSchemeHandler). The
    /// before-settle hook aborts with `authorization_replayed` when the
    /// fingerprint is missing, which covers both "never verified" and
    /// "already settled once".
    #[must_use]
    pub fn hooks(&self) -> SchemeHandlerHooks {
        let record_cache = self.clone();
        let gate_cache = self.clone();
        SchemeHandlerHooks::new()
            .on_after_verify(move |ctx, response| {
                let cache = record_cache.clone();
                async move {
                    if response.is_valid() {
                        cache.record(&ctx.request);
                    }
                    Ok(())
                }
            })
            .on_before_settle(move |ctx| {
                let cache = gate_cache.clone();
                async move {
                    if cache.take(&ctx.request) {
                        HookDecision::Continue
                    } else {
                        HookDecision::Abort {
                            reason: "authorization_replayed".to_owned(),
                        }
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_json(amount: &str) -> serde_json::Value {
        json!({
            "x402Version": 2,
            "paymentPayload": {
                "accepted": {
                    "scheme": "exact",
                    "network": "algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=",
                    "amount": amount,
                    "asset": "10458941",
                    "payTo": "RECEIVER",
                    "maxTimeoutSeconds": 60
                },
                "payload": { "paymentGroup": ["AAAA"], "paymentIndex": 0 }
            }
        })
    }

    #[test]
    fn fingerprint_is_stable_and_amount_sensitive() {
        assert_eq!(
            payment_fingerprint(&request_json("1000")),
            payment_fingerprint(&request_json("1000"))
        );
        assert_ne!(
            payment_fingerprint(&request_json("1000")),
            payment_fingerprint(&request_json("500"))
        );
    }

    #[test]
    fn take_consumes_entry() {
        let cache = VerifiedPaymentCache::new(Duration::from_secs(60));
        let verify = proto::VerifyRequest::from(request_json("1000"));
        let settle = proto::SettleRequest::from(request_json("1000"));

        assert!(!cache.take(&settle));
        cache.record(&verify);
        assert!(cache.take(&settle));
        // A fingerprint gates exactly one settlement.
        let settle_again = proto::SettleRequest::from(request_json("1000"));
        assert!(!cache.take(&settle_again));
    }

    #[test]
    fn expired_entry_does_not_gate() {
        let cache = VerifiedPaymentCache::new(Duration::from_secs(0));
        let verify = proto::VerifyRequest::from(request_json("1000"));
        cache.record(&verify);
        std::thread::sleep(Duration::from_millis(5));
        let settle = proto::SettleRequest::from(request_json("1000"));
        assert!(!cache.take(&settle));
    }
}
