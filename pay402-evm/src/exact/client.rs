#![cfg(feature = "client")]

//! Client-side authorization signing for the EVM exact scheme.
//!
//! The client builds an ERC-3009 `TransferWithAuthorization` with a random
//! 32-byte nonce and a validity window bounded by the offer's
//! `maxTimeoutSeconds`, signs its EIP-712 hash, and ships signature plus
//! authorization in the payment payload. No node connection is needed; the
//! EIP-712 domain comes from the offer's `extra` hints.

use std::sync::Arc;

use alloy_primitives::B256;
use alloy_signer::Signer;
use alloy_sol_types::eip712_domain;

use pay402::proto::{self, v1, v2};
use pay402::scheme::{
    BoxFuture, PaymentCandidate, PaymentCandidateSigner, SignedPayment, X402Error,
    X402SchemeClient, X402SchemeId,
};
use pay402::timestamp::UnixTimestamp;

use crate::chain::Eip155ChainReference;
use crate::exact::contract::authorization_signing_hash;
use crate::exact::types::{
    self, ExactEvmPayload, ExactEvmPayloadAuthorization, PaymentRequirementsExtra,
};
use crate::exact::{V1Eip155Exact, V2Eip155Exact};
use crate::networks::evm_network_registry;

/// Clock slack subtracted from `validAfter` so a payment signed "now" is
/// immediately valid on nodes with slightly trailing clocks.
const VALID_AFTER_SLACK_SECONDS: u64 = 60;

/// Builds a fresh authorization for an offer.
///
/// The window is `[now - slack, now + max_timeout_seconds)`; the nonce is 32
/// random bytes.
#[must_use]
pub fn build_authorization(
    from: alloy_primitives::Address,
    to: alloy_primitives::Address,
    value: alloy_primitives::U256,
    max_timeout_seconds: u64,
) -> ExactEvmPayloadAuthorization {
    let now = UnixTimestamp::now();
    let mut nonce = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut nonce);
    ExactEvmPayloadAuthorization {
        from,
        to,
        value,
        valid_after: UnixTimestamp::from_secs(
            now.as_secs().saturating_sub(VALID_AFTER_SLACK_SECONDS),
        ),
        valid_before: now + max_timeout_seconds,
        nonce: B256::from(nonce),
    }
}

async fn sign_authorization<S: Signer + Sync>(
    signer: &S,
    chain: &Eip155ChainReference,
    asset: alloy_primitives::Address,
    extra: &PaymentRequirementsExtra,
    authorization: &ExactEvmPayloadAuthorization,
) -> Result<ExactEvmPayload, X402Error> {
    let domain = eip712_domain! {
        name: extra.name.clone(),
        version: extra.version.clone(),
        chain_id: chain.inner(),
        verifying_contract: asset,
    };
    let hash = authorization_signing_hash(authorization, &domain);
    let signature = signer
        .sign_hash(&hash)
        .await
        .map_err(|e| X402Error::SigningError(e.to_string()))?;
    Ok(ExactEvmPayload {
        signature: signature.as_bytes().to_vec().into(),
        authorization: *authorization,
    })
}

/// V2 client for the EVM exact scheme.
#[derive(Clone)]
pub struct V2Eip155ExactClient<S> {
    signer: Arc<S>,
}

impl<S> std::fmt::Debug for V2Eip155ExactClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V2Eip155ExactClient").finish_non_exhaustive()
    }
}

impl<S> V2Eip155ExactClient<S> {
    /// Creates a client over the given signer.
    pub fn new(signer: S) -> Self {
        Self {
            signer: Arc::new(signer),
        }
    }
}

impl<S> X402SchemeId for V2Eip155ExactClient<S> {
    fn namespace(&self) -> &str {
        V2Eip155Exact.namespace()
    }

    fn scheme(&self) -> &str {
        V2Eip155Exact.scheme()
    }
}

impl<S> X402SchemeClient for V2Eip155ExactClient<S>
where
    S: Signer + Send + Sync + 'static,
{
    fn accept(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
        let proto::PaymentRequired::V2(payment_required) = payment_required else {
            return vec![];
        };
        payment_required
            .accepts
            .iter()
            .filter_map(|offer| {
                let requirements: types::PaymentRequirements = offer.as_concrete()?;
                if requirements.network.namespace() != "eip155" {
                    return None;
                }
                // Without the EIP-712 domain hints there is nothing to sign
                // against offline.
                requirements.extra.as_ref()?;
                Some(PaymentCandidate {
                    chain_id: requirements.network.clone(),
                    asset: requirements.asset.to_string(),
                    amount: requirements.amount.to_string(),
                    pay_to: requirements.pay_to.to_string(),
                    scheme: self.scheme().to_owned(),
                    x402_version: self.x402_version(),
                    signer: Box::new(V2PayloadSigner {
                        signer: Arc::clone(&self.signer),
                        requirements,
                        resource: payment_required.resource.clone(),
                    }),
                })
            })
            .collect()
    }
}

struct V2PayloadSigner<S> {
    signer: Arc<S>,
    requirements: types::PaymentRequirements,
    resource: v2::ResourceInfo,
}

impl<S: Signer + Send + Sync> PaymentCandidateSigner for V2PayloadSigner<S> {
    fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>> {
        Box::pin(async move {
            let requirements = &self.requirements;
            let chain = Eip155ChainReference::try_from(&requirements.network)
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            let extra = requirements
                .extra
                .as_ref()
                .ok_or_else(|| X402Error::SigningError("missing EIP-712 domain hints".into()))?;
            let authorization = build_authorization(
                self.signer.address(),
                requirements.pay_to,
                requirements.amount.inner(),
                requirements.max_timeout_seconds,
            );
            let payload =
                sign_authorization(self.signer.as_ref(), &chain, requirements.asset, extra, &authorization)
                    .await?;

            let payment_payload = types::PaymentPayload {
                x402_version: v2::V2,
                accepted: requirements.clone(),
                resource: Some(self.resource.clone()),
                payload,
                extensions: None,
            };
            let header_value = pay402::proto::encoding::encode_header(&payment_payload)
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            Ok(SignedPayment {
                header_value,
                x402_version: 2,
            })
        })
    }
}

/// V1 client for the EVM exact scheme (legacy network names).
#[derive(Clone)]
pub struct V1Eip155ExactClient<S> {
    signer: Arc<S>,
}

impl<S> std::fmt::Debug for V1Eip155ExactClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V1Eip155ExactClient").finish_non_exhaustive()
    }
}

impl<S> V1Eip155ExactClient<S> {
    /// Creates a client over the given signer.
    pub fn new(signer: S) -> Self {
        Self {
            signer: Arc::new(signer),
        }
    }
}

impl<S> X402SchemeId for V1Eip155ExactClient<S> {
    fn x402_version(&self) -> u8 {
        V1Eip155Exact.x402_version()
    }

    fn namespace(&self) -> &str {
        V1Eip155Exact.namespace()
    }

    fn scheme(&self) -> &str {
        V1Eip155Exact.scheme()
    }
}

impl<S> X402SchemeClient for V1Eip155ExactClient<S>
where
    S: Signer + Send + Sync + 'static,
{
    fn accept(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
        let proto::PaymentRequired::V1(payment_required) = payment_required else {
            return vec![];
        };
        payment_required
            .accepts
            .iter()
            .filter_map(|offer| {
                let requirements: types::PaymentRequirementsV1 = offer.as_concrete()?;
                let chain_id = evm_network_registry().canonicalize(&requirements.network)?;
                if chain_id.namespace() != "eip155" {
                    return None;
                }
                requirements.extra.as_ref()?;
                Some(PaymentCandidate {
                    chain_id,
                    asset: requirements.asset.to_string(),
                    amount: requirements.max_amount_required.to_string(),
                    pay_to: requirements.pay_to.to_string(),
                    scheme: self.scheme().to_owned(),
                    x402_version: self.x402_version(),
                    signer: Box::new(V1PayloadSigner {
                        signer: Arc::clone(&self.signer),
                        requirements,
                    }),
                })
            })
            .collect()
    }
}

struct V1PayloadSigner<S> {
    signer: Arc<S>,
    requirements: types::PaymentRequirementsV1,
}

impl<S: Signer + Send + Sync> PaymentCandidateSigner for V1PayloadSigner<S> {
    fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>> {
        Box::pin(async move {
            let requirements = &self.requirements;
            let chain_id = evm_network_registry()
                .canonicalize(&requirements.network)
                .ok_or_else(|| X402Error::SigningError("unknown network".into()))?;
            let chain = Eip155ChainReference::try_from(&chain_id)
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            let extra = requirements
                .extra
                .as_ref()
                .ok_or_else(|| X402Error::SigningError("missing EIP-712 domain hints".into()))?;
            let authorization = build_authorization(
                self.signer.address(),
                requirements.pay_to,
                requirements.max_amount_required.inner(),
                requirements.max_timeout_seconds,
            );
            let payload =
                sign_authorization(self.signer.as_ref(), &chain, requirements.asset, extra, &authorization)
                    .await?;

            let payment_payload = types::PaymentPayloadV1 {
                x402_version: v1::V1,
                scheme: types::ExactScheme,
                network: requirements.network.clone(),
                payload,
            };
            let header_value = pay402::proto::encoding::encode_header(&payment_payload)
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            Ok(SignedPayment {
                header_value,
                x402_version: 1,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, address};

    #[test]
    fn authorization_window_is_bounded_by_timeout() {
        let authorization = build_authorization(
            address!("0x1111111111111111111111111111111111111111"),
            address!("0x2222222222222222222222222222222222222222"),
            U256::from(1000u64),
            60,
        );
        let now = UnixTimestamp::now();
        assert!(authorization.valid_after <= now);
        assert!(authorization.valid_before - now <= 60);
    }

    #[test]
    fn nonces_are_unique() {
        let from = address!("0x1111111111111111111111111111111111111111");
        let to = address!("0x2222222222222222222222222222222222222222");
        let a = build_authorization(from, to, U256::from(1u64), 60);
        let b = build_authorization(from, to, U256::from(1u64), 60);
        assert_ne!(a.nonce, b.nonce);
    }
}
