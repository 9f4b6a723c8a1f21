#![cfg(feature = "facilitator")]

//! Facilitator-side verification and settlement for the EVM exact scheme.
//!
//! Verification recovers or validates the EIP-712 signature over the ERC-3009
//! authorization, checks the requirement fields and the validity window,
//! consults `authorizationState` for replay, checks the payer's balance, and
//! simulates the transfer call. Settlement submits the same call from the
//! facilitator's wallet.
//!
//! Three signature shapes are supported:
//!
//! - **EOA** (64/65 bytes): recovered locally; must recover to `from`.
//! - **EIP-1271**: passed through to the token contract, which asks the
//!   wallet contract to validate it.
//! - **EIP-6492**: counterfactual wallets; validated through the universal
//!   validator, with wallet deployment folded into settlement when needed.

use alloy_primitives::{Address, B256, Bytes, Signature, U256, hex};
use alloy_provider::Provider;
use alloy_sol_types::{Eip712Domain, SolValue, eip712_domain};

use pay402::chain::{ChainId, ChainProviderOps};
use pay402::proto::{self, PaymentVerificationError};
use pay402::scheme::{BoxFuture, SchemeHandler, SchemeHandlerBuilder, SchemeHandlerError};
use pay402::timestamp::UnixTimestamp;

use crate::chain::{Eip155ChainError, Eip155ChainProvider, Eip155ChainReference, MetaTransaction};
use crate::exact::contract::{
    IEIP3009, Sig6492, VALIDATOR_ADDRESS, Validator6492, authorization_signing_hash,
};
use crate::exact::types::{
    self, EXACT_SCHEME, ExactEvmPayload, ExactEvmPayloadAuthorization, PaymentRequirementsExtra,
};
use crate::exact::{V1Eip155Exact, V2Eip155Exact};
use crate::networks::evm_network_registry;

/// Grace period in seconds applied to the expiry check, absorbing clock skew
/// and settlement latency.
const EXPIRY_GRACE_SECONDS: u64 = 6;

/// The fixed 32-byte magic suffix defined by EIP-6492. Any signature ending
/// with it is treated as wrapped; the prefix ABI-decodes as
/// `(address factory, bytes factoryCalldata, bytes innerSig)`.
const EIP6492_MAGIC_SUFFIX: [u8; 32] =
    hex!("6492649264926492649264926492649264926492649264926492649264926492");

/// Errors internal to the EVM exact flow.
#[derive(Debug, thiserror::Error)]
pub enum Eip155ExactError {
    /// A verification rule failed.
    #[error(transparent)]
    PaymentVerification(#[from] PaymentVerificationError),
    /// An RPC or contract call failed.
    #[error("contract call failed: {0}")]
    ContractCall(String),
    /// Chain submission failed.
    #[error(transparent)]
    Chain(#[from] Eip155ChainError),
}

impl From<Eip155ExactError> for SchemeHandlerError {
    fn from(value: Eip155ExactError) -> Self {
        match value {
            Eip155ExactError::PaymentVerification(e) => Self::PaymentVerification(e),
            Eip155ExactError::ContractCall(e) => Self::NetworkError(e),
            Eip155ExactError::Chain(Eip155ChainError::Rpc(e)) => Self::NetworkError(e),
            Eip155ExactError::Chain(e) => Self::OnchainFailure(e.to_string()),
        }
    }
}

impl From<alloy_contract::Error> for Eip155ExactError {
    fn from(e: alloy_contract::Error) -> Self {
        Self::ContractCall(e.to_string())
    }
}

/// A structured representation of the payment signature.
#[derive(Debug, Clone)]
pub enum StructuredSignature {
    /// A plain EOA signature recovered locally.
    #[allow(clippy::upper_case_acronyms)]
    EOA(Signature),
    /// An EIP-1271 contract signature, validated by the wallet contract.
    EIP1271(Bytes),
    /// An EIP-6492 wrapped signature for a counterfactual wallet.
    EIP6492 {
        /// Factory that deploys the wallet deterministically.
        factory: Address,
        /// Calldata to invoke on the factory.
        factory_calldata: Bytes,
        /// Inner signature the deployed wallet will validate.
        inner: Bytes,
        /// Full original bytes including the wrapper and magic suffix.
        original: Bytes,
    },
}

impl StructuredSignature {
    /// Classifies raw signature bytes.
    ///
    /// A 6492 magic suffix wins; otherwise 64/65-byte signatures that recover
    /// to the expected signer over `prehash` are EOA, and everything else is
    /// handed to EIP-1271 validation.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentVerificationError::InvalidSignature`] when a 6492
    /// wrapper fails to ABI-decode.
    pub fn classify(
        bytes: Bytes,
        expected_signer: Address,
        prehash: &B256,
    ) -> Result<Self, PaymentVerificationError> {
        let is_eip6492 = bytes.len() >= 32 && bytes[bytes.len() - 32..] == EIP6492_MAGIC_SUFFIX;
        if is_eip6492 {
            let body = &bytes[..bytes.len() - 32];
            let sig6492 = Sig6492::abi_decode_params(body).map_err(|e| {
                PaymentVerificationError::InvalidSignature(format!("eip-6492 wrapper: {e}"))
            })?;
            return Ok(Self::EIP6492 {
                factory: sig6492.factory,
                factory_calldata: sig6492.factoryCalldata,
                inner: sig6492.innerSig,
                original: bytes,
            });
        }

        let eoa_signature = if bytes.len() == 65 {
            Signature::from_raw(&bytes).ok().map(|s| s.normalized_s())
        } else if bytes.len() == 64 {
            Some(Signature::from_erc2098(&bytes).normalized_s())
        } else {
            None
        };
        match eoa_signature {
            Some(signature) => {
                let recovered = signature
                    .recover_address_from_prehash(prehash)
                    .ok()
                    .filter(|recovered| *recovered == expected_signer);
                if recovered.is_some() {
                    Ok(Self::EOA(signature))
                } else {
                    Ok(Self::EIP1271(bytes))
                }
            }
            None => Ok(Self::EIP1271(bytes)),
        }
    }
}

/// Validates the authorization's time window.
///
/// The window must contain now, and must not stretch further than
/// `max_timeout_seconds` into the future; a wider window than the server
/// offered is rejected even though the chain would accept it.
///
/// # Errors
///
/// Returns `early_authorization` or `expired_authorization` accordingly.
pub fn assert_time(
    valid_after: UnixTimestamp,
    valid_before: UnixTimestamp,
    max_timeout_seconds: u64,
) -> Result<(), PaymentVerificationError> {
    let now = UnixTimestamp::now();
    if valid_before < now + EXPIRY_GRACE_SECONDS {
        return Err(PaymentVerificationError::ExpiredAuthorization(
            "authorization expired".to_owned(),
        ));
    }
    if valid_after > now {
        return Err(PaymentVerificationError::EarlyAuthorization);
    }
    let window = valid_before - now;
    if window > max_timeout_seconds {
        return Err(PaymentVerificationError::ExpiredAuthorization(format!(
            "validity window of {window}s exceeds the allowed {max_timeout_seconds}s"
        )));
    }
    Ok(())
}

/// Constructs the EIP-712 domain, preferring the hints in requirements extra
/// over on-chain `name()`/`version()` lookups.
async fn assert_domain<P: Provider>(
    chain: &Eip155ChainReference,
    contract: &IEIP3009::IEIP3009Instance<P>,
    asset: Address,
    extra: Option<&PaymentRequirementsExtra>,
) -> Result<Eip712Domain, Eip155ExactError> {
    let name = match extra {
        Some(extra) => extra.name.clone(),
        None => contract.name().call().await?,
    };
    let version = match extra {
        Some(extra) => extra.version.clone(),
        None => contract.version().call().await?,
    };
    Ok(eip712_domain! {
        name: name,
        version: version,
        chain_id: chain.inner(),
        verifying_contract: asset,
    })
}

/// Checks the payer's token balance covers the amount.
async fn assert_enough_balance<P: Provider>(
    contract: &IEIP3009::IEIP3009Instance<P>,
    payer: Address,
    amount: U256,
) -> Result<(), Eip155ExactError> {
    let balance = contract.balanceOf(payer).call().await?;
    if balance < amount {
        return Err(PaymentVerificationError::InsufficientFunds.into());
    }
    Ok(())
}

/// Checks on-chain that the authorization nonce is unused.
///
/// Required for every EVM exact payment. The sole exception is a
/// counterfactual (EIP-6492) wallet whose address carries no code yet: such
/// an account has never executed an authorization, and some non-standard
/// tokens revert the state call for unknown accounts, so a failed call is
/// tolerated only on that path.
async fn assert_not_replayed<P: Provider>(
    contract: &IEIP3009::IEIP3009Instance<P>,
    provider: &Eip155ChainProvider,
    payer: Address,
    nonce: B256,
    signature: &StructuredSignature,
) -> Result<(), Eip155ExactError> {
    match contract.authorizationState(payer, nonce).call().await {
        Ok(used) => {
            if used {
                Err(PaymentVerificationError::AuthorizationReplayed.into())
            } else {
                Ok(())
            }
        }
        Err(err) => {
            if matches!(signature, StructuredSignature::EIP6492 { .. })
                && !provider.is_contract_deployed(payer).await?
            {
                #[cfg(feature = "telemetry")]
                tracing::debug!(
                    payer = %payer,
                    "authorizationState unavailable for counterfactual wallet, skipping"
                );
                Ok(())
            } else {
                Err(Eip155ExactError::ContractCall(err.to_string()))
            }
        }
    }
}

/// A verified EVM payment, ready for settlement.
#[derive(Debug)]
pub struct VerifiedPayment {
    /// The paying address.
    pub payer: Address,
    /// The authorization to execute.
    pub authorization: ExactEvmPayloadAuthorization,
    /// The classified signature.
    pub signature: StructuredSignature,
    /// The token contract address.
    pub asset: Address,
}

/// Runs every verification rule for one payment.
async fn verify_payment(
    provider: &Eip155ChainProvider,
    payload: &ExactEvmPayload,
    asset: Address,
    amount: U256,
    pay_to: Address,
    max_timeout_seconds: u64,
    extra: Option<&PaymentRequirementsExtra>,
) -> Result<VerifiedPayment, Eip155ExactError> {
    let authorization = &payload.authorization;
    if authorization.to != pay_to {
        return Err(PaymentVerificationError::ReceiverMismatch {
            expected: pay_to.to_string(),
        }
        .into());
    }
    if authorization.value != amount {
        return Err(PaymentVerificationError::AmountMismatch {
            expected: amount.to_string(),
            got: authorization.value.to_string(),
        }
        .into());
    }
    assert_time(
        authorization.valid_after,
        authorization.valid_before,
        max_timeout_seconds,
    )?;

    let contract = IEIP3009::new(asset, provider.inner());
    let domain = assert_domain(provider.chain(), &contract, asset, extra).await?;
    let signing_hash = authorization_signing_hash(authorization, &domain);
    let signature =
        StructuredSignature::classify(payload.signature.clone(), authorization.from, &signing_hash)?;

    assert_not_replayed(&contract, provider, authorization.from, authorization.nonce, &signature)
        .await?;
    assert_enough_balance(&contract, authorization.from, amount).await?;
    simulate_transfer(provider, &contract, authorization, &signature, signing_hash).await?;

    Ok(VerifiedPayment {
        payer: authorization.from,
        authorization: *authorization,
        signature,
        asset,
    })
}

/// Simulates the transfer call appropriate for the signature shape.
async fn simulate_transfer<P: Provider>(
    provider: &Eip155ChainProvider,
    contract: &IEIP3009::IEIP3009Instance<P>,
    authorization: &ExactEvmPayloadAuthorization,
    signature: &StructuredSignature,
    signing_hash: B256,
) -> Result<(), Eip155ExactError> {
    let valid_after = U256::from(authorization.valid_after.as_secs());
    let valid_before = U256::from(authorization.valid_before.as_secs());
    match signature {
        StructuredSignature::EOA(signature) => {
            let v = 27 + u8::from(signature.v());
            let call = contract.transferWithAuthorization_1(
                authorization.from,
                authorization.to,
                authorization.value,
                valid_after,
                valid_before,
                authorization.nonce,
                v,
                signature.r().into(),
                signature.s().into(),
            );
            call.call().await.map_err(simulation_error)?;
        }
        StructuredSignature::EIP1271(signature) => {
            let call = contract.transferWithAuthorization_0(
                authorization.from,
                authorization.to,
                authorization.value,
                valid_after,
                valid_before,
                authorization.nonce,
                signature.clone(),
            );
            call.call().await.map_err(simulation_error)?;
        }
        StructuredSignature::EIP6492 { inner, original, .. } => {
            // The validator deploys the wallet as a side effect when needed,
            // so both calls run inside one simulation.
            let validator = Validator6492::new(VALIDATOR_ADDRESS, provider.inner());
            let validation_call =
                validator.isValidSigWithSideEffects(authorization.from, signing_hash, original.clone());
            let transfer_call = contract.transferWithAuthorization_0(
                authorization.from,
                authorization.to,
                authorization.value,
                valid_after,
                valid_before,
                authorization.nonce,
                inner.clone(),
            );
            let (signature_ok, transfer_result) = provider
                .inner()
                .multicall()
                .add(validation_call)
                .add(transfer_call)
                .aggregate3()
                .await
                .map_err(|e| Eip155ExactError::ContractCall(e.to_string()))?;
            let signature_ok = signature_ok.map_err(|e| {
                PaymentVerificationError::InvalidSignature(e.to_string())
            })?;
            if !signature_ok {
                return Err(PaymentVerificationError::InvalidSignature(
                    "chain reported signature invalid".to_owned(),
                )
                .into());
            }
            transfer_result.map_err(|e| {
                PaymentVerificationError::SimulationFailed(e.to_string())
            })?;
        }
    }
    Ok(())
}

fn simulation_error(e: alloy_contract::Error) -> Eip155ExactError {
    PaymentVerificationError::SimulationFailed(e.to_string()).into()
}

/// Submits the transfer from the facilitator's wallet and returns the hash.
async fn settle_payment(
    provider: &Eip155ChainProvider,
    verified: &VerifiedPayment,
) -> Result<String, Eip155ExactError> {
    let contract = IEIP3009::new(verified.asset, provider.inner());
    let authorization = &verified.authorization;
    let valid_after = U256::from(authorization.valid_after.as_secs());
    let valid_before = U256::from(authorization.valid_before.as_secs());

    let (to, calldata) = match &verified.signature {
        StructuredSignature::EOA(signature) => {
            let v = 27 + u8::from(signature.v());
            let call = contract.transferWithAuthorization_1(
                authorization.from,
                authorization.to,
                authorization.value,
                valid_after,
                valid_before,
                authorization.nonce,
                v,
                signature.r().into(),
                signature.s().into(),
            );
            (*contract.address(), call.calldata().clone())
        }
        StructuredSignature::EIP1271(signature)
        | StructuredSignature::EIP6492 {
            inner: signature, ..
        } => {
            let call = contract.transferWithAuthorization_0(
                authorization.from,
                authorization.to,
                authorization.value,
                valid_after,
                valid_before,
                authorization.nonce,
                signature.clone(),
            );
            (*contract.address(), call.calldata().clone())
        }
    };

    let tx_hash = provider
        .send_meta_transaction(MetaTransaction {
            to,
            calldata,
            confirmations: 1,
        })
        .await?;
    Ok(tx_hash.to_string())
}

/// Facilitator handler for the V2 EVM exact scheme.
pub struct V2Eip155ExactHandler {
    provider: Eip155ChainProvider,
}

impl V2Eip155ExactHandler {
    /// Creates a handler over the given provider.
    #[must_use]
    pub const fn new(provider: Eip155ChainProvider) -> Self {
        Self { provider }
    }

    async fn verify_request(
        &self,
        request: &types::VerifyRequest,
    ) -> Result<VerifiedPayment, Eip155ExactError> {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;

        if &payload.accepted != requirements {
            return Err(PaymentVerificationError::AcceptedRequirementsMismatch.into());
        }
        if requirements.network != self.provider.chain_id() {
            return Err(PaymentVerificationError::ChainIdMismatch.into());
        }
        verify_payment(
            &self.provider,
            &payload.payload,
            requirements.asset,
            requirements.amount.inner(),
            requirements.pay_to,
            requirements.max_timeout_seconds,
            requirements.extra.as_ref(),
        )
        .await
    }
}

impl SchemeHandler for V2Eip155ExactHandler {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, SchemeHandlerError>> {
        Box::pin(async move {
            let request = types::VerifyRequest::from_proto(request)?;
            match self.verify_request(&request).await {
                Ok(verified) => Ok(proto::VerifyResponse::valid(verified.payer.to_string())),
                Err(Eip155ExactError::PaymentVerification(e)) => {
                    Ok(proto::VerifyResponse::invalid(None, e.to_string()))
                }
                Err(other) => Err(other.into()),
            }
        })
    }

    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> BoxFuture<'_, Result<proto::SettleResponse, SchemeHandlerError>> {
        Box::pin(async move {
            let network = self.provider.chain_id().to_string();
            let request = types::SettleRequest::from_settle_proto(request)?;
            let verified = match self.verify_request(&request).await {
                Ok(verified) => verified,
                Err(Eip155ExactError::PaymentVerification(e)) => {
                    return Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: None,
                    });
                }
                Err(other) => return Err(other.into()),
            };
            let payer = verified.payer.to_string();
            match settle_payment(&self.provider, &verified).await {
                Ok(tx_hash) => Ok(proto::SettleResponse::Success {
                    payer,
                    transaction: tx_hash,
                    network,
                    extensions: None,
                }),
                Err(Eip155ExactError::PaymentVerification(e)) => {
                    Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: Some(payer),
                    })
                }
                Err(other) => Err(other.into()),
            }
        })
    }

    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, SchemeHandlerError>> {
        Box::pin(async move {
            Ok(supported_response(&self.provider, 2, |chain_id| {
                chain_id.to_string()
            }))
        })
    }
}

/// Facilitator handler for the V1 EVM exact scheme (legacy names).
pub struct V1Eip155ExactHandler {
    provider: Eip155ChainProvider,
}

impl V1Eip155ExactHandler {
    /// Creates a handler over the given provider.
    #[must_use]
    pub const fn new(provider: Eip155ChainProvider) -> Self {
        Self { provider }
    }

    async fn verify_request(
        &self,
        request: &types::VerifyRequestV1,
    ) -> Result<VerifiedPayment, Eip155ExactError> {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;

        let registry = evm_network_registry();
        let chain_id = self.provider.chain_id();
        let payload_chain = registry
            .canonicalize(&payload.network)
            .ok_or(PaymentVerificationError::ChainIdMismatch)?;
        let requirements_chain = registry
            .canonicalize(&requirements.network)
            .ok_or(PaymentVerificationError::ChainIdMismatch)?;
        if payload_chain != chain_id || requirements_chain != chain_id {
            return Err(PaymentVerificationError::ChainIdMismatch.into());
        }
        verify_payment(
            &self.provider,
            &payload.payload,
            requirements.asset,
            requirements.max_amount_required.inner(),
            requirements.pay_to,
            requirements.max_timeout_seconds,
            requirements.extra.as_ref(),
        )
        .await
    }
}

impl SchemeHandler for V1Eip155ExactHandler {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, SchemeHandlerError>> {
        Box::pin(async move {
            let request = types::VerifyRequestV1::from_proto(request)?;
            match self.verify_request(&request).await {
                Ok(verified) => Ok(proto::VerifyResponse::valid(verified.payer.to_string())),
                Err(Eip155ExactError::PaymentVerification(e)) => {
                    Ok(proto::VerifyResponse::invalid(None, e.to_string()))
                }
                Err(other) => Err(other.into()),
            }
        })
    }

    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> BoxFuture<'_, Result<proto::SettleResponse, SchemeHandlerError>> {
        Box::pin(async move {
            let request = types::VerifyRequestV1::from_settle_proto(request)?;
            let network = request.payment_payload.network.clone();
            let verified = match self.verify_request(&request).await {
                Ok(verified) => verified,
                Err(Eip155ExactError::PaymentVerification(e)) => {
                    return Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: None,
                    });
                }
                Err(other) => return Err(other.into()),
            };
            let payer = verified.payer.to_string();
            match settle_payment(&self.provider, &verified).await {
                Ok(tx_hash) => Ok(proto::SettleResponse::Success {
                    payer,
                    transaction: tx_hash,
                    network,
                    extensions: None,
                }),
                Err(Eip155ExactError::PaymentVerification(e)) => {
                    Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: Some(payer),
                    })
                }
                Err(other) => Err(other.into()),
            }
        })
    }

    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, SchemeHandlerError>> {
        Box::pin(async move {
            Ok(supported_response(&self.provider, 1, |chain_id| {
                evm_network_registry()
                    .name_by_chain_id(chain_id)
                    .map_or_else(|| chain_id.to_string(), ToOwned::to_owned)
            }))
        })
    }
}

fn supported_response(
    provider: &Eip155ChainProvider,
    x402_version: u8,
    network_label: impl Fn(&ChainId) -> String,
) -> proto::SupportedResponse {
    let chain_id = provider.chain_id();
    let kinds = vec![proto::SupportedPaymentKind {
        x402_version,
        scheme: EXACT_SCHEME.to_owned(),
        network: network_label(&chain_id),
        extra: None,
    }];
    let mut signers = std::collections::HashMap::with_capacity(1);
    signers.insert(chain_id.to_string(), provider.signer_addresses());
    proto::SupportedResponse {
        kinds,
        extensions: Vec::new(),
        signers,
    }
}

impl SchemeHandlerBuilder<&Eip155ChainProvider> for V2Eip155Exact {
    fn build(
        &self,
        provider: &Eip155ChainProvider,
        _config: Option<serde_json::Value>,
    ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>> {
        Ok(Box::new(V2Eip155ExactHandler::new(provider.clone())))
    }
}

impl SchemeHandlerBuilder<&Eip155ChainProvider> for V1Eip155Exact {
    fn build(
        &self,
        provider: &Eip155ChainProvider,
        _config: Option<serde_json::Value>,
    ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>> {
        Ok(Box::new(V1Eip155ExactHandler::new(provider.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use alloy_sol_types::SolValue;

    fn authorization(
        from: Address,
        valid_after: u64,
        valid_before: u64,
    ) -> ExactEvmPayloadAuthorization {
        ExactEvmPayloadAuthorization {
            from,
            to: address!("0x2222222222222222222222222222222222222222"),
            value: U256::from(1000u64),
            valid_after: UnixTimestamp::from_secs(valid_after),
            valid_before: UnixTimestamp::from_secs(valid_before),
            nonce: b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
        }
    }

    fn domain() -> Eip712Domain {
        eip712_domain! {
            name: "USDC",
            version: "2",
            chain_id: 84532,
            verifying_contract: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        }
    }

    #[test]
    fn assert_time_accepts_live_window() {
        let now = UnixTimestamp::now().as_secs();
        assert!(assert_time(
            UnixTimestamp::from_secs(now - 10),
            UnixTimestamp::from_secs(now + 50),
            60
        )
        .is_ok());
    }

    #[test]
    fn assert_time_rejects_expired() {
        let now = UnixTimestamp::now().as_secs();
        let err = assert_time(
            UnixTimestamp::from_secs(now - 100),
            UnixTimestamp::from_secs(now - 10),
            60,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("expired_authorization"));
    }

    #[test]
    fn assert_time_rejects_future_authorization() {
        let now = UnixTimestamp::now().as_secs();
        let err = assert_time(
            UnixTimestamp::from_secs(now + 100),
            UnixTimestamp::from_secs(now + 160),
            60,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::EarlyAuthorization
        ));
    }

    #[test]
    fn assert_time_rejects_window_wider_than_timeout() {
        // maxTimeoutSeconds = 60 but validBefore is 600s out: the window is
        // wider than the server offered, so the authorization is rejected.
        let now = UnixTimestamp::now().as_secs();
        let err = assert_time(
            UnixTimestamp::from_secs(now - 1),
            UnixTimestamp::from_secs(now + 600),
            60,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("expired_authorization"));
    }

    #[test]
    fn eoa_signature_recovers_to_signer() {
        let signer = PrivateKeySigner::random();
        let authorization = authorization(signer.address(), 0, 60);
        let hash = authorization_signing_hash(&authorization, &domain());
        let signature = signer.sign_hash_sync(&hash).unwrap();

        let classified = StructuredSignature::classify(
            signature.as_bytes().to_vec().into(),
            signer.address(),
            &hash,
        )
        .unwrap();
        assert!(matches!(classified, StructuredSignature::EOA(_)));
    }

    #[test]
    fn eoa_signature_from_wrong_signer_falls_back_to_1271() {
        let signer = PrivateKeySigner::random();
        let impostor = PrivateKeySigner::random();
        let authorization = authorization(signer.address(), 0, 60);
        let hash = authorization_signing_hash(&authorization, &domain());
        let signature = impostor.sign_hash_sync(&hash).unwrap();

        let classified = StructuredSignature::classify(
            signature.as_bytes().to_vec().into(),
            signer.address(),
            &hash,
        )
        .unwrap();
        assert!(matches!(classified, StructuredSignature::EIP1271(_)));
    }

    #[test]
    fn magic_suffix_classifies_as_6492() {
        let factory = address!("0x3333333333333333333333333333333333333333");
        let inner: Bytes = vec![1u8; 65].into();
        let wrapper = Sig6492 {
            factory,
            factoryCalldata: vec![0xde, 0xad].into(),
            innerSig: inner,
        };
        let mut bytes = wrapper.abi_encode_params();
        bytes.extend_from_slice(&EIP6492_MAGIC_SUFFIX);

        let classified = StructuredSignature::classify(
            bytes.into(),
            address!("0x4444444444444444444444444444444444444444"),
            &B256::ZERO,
        )
        .unwrap();
        match classified {
            StructuredSignature::EIP6492 { factory: f, .. } => assert_eq!(f, factory),
            other => panic!("expected 6492, got {other:?}"),
        }
    }

    #[test]
    fn signing_hash_changes_with_domain() {
        let signer = PrivateKeySigner::random();
        let authorization = authorization(signer.address(), 0, 60);
        let hash_a = authorization_signing_hash(&authorization, &domain());
        let other_domain = eip712_domain! {
            name: "USDC",
            version: "2",
            chain_id: 8453,
            verifying_contract: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
        };
        let hash_b = authorization_signing_hash(&authorization, &other_domain);
        assert_ne!(hash_a, hash_b);
    }
}
