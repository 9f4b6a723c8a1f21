#![cfg(feature = "facilitator")]

//! Facilitator-side verification and settlement for the Solana exact scheme.
//!
//! The payload is one fully signed transaction. Verification checks that it
//! contains exactly one SPL `TransferChecked` moving the required amount of
//! the required mint to the recipient's associated token account, that the
//! payer both authorizes the transfer and pays the fee (no sponsor in this
//! scheme), that the blockhash is still live, and that the node simulation
//! (with signature verification) succeeds. Settlement forwards the
//! transaction and waits for confirmation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;

use pay402::chain::ChainProviderOps;
use pay402::proto::{self, PaymentVerificationError};
use pay402::scheme::{BoxFuture, SchemeHandler, SchemeHandlerBuilder, SchemeHandlerError};

use crate::chain::{SolanaChainError, SolanaChainProvider, SolanaNodeClient};
use crate::exact::types::{self, EXACT_SCHEME, associated_token_account};
use crate::exact::{V1SolanaExact, V2SolanaExact};
use crate::networks::solana_network_registry;

/// The transfer a payment transaction must perform.
#[derive(Debug, Clone)]
pub struct TransferRequirement {
    /// The SPL mint to transfer.
    pub mint: Pubkey,
    /// The atomic amount to transfer.
    pub amount: u64,
    /// The receiving owner address (not the token account).
    pub pay_to: Pubkey,
}

/// A verified Solana payment, ready for settlement.
#[derive(Debug)]
pub struct VerifiedTransfer {
    /// The paying address (transfer authority and fee payer).
    pub payer: Pubkey,
    /// The decoded transaction.
    pub transaction: VersionedTransaction,
    /// The destination associated token account.
    pub destination: Pubkey,
}

impl From<SolanaChainError> for SchemeHandlerError {
    fn from(value: SolanaChainError) -> Self {
        match value {
            SolanaChainError::Rpc(e) => Self::NetworkError(e),
            SolanaChainError::Simulation(e) => {
                Self::PaymentVerification(PaymentVerificationError::SimulationFailed(e))
            }
            SolanaChainError::Config(e) => Self::OnchainFailure(e),
        }
    }
}

/// Decodes the base64/bincode wire transaction.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidTransactionEncoding`] on any
/// decode failure.
pub fn decode_transaction(
    transaction_b64: &str,
) -> Result<VersionedTransaction, PaymentVerificationError> {
    let bytes = BASE64.decode(transaction_b64.trim()).map_err(|e| {
        PaymentVerificationError::InvalidTransactionEncoding(format!("base64: {e}"))
    })?;
    bincode::deserialize(&bytes).map_err(|e| {
        PaymentVerificationError::InvalidTransactionEncoding(format!("bincode: {e}"))
    })
}

struct TransferChecked {
    amount: u64,
    mint: Pubkey,
    destination: Pubkey,
    authority: Pubkey,
    token_program: Pubkey,
}

fn unpack_transfer_checked(
    transaction: &VersionedTransaction,
    instruction_index: usize,
) -> Result<Option<TransferChecked>, PaymentVerificationError> {
    let instructions = transaction.message.instructions();
    let instruction = &instructions[instruction_index];
    let keys = transaction.message.static_account_keys();
    let program_id = *instruction.program_id(keys);

    let amount = if program_id == spl_token::ID {
        match spl_token::instruction::TokenInstruction::unpack(&instruction.data) {
            Ok(spl_token::instruction::TokenInstruction::TransferChecked { amount, .. }) => amount,
            _ => return Ok(None),
        }
    } else if program_id == spl_token_2022::ID {
        match spl_token_2022::instruction::TokenInstruction::unpack(&instruction.data) {
            Ok(spl_token_2022::instruction::TokenInstruction::TransferChecked {
                amount, ..
            }) => amount,
            _ => return Ok(None),
        }
    } else {
        return Ok(None);
    };

    let account_at = |position: usize| -> Result<Pubkey, PaymentVerificationError> {
        let index = *instruction.accounts.get(position).ok_or_else(|| {
            PaymentVerificationError::InvalidPayloadFormat(
                "transfer instruction is missing accounts".to_owned(),
            )
        })?;
        keys.get(index as usize).copied().ok_or_else(|| {
            PaymentVerificationError::InvalidPayloadFormat(
                "transfer account index out of range".to_owned(),
            )
        })
    };

    // TransferChecked account order: source, mint, destination, authority.
    Ok(Some(TransferChecked {
        amount,
        mint: account_at(1)?,
        destination: account_at(2)?,
        authority: account_at(3)?,
        token_program: program_id,
    }))
}

/// Runs the pure structural checks against a decoded transaction.
///
/// # Errors
///
/// Returns the [`PaymentVerificationError`] of the first failing check.
pub fn verify_transfer_structure(
    transaction: VersionedTransaction,
    requirement: &TransferRequirement,
) -> Result<VerifiedTransfer, PaymentVerificationError> {
    let instructions = transaction.message.instructions();
    if instructions.is_empty() {
        return Err(PaymentVerificationError::InvalidPayloadFormat(
            "transaction has no instructions".to_owned(),
        ));
    }

    // Exactly one token transfer; everything else must be compute budget.
    let mut transfer = None;
    for index in 0..instructions.len() {
        if let Some(found) = unpack_transfer_checked(&transaction, index)? {
            if transfer.is_some() {
                return Err(PaymentVerificationError::InvalidPayloadFormat(
                    "multiple transfer instructions".to_owned(),
                ));
            }
            transfer = Some(found);
        } else {
            let keys = transaction.message.static_account_keys();
            let program_id = *instructions[index].program_id(keys);
            if program_id != solana_compute_budget_interface::ID {
                return Err(PaymentVerificationError::InvalidPayloadFormat(format!(
                    "unexpected instruction for program {program_id}"
                )));
            }
        }
    }
    let transfer = transfer.ok_or_else(|| {
        PaymentVerificationError::InvalidPayloadFormat("no transfer instruction".to_owned())
    })?;

    if transfer.mint != requirement.mint {
        return Err(PaymentVerificationError::AssetMismatch {
            expected: requirement.mint.to_string(),
            got: transfer.mint.to_string(),
        });
    }
    if transfer.amount != requirement.amount {
        return Err(PaymentVerificationError::AmountMismatch {
            expected: requirement.amount.to_string(),
            got: transfer.amount.to_string(),
        });
    }
    let expected_destination = associated_token_account(
        &requirement.pay_to,
        &transfer.token_program,
        &requirement.mint,
    );
    if transfer.destination != expected_destination {
        return Err(PaymentVerificationError::ReceiverMismatch {
            expected: requirement.pay_to.to_string(),
        });
    }

    // No sponsor in this scheme: the transfer authority also pays the fee.
    let fee_payer = *transaction
        .message
        .static_account_keys()
        .first()
        .ok_or_else(|| {
            PaymentVerificationError::InvalidPayloadFormat("no account keys".to_owned())
        })?;
    if fee_payer != transfer.authority {
        return Err(PaymentVerificationError::InvalidFeePayer(format!(
            "fee payer {fee_payer} is not the transfer authority"
        )));
    }

    // All required signatures must be present; their validity is the node's
    // to check during simulation.
    let required = transaction.message.header().num_required_signatures as usize;
    if transaction.signatures.len() < required
        || transaction.signatures[..required]
            .iter()
            .any(|s| *s == Signature::default())
    {
        return Err(PaymentVerificationError::PaymentNotSigned);
    }

    Ok(VerifiedTransfer {
        payer: transfer.authority,
        destination: transfer.destination,
        transaction,
    })
}

/// Runs the full verification: structure, blockhash, destination existence,
/// and node simulation with signature verification.
///
/// # Errors
///
/// - [`SchemeHandlerError::PaymentVerification`] carrying the failing rule
/// - [`SchemeHandlerError::NetworkError`] when a node call itself fails
pub async fn verify_transfer<N: SolanaNodeClient + ?Sized>(
    node: &N,
    transaction_b64: &str,
    requirement: &TransferRequirement,
) -> Result<VerifiedTransfer, SchemeHandlerError> {
    let transaction = decode_transaction(transaction_b64)?;
    let verified = verify_transfer_structure(transaction, requirement)?;

    let blockhash = *verified.transaction.message.recent_blockhash();
    if !node.is_blockhash_valid(blockhash).await? {
        return Err(PaymentVerificationError::RoundValidity(
            "recent blockhash outside the validity window".to_owned(),
        )
        .into());
    }

    if !node.account_exists(verified.destination).await? {
        return Err(PaymentVerificationError::ReceiverMismatch {
            expected: verified.destination.to_string(),
        }
        .into());
    }

    node.simulate(verified.transaction.clone()).await?;
    Ok(verified)
}

/// Facilitator handler for the V2 Solana exact scheme.
pub struct V2SolanaExactHandler {
    provider: SolanaChainProvider,
}

impl V2SolanaExactHandler {
    /// Creates a handler over the given provider.
    #[must_use]
    pub const fn new(provider: SolanaChainProvider) -> Self {
        Self { provider }
    }

    async fn verify_request(
        &self,
        request: &types::VerifyRequest,
    ) -> Result<VerifiedTransfer, SchemeHandlerError> {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;

        if &payload.accepted != requirements {
            return Err(PaymentVerificationError::AcceptedRequirementsMismatch.into());
        }
        if requirements.network != self.provider.chain_id() {
            return Err(PaymentVerificationError::ChainIdMismatch.into());
        }
        let requirement = TransferRequirement {
            mint: *requirements.asset.pubkey(),
            amount: requirements.amount.inner(),
            pay_to: *requirements.pay_to.pubkey(),
        };
        verify_transfer(&self.provider, &payload.payload.transaction, &requirement).await
    }
}

impl SchemeHandler for V2SolanaExactHandler {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, SchemeHandlerError>> {
        Box::pin(async move {
            let request = types::VerifyRequest::from_proto(request)?;
            match self.verify_request(&request).await {
                Ok(verified) => Ok(proto::VerifyResponse::valid(verified.payer.to_string())),
                Err(SchemeHandlerError::PaymentVerification(e)) => {
                    Ok(proto::VerifyResponse::invalid(None, e.to_string()))
                }
                Err(other) => Err(other),
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
                Err(SchemeHandlerError::PaymentVerification(e)) => {
                    return Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: None,
                    });
                }
                Err(other) => return Err(other),
            };
            let payer = verified.payer.to_string();
            match self.provider.send_and_confirm(verified.transaction).await {
                Ok(signature) => Ok(proto::SettleResponse::Success {
                    payer,
                    transaction: signature.to_string(),
                    network,
                    extensions: None,
                }),
                Err(SolanaChainError::Simulation(e)) => Ok(proto::SettleResponse::Error {
                    reason: PaymentVerificationError::SimulationFailed(e).to_string(),
                    network,
                    payer: Some(payer),
                }),
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

/// Facilitator handler for the V1 Solana exact scheme (legacy names).
pub struct V1SolanaExactHandler {
    provider: SolanaChainProvider,
}

impl V1SolanaExactHandler {
    /// Creates a handler over the given provider.
    #[must_use]
    pub const fn new(provider: SolanaChainProvider) -> Self {
        Self { provider }
    }

    async fn verify_request(
        &self,
        request: &types::VerifyRequestV1,
    ) -> Result<VerifiedTransfer, SchemeHandlerError> {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;

        let registry = solana_network_registry();
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
        let requirement = TransferRequirement {
            mint: *requirements.asset.pubkey(),
            amount: requirements.max_amount_required.inner(),
            pay_to: *requirements.pay_to.pubkey(),
        };
        verify_transfer(&self.provider, &payload.payload.transaction, &requirement).await
    }
}

impl SchemeHandler for V1SolanaExactHandler {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, SchemeHandlerError>> {
        Box::pin(async move {
            let request = types::VerifyRequestV1::from_proto(request)?;
            match self.verify_request(&request).await {
                Ok(verified) => Ok(proto::VerifyResponse::valid(verified.payer.to_string())),
                Err(SchemeHandlerError::PaymentVerification(e)) => {
                    Ok(proto::VerifyResponse::invalid(None, e.to_string()))
                }
                Err(other) => Err(other),
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
                Err(SchemeHandlerError::PaymentVerification(e)) => {
                    return Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: None,
                    });
                }
                Err(other) => return Err(other),
            };
            let payer = verified.payer.to_string();
            match self.provider.send_and_confirm(verified.transaction).await {
                Ok(signature) => Ok(proto::SettleResponse::Success {
                    payer,
                    transaction: signature.to_string(),
                    network,
                    extensions: None,
                }),
                Err(SolanaChainError::Simulation(e)) => Ok(proto::SettleResponse::Error {
                    reason: PaymentVerificationError::SimulationFailed(e).to_string(),
                    network,
                    payer: Some(payer),
                }),
                Err(other) => Err(other.into()),
            }
        })
    }

    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, SchemeHandlerError>> {
        Box::pin(async move {
            Ok(supported_response(&self.provider, 1, |chain_id| {
                solana_network_registry()
                    .name_by_chain_id(chain_id)
                    .map_or_else(|| chain_id.to_string(), ToOwned::to_owned)
            }))
        })
    }
}

fn supported_response(
    provider: &SolanaChainProvider,
    x402_version: u8,
    network_label: impl Fn(&pay402::chain::ChainId) -> String,
) -> proto::SupportedResponse {
    let chain_id = provider.chain_id();
    let kinds = vec![proto::SupportedPaymentKind {
        x402_version,
        scheme: EXACT_SCHEME.to_owned(),
        network: network_label(&chain_id),
        extra: None,
    }];
    proto::SupportedResponse {
        kinds,
        extensions: Vec::new(),
        signers: std::collections::HashMap::new(),
    }
}

impl SchemeHandlerBuilder<&SolanaChainProvider> for V2SolanaExact {
    fn build(
        &self,
        provider: &SolanaChainProvider,
        _config: Option<serde_json::Value>,
    ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>> {
        Ok(Box::new(V2SolanaExactHandler::new(provider.clone())))
    }
}

impl SchemeHandlerBuilder<&SolanaChainProvider> for V1SolanaExact {
    fn build(
        &self,
        provider: &SolanaChainProvider,
        _config: Option<serde_json::Value>,
    ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>> {
        Ok(Box::new(V1SolanaExactHandler::new(provider.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_keypair::Keypair;
    use solana_message::Hash;
    use solana_signer::Signer;

    use crate::exact::client::build_transfer_transaction;
    use crate::networks::{KnownNetworkSolana, SplDeployment};
    use pay402::networks::USDC;

    fn deployment() -> SplDeployment {
        USDC::solana_devnet()
    }

    fn build(payer: &Keypair, pay_to: Pubkey, amount: u64) -> VersionedTransaction {
        build_transfer_transaction(
            payer,
            &deployment().mint,
            6,
            &spl_token::ID,
            &pay_to,
            amount,
            Hash::default(),
        )
        .unwrap()
    }

    fn requirement(pay_to: Pubkey, amount: u64) -> TransferRequirement {
        TransferRequirement {
            mint: deployment().mint,
            amount,
            pay_to,
        }
    }

    #[test]
    fn well_formed_transfer_passes_structure_checks() {
        let payer = Keypair::new();
        let pay_to = Keypair::new().pubkey();
        let transaction = build(&payer, pay_to, 1000);

        let verified =
            verify_transfer_structure(transaction, &requirement(pay_to, 1000)).unwrap();
        assert_eq!(verified.payer, payer.pubkey());
    }

    #[test]
    fn amount_mismatch_detected() {
        let payer = Keypair::new();
        let pay_to = Keypair::new().pubkey();
        let transaction = build(&payer, pay_to, 500);

        let err =
            verify_transfer_structure(transaction, &requirement(pay_to, 1000)).unwrap_err();
        assert_eq!(err.to_string(), "amount_mismatch: expected 1000, got 500");
    }

    #[test]
    fn wrong_recipient_detected() {
        let payer = Keypair::new();
        let pay_to = Keypair::new().pubkey();
        let other = Keypair::new().pubkey();
        let transaction = build(&payer, pay_to, 1000);

        let err = verify_transfer_structure(transaction, &requirement(other, 1000)).unwrap_err();
        assert!(err.to_string().starts_with("receiver_mismatch"));
    }

    #[test]
    fn wrong_mint_detected() {
        let payer = Keypair::new();
        let pay_to = Keypair::new().pubkey();
        let transaction = build(&payer, pay_to, 1000);

        let mut req = requirement(pay_to, 1000);
        req.mint = USDC::solana_mainnet().mint;
        let err = verify_transfer_structure(transaction, &req).unwrap_err();
        assert!(err.to_string().starts_with("asset_mismatch"));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_transaction("!!!").is_err());
        let not_a_tx = BASE64.encode(b"nope");
        assert!(decode_transaction(&not_a_tx).is_err());
    }
}
