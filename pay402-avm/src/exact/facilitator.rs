#![cfg(feature = "facilitator")]

//! Facilitator-side verification and settlement for the Algorand exact
//! scheme.
//!
//! Verification short-circuits on the first failing check; every check maps
//! to its own reason string so a rejected payment is always attributable:
//!
//! 1. payload shape (group size, payment index)
//! 2. entry decoding and fee-payer attribution of unsigned entries
//! 3. group-id integrity
//! 4. security constraints over the whole group (keyreg, close-outs, rekeys)
//! 5. the payment transaction itself (type, amount, receiver, asset, signature)
//! 6. fee-payer transaction constraints (type, zero amount, fee cap)
//! 7. round validity
//! 8. recipient ASA opt-in
//! 9. node-side group simulation
//!
//! Checks 1-6 are pure and run without a node; 7-9 need the [`AvmNodeClient`].

use std::collections::HashMap;

use algonaut::core::Address;
use algonaut::transaction::{Transaction, TransactionType};

use pay402::chain::{ChainId, ChainProviderOps};
use pay402::proto::{self, PaymentVerificationError};
use pay402::scheme::{BoxFuture, SchemeHandler, SchemeHandlerBuilder, SchemeHandlerError};

use crate::chain::{AvmChainError, AvmChainProvider, AvmNodeClient, parse_address};
use crate::exact::types::{
    self, ExactAvmPayload, GroupEntry, MAX_GROUP_SIZE, MAX_REASONABLE_FEE, decode_group_entry,
    encode_for_simulation,
};
use crate::exact::{V1AlgorandExact, V2AlgorandExact};
use crate::networks::algorand_network_registry;

/// The transfer a payment group must perform to satisfy the requirements.
#[derive(Debug, Clone)]
pub struct TransferRequirement {
    /// The ASA id to transfer.
    pub asset_id: u64,
    /// The atomic amount to transfer.
    pub amount: u64,
    /// The receiving address.
    pub pay_to: Address,
}

/// A structurally verified payment group, ready for the node-side checks and
/// for settlement.
#[derive(Debug)]
pub struct VerifiedGroup {
    /// Decoded group entries in group order.
    pub entries: Vec<GroupEntry>,
    /// Index of the payer-signed payment transaction.
    pub payment_index: usize,
    /// The paying address (sender of the payment transaction).
    pub payer: Address,
}

impl From<AvmChainError> for SchemeHandlerError {
    fn from(value: AvmChainError) -> Self {
        match value {
            AvmChainError::Rpc(e) => Self::NetworkError(e),
            AvmChainError::Simulation(e) => {
                Self::PaymentVerification(PaymentVerificationError::SimulationFailed(e))
            }
            AvmChainError::NotConfirmed { .. } => Self::OnchainFailure(value.to_string()),
            AvmChainError::Encoding(e) => Self::PaymentVerification(
                PaymentVerificationError::InvalidTransactionEncoding(e),
            ),
            AvmChainError::Config(e) => Self::OnchainFailure(e),
        }
    }
}

fn txn_sender(txn: &Transaction) -> Address {
    match &txn.txn_type {
        TransactionType::Payment(t) => t.sender,
        TransactionType::KeyRegistration(t) => t.sender,
        TransactionType::AssetConfigurationTransaction(t) => t.sender,
        TransactionType::AssetTransferTransaction(t) => t.sender,
        TransactionType::AssetAcceptTransaction(t) => t.sender,
        TransactionType::AssetClawbackTransaction(t) => t.sender,
        TransactionType::AssetFreezeTransaction(t) => t.sender,
        TransactionType::ApplicationCallTransaction(t) => t.sender,
    }
}

/// Runs the pure structural and security checks (steps 1-6).
///
/// # Errors
///
/// Returns the distinct [`PaymentVerificationError`] of the first failing
/// check.
pub fn verify_group_structure(
    payload: &ExactAvmPayload,
    requirement: &TransferRequirement,
    fee_payers: &[Address],
) -> Result<VerifiedGroup, PaymentVerificationError> {
    // 1. Payload shape.
    if payload.payment_group.is_empty() {
        return Err(PaymentVerificationError::InvalidPayloadFormat(
            "empty payment group".to_owned(),
        ));
    }
    if payload.payment_group.len() > MAX_GROUP_SIZE {
        return Err(PaymentVerificationError::GroupSizeExceeded {
            got: payload.payment_group.len(),
            max: MAX_GROUP_SIZE,
        });
    }
    if payload.payment_index >= payload.payment_group.len() {
        return Err(PaymentVerificationError::InvalidPaymentIndex {
            index: payload.payment_index,
            len: payload.payment_group.len(),
        });
    }

    // 2. Decode every entry; unsigned entries must come from our fee payers.
    let mut entries = Vec::with_capacity(payload.payment_group.len());
    for entry_b64 in &payload.payment_group {
        let entry = decode_group_entry(entry_b64)?;
        if let GroupEntry::Unsigned(txn) = &entry {
            let sender = txn_sender(txn);
            if !fee_payers.contains(&sender) {
                return Err(PaymentVerificationError::InvalidExactAvmPayloadTransaction(
                    format!("unsigned transaction from foreign sender {sender}"),
                ));
            }
        }
        entries.push(entry);
    }

    // 3. Group integrity: one shared group id once there is more than one txn.
    if entries.len() > 1 {
        let group_ids: Vec<_> = entries
            .iter()
            .map(|e| e.transaction().group.as_ref().map(|g| g.0))
            .collect();
        let first = group_ids[0];
        if first.is_none() || group_ids.iter().any(|g| *g != first) {
            return Err(PaymentVerificationError::InconsistentGroupId);
        }
    }

    // 4. Security constraints over every transaction in the group.
    verify_security_constraints(&entries)?;

    // 5. The payment transaction itself.
    let payment_entry = &entries[payload.payment_index];
    let payer = verify_payment_transaction(payment_entry, requirement)?;

    // 6. Fee-payer transaction constraints.
    for entry in &entries {
        if let GroupEntry::Unsigned(txn) = entry {
            verify_fee_payer_transaction(txn)?;
        }
    }

    Ok(VerifiedGroup {
        entries,
        payment_index: payload.payment_index,
        payer,
    })
}

/// Rejects keyregs, close-outs, and non-sandwich rekeys anywhere in the
/// group (step 4).
fn verify_security_constraints(entries: &[GroupEntry]) -> Result<(), PaymentVerificationError> {
    let mut rekeys_by_sender: HashMap<Address, Vec<Option<Address>>> = HashMap::new();

    for entry in entries {
        let txn = entry.transaction();
        match &txn.txn_type {
            TransactionType::KeyRegistration(_) => {
                return Err(PaymentVerificationError::SecurityKeyregNotAllowed);
            }
            TransactionType::Payment(payment) => {
                if payment.close_remainder_to.is_some() {
                    return Err(PaymentVerificationError::SecurityCloseToNotAllowed);
                }
            }
            TransactionType::AssetTransferTransaction(xfer) => {
                if xfer.close_to.is_some() {
                    return Err(PaymentVerificationError::SecurityCloseToNotAllowed);
                }
            }
            _ => {}
        }
        if txn.rekey_to.is_some() {
            rekeys_by_sender
                .entry(txn_sender(txn))
                .or_default()
                .push(txn.rekey_to);
        }
    }

    // Rekeys pass only as a sandwich: exactly two rekey transactions by the
    // same sender, the second handing authority back to that sender.
    for (sender, rekeys) in rekeys_by_sender {
        if rekeys.len() != 2 || rekeys[1] != Some(sender) {
            return Err(PaymentVerificationError::SecurityRekeyNotAllowed);
        }
    }

    Ok(())
}

/// Checks the payment transaction at the payment index (step 5).
fn verify_payment_transaction(
    entry: &GroupEntry,
    requirement: &TransferRequirement,
) -> Result<Address, PaymentVerificationError> {
    let txn = entry.transaction();
    let TransactionType::AssetTransferTransaction(xfer) = &txn.txn_type else {
        return Err(PaymentVerificationError::InvalidPayloadFormat(
            "payment entry is not an asset transfer".to_owned(),
        ));
    };
    if xfer.xfer != requirement.asset_id {
        return Err(PaymentVerificationError::AssetMismatch {
            expected: requirement.asset_id.to_string(),
            got: xfer.xfer.to_string(),
        });
    }
    if xfer.amount != requirement.amount {
        return Err(PaymentVerificationError::AmountMismatch {
            expected: requirement.amount.to_string(),
            got: xfer.amount.to_string(),
        });
    }
    if xfer.receiver != requirement.pay_to {
        return Err(PaymentVerificationError::ReceiverMismatch {
            expected: requirement.pay_to.to_string(),
        });
    }
    if !entry.is_signed() {
        return Err(PaymentVerificationError::PaymentNotSigned);
    }
    Ok(xfer.sender)
}

/// Checks one facilitator-signed fee-payer transaction (step 6).
fn verify_fee_payer_transaction(txn: &Transaction) -> Result<(), PaymentVerificationError> {
    let TransactionType::Payment(payment) = &txn.txn_type else {
        return Err(PaymentVerificationError::InvalidFeePayer(
            "fee-payer transaction is not a payment".to_owned(),
        ));
    };
    if payment.amount.0 != 0 {
        return Err(PaymentVerificationError::InvalidFeePayer(format!(
            "fee-payer transaction moves {} microalgos",
            payment.amount.0
        )));
    }
    if payment.close_remainder_to.is_some() {
        return Err(PaymentVerificationError::InvalidFeePayer(
            "fee-payer transaction closes the account".to_owned(),
        ));
    }
    if txn.rekey_to.is_some() {
        return Err(PaymentVerificationError::InvalidFeePayer(
            "fee-payer transaction rekeys the account".to_owned(),
        ));
    }
    if txn.fee.0 > MAX_REASONABLE_FEE {
        return Err(PaymentVerificationError::FeeTooHigh {
            got: txn.fee.0,
            max: MAX_REASONABLE_FEE,
        });
    }
    Ok(())
}

/// Checks round validity for every transaction in the group (step 7).
fn verify_round_validity(
    entries: &[GroupEntry],
    current_round: u64,
) -> Result<(), PaymentVerificationError> {
    for entry in entries {
        let txn = entry.transaction();
        let first = txn.first_valid.0;
        let last = txn.last_valid.0;
        if current_round < first || current_round > last {
            return Err(PaymentVerificationError::RoundValidity(format!(
                "current round {current_round} outside [{first}, {last}]"
            )));
        }
    }
    Ok(())
}

/// Runs the full verification: structure (1-6), round validity (7), opt-in
/// (8), and node simulation (9).
///
/// # Errors
///
/// - [`SchemeHandlerError::PaymentVerification`] carrying the distinct
///   reason of the first failing check
/// - [`SchemeHandlerError::NetworkError`] when a node call itself fails
pub async fn verify_group<N: AvmNodeClient + ?Sized>(
    node: &N,
    payload: &ExactAvmPayload,
    requirement: &TransferRequirement,
    fee_payers: &[Address],
) -> Result<VerifiedGroup, SchemeHandlerError> {
    let verified = verify_group_structure(payload, requirement, fee_payers)?;

    let current_round = node.last_round().await?;
    verify_round_validity(&verified.entries, current_round)?;

    let opted_in = node
        .is_opted_in(requirement.pay_to, requirement.asset_id)
        .await?;
    if !opted_in {
        return Err(PaymentVerificationError::AsaOptInRequired {
            receiver: requirement.pay_to.to_string(),
            asset: requirement.asset_id.to_string(),
        }
        .into());
    }

    let simulation_entries = verified
        .entries
        .iter()
        .map(encode_for_simulation)
        .collect::<Result<Vec<_>, _>>()?;
    node.simulate_group(simulation_entries).await?;

    Ok(verified)
}

/// Signs the facilitator's entries and submits the group (settlement).
///
/// Returns the id of the payment transaction.
///
/// # Errors
///
/// - [`SchemeHandlerError::OnchainFailure`] when signing or confirmation fails
/// - [`SchemeHandlerError::NetworkError`] when submission fails
pub async fn settle_group(
    provider: &AvmChainProvider,
    verified: VerifiedGroup,
) -> Result<String, SchemeHandlerError> {
    let mut signed_group = Vec::with_capacity(verified.entries.len());
    let mut payment_txid = None;

    for (index, entry) in verified.entries.into_iter().enumerate() {
        let signed = match entry {
            GroupEntry::Signed(signed) => signed,
            GroupEntry::Unsigned(txn) => {
                let sender = txn_sender(&txn);
                let account = provider.account_for(&sender).ok_or_else(|| {
                    SchemeHandlerError::OnchainFailure(format!(
                        "no signing key for fee payer {sender}"
                    ))
                })?;
                account.sign_transaction(txn).map_err(|e| {
                    SchemeHandlerError::OnchainFailure(format!("fee-payer signing: {e}"))
                })?
            }
        };
        if index == verified.payment_index {
            payment_txid = Some(signed.transaction_id.clone());
        }
        signed_group.push(signed);
    }

    let payment_txid = payment_txid.ok_or_else(|| {
        SchemeHandlerError::OnchainFailure("payment transaction missing from group".to_owned())
    })?;

    let submission_txid = provider.broadcast_group(signed_group).await?;
    provider
        .wait_for_confirmation(submission_txid, provider.confirmation_rounds())
        .await?;

    Ok(payment_txid)
}

fn transfer_requirement(
    asset: &proto::U64String,
    amount: &proto::U64String,
    pay_to: &str,
) -> Result<TransferRequirement, PaymentVerificationError> {
    let pay_to = parse_address(pay_to).map_err(|e| {
        PaymentVerificationError::InvalidPayloadFormat(format!("payTo: {e}"))
    })?;
    Ok(TransferRequirement {
        asset_id: asset.inner(),
        amount: amount.inner(),
        pay_to,
    })
}

/// Facilitator handler for the V2 Algorand exact scheme.
pub struct V2AlgorandExactHandler {
    provider: AvmChainProvider,
}

impl V2AlgorandExactHandler {
    /// Creates a handler over the given provider.
    #[must_use]
    pub const fn new(provider: AvmChainProvider) -> Self {
        Self { provider }
    }

    async fn verify_request(
        &self,
        request: &types::VerifyRequest,
    ) -> Result<VerifiedGroup, SchemeHandlerError> {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;

        let accepted = &payload.accepted;
        if accepted != requirements {
            return Err(PaymentVerificationError::AcceptedRequirementsMismatch.into());
        }
        if accepted.network != self.provider.chain_id() {
            return Err(PaymentVerificationError::ChainIdMismatch.into());
        }
        let requirement = transfer_requirement(
            &requirements.asset,
            &requirements.amount,
            &requirements.pay_to,
        )?;
        verify_group(
            &self.provider,
            &payload.payload,
            &requirement,
            &self.provider.fee_payer_addresses(),
        )
        .await
    }
}

impl SchemeHandler for V2AlgorandExactHandler {
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
            match settle_group(&self.provider, verified).await {
                Ok(txid) => Ok(proto::SettleResponse::Success {
                    payer,
                    transaction: txid,
                    network,
                    extensions: None,
                }),
                Err(SchemeHandlerError::PaymentVerification(e)) => {
                    Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: Some(payer),
                    })
                }
                Err(other) => Err(other),
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

/// Facilitator handler for the V1 Algorand exact scheme (legacy names).
pub struct V1AlgorandExactHandler {
    provider: AvmChainProvider,
}

impl V1AlgorandExactHandler {
    /// Creates a handler over the given provider.
    #[must_use]
    pub const fn new(provider: AvmChainProvider) -> Self {
        Self { provider }
    }

    async fn verify_request(
        &self,
        request: &types::VerifyRequestV1,
    ) -> Result<VerifiedGroup, SchemeHandlerError> {
        let payload = &request.payment_payload;
        let requirements = &request.payment_requirements;

        let registry = algorand_network_registry();
        let payload_chain = registry
            .canonicalize(&payload.network)
            .ok_or(PaymentVerificationError::ChainIdMismatch)?;
        let requirements_chain = registry
            .canonicalize(&requirements.network)
            .ok_or(PaymentVerificationError::ChainIdMismatch)?;
        let chain_id = self.provider.chain_id();
        if payload_chain != chain_id || requirements_chain != chain_id {
            return Err(PaymentVerificationError::ChainIdMismatch.into());
        }
        let requirement = transfer_requirement(
            &requirements.asset,
            &requirements.max_amount_required,
            &requirements.pay_to,
        )?;
        verify_group(
            &self.provider,
            &payload.payload,
            &requirement,
            &self.provider.fee_payer_addresses(),
        )
        .await
    }
}

impl SchemeHandler for V1AlgorandExactHandler {
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
            match settle_group(&self.provider, verified).await {
                Ok(txid) => Ok(proto::SettleResponse::Success {
                    payer,
                    transaction: txid,
                    network,
                    extensions: None,
                }),
                Err(SchemeHandlerError::PaymentVerification(e)) => {
                    Ok(proto::SettleResponse::Error {
                        reason: e.to_string(),
                        network,
                        payer: Some(payer),
                    })
                }
                Err(other) => Err(other),
            }
        })
    }

    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, SchemeHandlerError>> {
        Box::pin(async move {
            Ok(supported_response(&self.provider, 1, |chain_id| {
                algorand_network_registry()
                    .name_by_chain_id(chain_id)
                    .map_or_else(|| chain_id.to_string(), ToOwned::to_owned)
            }))
        })
    }
}

fn supported_response(
    provider: &AvmChainProvider,
    x402_version: u8,
    network_label: impl Fn(&ChainId) -> String,
) -> proto::SupportedResponse {
    let chain_id = provider.chain_id();
    // Random pick spreads sponsored groups across the configured fee payers;
    // the accounts are interchangeable so no coordination is needed.
    let fee_payer = provider.pick_fee_payer().map(|a| a.address().to_string());
    let extra = serde_json::to_value(types::SupportedPaymentKindExtra { fee_payer }).ok();
    let kinds = vec![proto::SupportedPaymentKind {
        x402_version,
        scheme: types::EXACT_SCHEME.to_owned(),
        network: network_label(&chain_id),
        extra,
    }];
    let mut signers = std::collections::HashMap::with_capacity(1);
    signers.insert(chain_id.to_string(), provider.signer_addresses());
    proto::SupportedResponse {
        kinds,
        extensions: Vec::new(),
        signers,
    }
}

impl SchemeHandlerBuilder<&AvmChainProvider> for V2AlgorandExact {
    fn build(
        &self,
        provider: &AvmChainProvider,
        _config: Option<serde_json::Value>,
    ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>> {
        Ok(Box::new(V2AlgorandExactHandler::new(provider.clone())))
    }
}

impl SchemeHandlerBuilder<&AvmChainProvider> for V1AlgorandExact {
    fn build(
        &self,
        provider: &AvmChainProvider,
        _config: Option<serde_json::Value>,
    ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>> {
        Ok(Box::new(V1AlgorandExactHandler::new(provider.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algonaut::core::{MicroAlgos, Round, SuggestedTransactionParams};
    use algonaut::crypto::HashDigest;
    use algonaut::transaction::account::Account;
    use algonaut::transaction::tx_group::TxGroup;
    use algonaut::transaction::{Pay, TransferAsset, TxnBuilder, TxnFee};

    use crate::exact::client::{AvmClientSigner, PaymentIntent, build_payment_group};
    use crate::exact::types::{encode_signed_entry, encode_unsigned_entry};

    const ASSET_ID: u64 = 10458941;
    const AMOUNT: u64 = 1000;

    fn params() -> SuggestedTransactionParams {
        SuggestedTransactionParams {
            genesis_id: "testnet-v1.0".to_owned(),
            genesis_hash: HashDigest([7u8; 32]),
            consensus_version: "v40".to_owned(),
            fee_per_byte: MicroAlgos(0),
            min_fee: MicroAlgos(1000),
            first_valid: Round(5_000),
            last_valid: Round(6_000),
        }
    }

    fn payer() -> Account {
        Account::generate()
    }

    fn requirement(receiver: Address) -> TransferRequirement {
        TransferRequirement {
            asset_id: ASSET_ID,
            amount: AMOUNT,
            pay_to: receiver,
        }
    }

    fn sponsored_payload(
        payer: &Account,
        fee_payer: Address,
        receiver: Address,
        amount: u64,
    ) -> ExactAvmPayload {
        build_payment_group(
            payer,
            &params(),
            &PaymentIntent {
                asset_id: ASSET_ID,
                amount,
                pay_to: receiver,
                fee_payer: Some(fee_payer),
            },
        )
        .unwrap()
    }

    #[test]
    fn sponsored_group_passes_structure_checks() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        let payload = sponsored_payload(&payer, fee_payer.address(), receiver, AMOUNT);
        assert_eq!(payload.payment_index, 1);

        let verified = verify_group_structure(
            &payload,
            &requirement(receiver),
            &[fee_payer.address()],
        )
        .unwrap();
        assert_eq!(verified.payer, payer.address());
        assert_eq!(verified.entries.len(), 2);
        assert!(!verified.entries[0].is_signed());
        assert!(verified.entries[1].is_signed());
    }

    #[test]
    fn unsponsored_group_passes_structure_checks() {
        let payer = payer();
        let receiver = Account::generate().address();
        let payload = build_payment_group(
            &payer,
            &params(),
            &PaymentIntent {
                asset_id: ASSET_ID,
                amount: AMOUNT,
                pay_to: receiver,
                fee_payer: None,
            },
        )
        .unwrap();
        assert_eq!(payload.payment_group.len(), 1);
        assert_eq!(payload.payment_index, 0);

        let verified = verify_group_structure(&payload, &requirement(receiver), &[]).unwrap();
        assert_eq!(verified.payer, payer.address());
    }

    #[test]
    fn group_members_share_a_group_id() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        let payload = sponsored_payload(&payer, fee_payer.address(), receiver, AMOUNT);

        let ids: Vec<_> = payload
            .payment_group
            .iter()
            .map(|e| {
                decode_group_entry(e)
                    .unwrap()
                    .transaction()
                    .group
                    .as_ref()
                    .map(|g| g.0)
            })
            .collect();
        assert!(ids[0].is_some());
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn amount_tampering_yields_amount_mismatch() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        // Client signs a 500 transfer, requirements demand 1000.
        let payload = sponsored_payload(&payer, fee_payer.address(), receiver, 500);

        let err = verify_group_structure(
            &payload,
            &requirement(receiver),
            &[fee_payer.address()],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "amount_mismatch: expected 1000, got 500");
    }

    #[test]
    fn wrong_receiver_yields_receiver_mismatch() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        let payload = sponsored_payload(&payer, fee_payer.address(), receiver, AMOUNT);

        let other = Account::generate().address();
        let err = verify_group_structure(&payload, &requirement(other), &[fee_payer.address()])
            .unwrap_err();
        assert!(err.to_string().starts_with("receiver_mismatch"));
    }

    #[test]
    fn wrong_asset_yields_asset_mismatch() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        let payload = sponsored_payload(&payer, fee_payer.address(), receiver, AMOUNT);

        let mut req = requirement(receiver);
        req.asset_id = 31566704;
        let err =
            verify_group_structure(&payload, &req, &[fee_payer.address()]).unwrap_err();
        assert!(err.to_string().starts_with("asset_mismatch"));
    }

    #[test]
    fn payment_index_out_of_bounds() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        let mut payload = sponsored_payload(&payer, fee_payer.address(), receiver, AMOUNT);
        payload.payment_index = 2;

        let err = verify_group_structure(
            &payload,
            &requirement(receiver),
            &[fee_payer.address()],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::InvalidPaymentIndex { index: 2, len: 2 }
        ));
    }

    #[test]
    fn oversized_group_rejected() {
        let payer = payer();
        let receiver = Account::generate().address();
        let single = build_payment_group(
            &payer,
            &params(),
            &PaymentIntent {
                asset_id: ASSET_ID,
                amount: AMOUNT,
                pay_to: receiver,
                fee_payer: None,
            },
        )
        .unwrap();
        let payload = ExactAvmPayload {
            payment_group: vec![single.payment_group[0].clone(); MAX_GROUP_SIZE + 1],
            payment_index: 0,
        };

        let err = verify_group_structure(&payload, &requirement(receiver), &[]).unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::GroupSizeExceeded { got: 17, max: 16 }
        ));
    }

    #[test]
    fn unsigned_entry_from_foreign_sender_rejected() {
        let payer = payer();
        let stranger = Account::generate();
        let receiver = Account::generate().address();
        // The "fee payer" entry is from an account the facilitator does not own.
        let payload = sponsored_payload(&payer, stranger.address(), receiver, AMOUNT);

        let facilitator_keys = [Account::generate().address()];
        let err = verify_group_structure(&payload, &requirement(receiver), &facilitator_keys)
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("invalid_exact_avm_payload_transaction")
        );
    }

    #[test]
    fn mismatched_group_ids_rejected() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        // Two groups built independently carry different group ids; splicing
        // entries across them must fail.
        let a = sponsored_payload(&payer, fee_payer.address(), receiver, AMOUNT);
        let b = sponsored_payload(&payer, fee_payer.address(), receiver, AMOUNT);
        let spliced = ExactAvmPayload {
            payment_group: vec![a.payment_group[0].clone(), b.payment_group[1].clone()],
            payment_index: 1,
        };

        let err = verify_group_structure(
            &spliced,
            &requirement(receiver),
            &[fee_payer.address()],
        )
        .unwrap_err();
        assert!(matches!(err, PaymentVerificationError::InconsistentGroupId));
    }

    #[test]
    fn keyreg_in_group_rejected() {
        let mut entries = vec![];
        let payer = payer();
        let receiver = Account::generate().address();
        let single = build_payment_group(
            &payer,
            &params(),
            &PaymentIntent {
                asset_id: ASSET_ID,
                amount: AMOUNT,
                pay_to: receiver,
                fee_payer: None,
            },
        )
        .unwrap();
        entries.push(decode_group_entry(&single.payment_group[0]).unwrap());

        // A keyreg is forbidden no matter who sends it.
        let keyreg = algonaut::transaction::RegisterKey::offline(payer.address()).build();
        let txn = TxnBuilder::with_fee(&params(), TxnFee::Fixed(MicroAlgos(1000)), keyreg)
            .build()
            .unwrap();
        entries.push(GroupEntry::Unsigned(txn));

        let err = verify_security_constraints(&entries).unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::SecurityKeyregNotAllowed
        ));
    }

    #[test]
    fn close_remainder_rejected() {
        let fee_payer = Account::generate();
        let drain = Account::generate().address();
        let mut txn = TxnBuilder::with_fee(
            &params(),
            TxnFee::Fixed(MicroAlgos(1000)),
            Pay::new(fee_payer.address(), fee_payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();
        if let TransactionType::Payment(payment) = &mut txn.txn_type {
            payment.close_remainder_to = Some(drain);
        }

        let err =
            verify_security_constraints(&[GroupEntry::Unsigned(txn)]).unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::SecurityCloseToNotAllowed
        ));
    }

    #[test]
    fn rekey_sandwich_accepted() {
        let payer = payer();
        let delegate = Account::generate().address();
        let receiver = Account::generate().address();
        let p = params();

        let mut rekey_out = TxnBuilder::with_fee(
            &p,
            TxnFee::Fixed(MicroAlgos(1000)),
            Pay::new(payer.address(), payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();
        rekey_out.rekey_to = Some(delegate);

        let transfer = TxnBuilder::with_fee(
            &p,
            TxnFee::Fixed(MicroAlgos(1000)),
            TransferAsset::new(payer.address(), ASSET_ID, AMOUNT, receiver).build(),
        )
        .build()
        .unwrap();

        let mut rekey_back = TxnBuilder::with_fee(
            &p,
            TxnFee::Fixed(MicroAlgos(1000)),
            Pay::new(payer.address(), payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();
        rekey_back.rekey_to = Some(payer.address());

        let entries = vec![
            GroupEntry::Unsigned(rekey_out),
            GroupEntry::Unsigned(transfer),
            GroupEntry::Unsigned(rekey_back),
        ];
        assert!(verify_security_constraints(&entries).is_ok());
    }

    #[test]
    fn lone_rekey_rejected() {
        let payer = payer();
        let delegate = Account::generate().address();
        let mut rekey = TxnBuilder::with_fee(
            &params(),
            TxnFee::Fixed(MicroAlgos(1000)),
            Pay::new(payer.address(), payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();
        rekey.rekey_to = Some(delegate);

        let err = verify_security_constraints(&[GroupEntry::Unsigned(rekey)]).unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::SecurityRekeyNotAllowed
        ));
    }

    #[test]
    fn rekey_pair_not_restoring_sender_rejected() {
        let payer = payer();
        let delegate = Account::generate().address();
        let other = Account::generate().address();
        let p = params();
        let mut first = TxnBuilder::with_fee(
            &p,
            TxnFee::Fixed(MicroAlgos(1000)),
            Pay::new(payer.address(), payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();
        first.rekey_to = Some(delegate);
        let mut second = TxnBuilder::with_fee(
            &p,
            TxnFee::Fixed(MicroAlgos(1000)),
            Pay::new(payer.address(), payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();
        second.rekey_to = Some(other);

        let err = verify_security_constraints(&[
            GroupEntry::Unsigned(first),
            GroupEntry::Unsigned(second),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::SecurityRekeyNotAllowed
        ));
    }

    #[test]
    fn fee_payer_fee_above_cap_rejected() {
        let fee_payer = Account::generate();
        let txn = TxnBuilder::with_fee(
            &params(),
            TxnFee::Fixed(MicroAlgos(MAX_REASONABLE_FEE + 1)),
            Pay::new(fee_payer.address(), fee_payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();

        let err = verify_fee_payer_transaction(&txn).unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::FeeTooHigh { got, max: 16_000 } if got == 16_001
        ));
    }

    #[test]
    fn fee_payer_moving_value_rejected() {
        let fee_payer = Account::generate();
        let victim = Account::generate().address();
        let txn = TxnBuilder::with_fee(
            &params(),
            TxnFee::Fixed(MicroAlgos(1000)),
            Pay::new(fee_payer.address(), victim, MicroAlgos(5)).build(),
        )
        .build()
        .unwrap();

        let err = verify_fee_payer_transaction(&txn).unwrap_err();
        assert!(err.to_string().starts_with("invalid_fee_payer"));
    }

    #[test]
    fn unsigned_payment_entry_rejected() {
        let payer = payer();
        let fee_payer = Account::generate();
        let receiver = Account::generate().address();
        let p = params();

        let mut fee_txn = TxnBuilder::with_fee(
            &p,
            TxnFee::Fixed(MicroAlgos(2000)),
            Pay::new(fee_payer.address(), fee_payer.address(), MicroAlgos(0)).build(),
        )
        .build()
        .unwrap();
        let mut pay_txn = TxnBuilder::with_fee(
            &p,
            TxnFee::Fixed(MicroAlgos(0)),
            TransferAsset::new(payer.address(), ASSET_ID, AMOUNT, receiver).build(),
        )
        .build()
        .unwrap();
        TxGroup::assign_group_id(vec![&mut fee_txn, &mut pay_txn]).unwrap();

        // The payment entry arrives unsigned but claims to come from the
        // facilitator's own fee payer, dodging the foreign-sender check; the
        // signature check must still fire.
        let payload = ExactAvmPayload {
            payment_group: vec![
                encode_unsigned_entry(&fee_txn).unwrap(),
                encode_unsigned_entry(&pay_txn).unwrap(),
            ],
            payment_index: 1,
        };
        let err = verify_group_structure(
            &payload,
            &requirement(receiver),
            &[fee_payer.address(), payer.address()],
        )
        .unwrap_err();
        assert!(matches!(err, PaymentVerificationError::PaymentNotSigned));
    }

    #[test]
    fn round_validity_window_enforced() {
        let payer = payer();
        let receiver = Account::generate().address();
        let payload = build_payment_group(
            &payer,
            &params(),
            &PaymentIntent {
                asset_id: ASSET_ID,
                amount: AMOUNT,
                pay_to: receiver,
                fee_payer: None,
            },
        )
        .unwrap();
        let verified = verify_group_structure(&payload, &requirement(receiver), &[]).unwrap();

        // params() sets validity to [5000, 6000].
        assert!(verify_round_validity(&verified.entries, 5_500).is_ok());
        assert!(verify_round_validity(&verified.entries, 4_999).is_err());
        assert!(verify_round_validity(&verified.entries, 6_001).is_err());
    }

    #[test]
    fn signed_entry_roundtrips_through_encoding() {
        let payer = payer();
        let receiver = Account::generate().address();
        let txn = TxnBuilder::with_fee(
            &params(),
            TxnFee::Fixed(MicroAlgos(1000)),
            TransferAsset::new(payer.address(), ASSET_ID, AMOUNT, receiver).build(),
        )
        .build()
        .unwrap();
        let signed = AvmClientSigner::sign_transaction(&payer, txn).unwrap();
        let encoded = encode_signed_entry(&signed).unwrap();

        let entry = decode_group_entry(&encoded).unwrap();
        assert!(entry.is_signed());
        let TransactionType::AssetTransferTransaction(xfer) = &entry.transaction().txn_type
        else {
            panic!("expected asset transfer");
        };
        assert_eq!(xfer.amount, AMOUNT);
        assert_eq!(xfer.receiver, receiver);
    }
}
