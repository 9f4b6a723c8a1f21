#![cfg(feature = "client")]

//! Client-side group construction and signing for the Algorand exact scheme.
//!
//! With a facilitator fee payer the group is
//! `[0-amount self-payment by the fee payer (unsigned, fee = min_fee x 2, flat),
//!   ASA transfer from the payer (signed, fee 0)]`
//! so the fee payer's pooled fee covers both transactions and the payment is
//! gasless for the payer. Without a fee payer the group degenerates to a
//! single self-funded ASA transfer. A group id is assigned only when the
//! group has more than one transaction.
//!
//! The client signs only transactions whose sender is the client's address.

use std::sync::Arc;

use algonaut::core::{Address, MicroAlgos, SuggestedTransactionParams};
use algonaut::transaction::account::Account;
use algonaut::transaction::tx_group::TxGroup;
use algonaut::transaction::{Pay, SignedTransaction, Transaction, TransferAsset, TxnBuilder, TxnFee};

use pay402::proto::{self, v1, v2};
use pay402::scheme::{
    BoxFuture, PaymentCandidate, PaymentCandidateSigner, SignedPayment, X402Error,
    X402SchemeClient, X402SchemeId,
};

use crate::chain::{AvmParamsSource, parse_address};
use crate::exact::types::{
    self, ExactAvmPayload, encode_signed_entry, encode_unsigned_entry,
};
use crate::exact::{V1AlgorandExact, V2AlgorandExact};
use crate::networks::algorand_network_registry;

/// Signing capability the client side needs.
///
/// The protocol core never touches key material; wallets plug in behind this
/// trait. [`Account`] implements it for local keys.
pub trait AvmClientSigner: Send + Sync {
    /// The client's address.
    fn address(&self) -> Address;

    /// Signs a transaction whose sender is the client's address.
    ///
    /// # Errors
    ///
    /// Returns [`X402Error::SigningError`] when the wallet refuses or fails.
    fn sign_transaction(&self, txn: Transaction) -> Result<SignedTransaction, X402Error>;
}

impl AvmClientSigner for Account {
    fn address(&self) -> Address {
        Account::address(self)
    }

    fn sign_transaction(&self, txn: Transaction) -> Result<SignedTransaction, X402Error> {
        Account::sign_transaction(self, txn).map_err(|e| X402Error::SigningError(e.to_string()))
    }
}

/// The transfer the client was asked to make.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// The ASA id to transfer.
    pub asset_id: u64,
    /// The atomic amount to transfer.
    pub amount: u64,
    /// The receiving address.
    pub pay_to: Address,
    /// The facilitator's fee payer, when pooled fees are offered.
    pub fee_payer: Option<Address>,
}

/// Builds and signs the payment group for an intent.
///
/// Pure given the suggested parameters; no node access happens here.
///
/// # Errors
///
/// Returns [`X402Error::SigningError`] when transaction construction or
/// signing fails.
pub fn build_payment_group<S: AvmClientSigner + ?Sized>(
    signer: &S,
    params: &SuggestedTransactionParams,
    intent: &PaymentIntent,
) -> Result<ExactAvmPayload, X402Error> {
    let sender = signer.address();
    let min_fee = params.min_fee;

    match intent.fee_payer {
        Some(fee_payer) => {
            // Flat pooled fee on the sponsor covers the whole group.
            let mut fee_txn = TxnBuilder::with_fee(
                params,
                TxnFee::Fixed(MicroAlgos(min_fee.0 * 2)),
                Pay::new(fee_payer, fee_payer, MicroAlgos(0)).build(),
            )
            .build()
            .map_err(|e| X402Error::SigningError(format!("fee transaction: {e:?}")))?;

            let mut pay_txn = TxnBuilder::with_fee(
                params,
                TxnFee::Fixed(MicroAlgos(0)),
                TransferAsset::new(sender, intent.asset_id, intent.amount, intent.pay_to).build(),
            )
            .build()
            .map_err(|e| X402Error::SigningError(format!("payment transaction: {e:?}")))?;

            TxGroup::assign_group_id(vec![&mut fee_txn, &mut pay_txn])
                .map_err(|e| X402Error::SigningError(format!("group id: {e:?}")))?;

            let signed_payment = signer.sign_transaction(pay_txn)?;
            Ok(ExactAvmPayload {
                payment_group: vec![
                    encode_unsigned_entry(&fee_txn)
                        .map_err(|e| X402Error::SigningError(e.to_string()))?,
                    encode_signed_entry(&signed_payment)
                        .map_err(|e| X402Error::SigningError(e.to_string()))?,
                ],
                payment_index: 1,
            })
        }
        None => {
            let pay_txn = TxnBuilder::with_fee(
                params,
                TxnFee::Fixed(min_fee),
                TransferAsset::new(sender, intent.asset_id, intent.amount, intent.pay_to).build(),
            )
            .build()
            .map_err(|e| X402Error::SigningError(format!("payment transaction: {e:?}")))?;

            let signed_payment = signer.sign_transaction(pay_txn)?;
            Ok(ExactAvmPayload {
                payment_group: vec![
                    encode_signed_entry(&signed_payment)
                        .map_err(|e| X402Error::SigningError(e.to_string()))?,
                ],
                payment_index: 0,
            })
        }
    }
}

fn intent_from_extra(
    asset: &proto::U64String,
    amount: &proto::U64String,
    pay_to: &str,
    extra: Option<&types::SupportedPaymentKindExtra>,
) -> Result<PaymentIntent, X402Error> {
    let pay_to = parse_address(pay_to).map_err(|e| X402Error::SigningError(e.to_string()))?;
    let fee_payer = extra
        .and_then(|e| e.fee_payer.as_deref())
        .map(parse_address)
        .transpose()
        .map_err(|e| X402Error::SigningError(e.to_string()))?;
    Ok(PaymentIntent {
        asset_id: asset.inner(),
        amount: amount.inner(),
        pay_to,
        fee_payer,
    })
}

/// V2 client for the Algorand exact scheme.
#[derive(Clone)]
pub struct V2AlgorandExactClient<S, P> {
    signer: Arc<S>,
    params_source: P,
}

impl<S, P> std::fmt::Debug for V2AlgorandExactClient<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V2AlgorandExactClient").finish_non_exhaustive()
    }
}

impl<S, P> V2AlgorandExactClient<S, P> {
    /// Creates a client over a signer and a params source.
    pub fn new(signer: S, params_source: P) -> Self {
        Self {
            signer: Arc::new(signer),
            params_source,
        }
    }
}

impl<S, P> X402SchemeId for V2AlgorandExactClient<S, P> {
    fn namespace(&self) -> &str {
        V2AlgorandExact.namespace()
    }

    fn scheme(&self) -> &str {
        V2AlgorandExact.scheme()
    }
}

impl<S, P> X402SchemeClient for V2AlgorandExactClient<S, P>
where
    S: AvmClientSigner + 'static,
    P: AvmParamsSource + Clone + 'static,
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
                if requirements.network.namespace() != "algorand" {
                    return None;
                }
                Some(PaymentCandidate {
                    chain_id: requirements.network.clone(),
                    asset: requirements.asset.to_string(),
                    amount: requirements.amount.to_string(),
                    pay_to: requirements.pay_to.clone(),
                    scheme: self.scheme().to_owned(),
                    x402_version: self.x402_version(),
                    signer: Box::new(V2PayloadSigner {
                        signer: Arc::clone(&self.signer),
                        params_source: self.params_source.clone(),
                        requirements,
                        resource: payment_required.resource.clone(),
                    }),
                })
            })
            .collect()
    }
}

struct V2PayloadSigner<S, P> {
    signer: Arc<S>,
    params_source: P,
    requirements: types::PaymentRequirements,
    resource: v2::ResourceInfo,
}

impl<S, P> PaymentCandidateSigner for V2PayloadSigner<S, P>
where
    S: AvmClientSigner,
    P: AvmParamsSource,
{
    fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>> {
        Box::pin(async move {
            let params = self
                .params_source
                .suggested_params()
                .await
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            let intent = intent_from_extra(
                &self.requirements.asset,
                &self.requirements.amount,
                &self.requirements.pay_to,
                self.requirements.extra.as_ref(),
            )?;
            let group = build_payment_group(self.signer.as_ref(), &params, &intent)?;

            let payload = types::PaymentPayload {
                x402_version: v2::V2,
                accepted: self.requirements.clone(),
                resource: Some(self.resource.clone()),
                payload: group,
                extensions: None,
            };
            let header_value = pay402::proto::encoding::encode_header(&payload)
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            Ok(SignedPayment {
                header_value,
                x402_version: 2,
            })
        })
    }
}

/// V1 client for the Algorand exact scheme (legacy network names).
#[derive(Clone)]
pub struct V1AlgorandExactClient<S, P> {
    signer: Arc<S>,
    params_source: P,
}

impl<S, P> std::fmt::Debug for V1AlgorandExactClient<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V1AlgorandExactClient").finish_non_exhaustive()
    }
}

impl<S, P> V1AlgorandExactClient<S, P> {
    /// Creates a client over a signer and a params source.
    pub fn new(signer: S, params_source: P) -> Self {
        Self {
            signer: Arc::new(signer),
            params_source,
        }
    }
}

impl<S, P> X402SchemeId for V1AlgorandExactClient<S, P> {
    fn x402_version(&self) -> u8 {
        V1AlgorandExact.x402_version()
    }

    fn namespace(&self) -> &str {
        V1AlgorandExact.namespace()
    }

    fn scheme(&self) -> &str {
        V1AlgorandExact.scheme()
    }
}

impl<S, P> X402SchemeClient for V1AlgorandExactClient<S, P>
where
    S: AvmClientSigner + 'static,
    P: AvmParamsSource + Clone + 'static,
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
                let chain_id = algorand_network_registry()
                    .canonicalize(&requirements.network)?;
                if chain_id.namespace() != "algorand" {
                    return None;
                }
                Some(PaymentCandidate {
                    chain_id,
                    asset: requirements.asset.to_string(),
                    amount: requirements.max_amount_required.to_string(),
                    pay_to: requirements.pay_to.clone(),
                    scheme: self.scheme().to_owned(),
                    x402_version: self.x402_version(),
                    signer: Box::new(V1PayloadSigner {
                        signer: Arc::clone(&self.signer),
                        params_source: self.params_source.clone(),
                        requirements,
                    }),
                })
            })
            .collect()
    }
}

struct V1PayloadSigner<S, P> {
    signer: Arc<S>,
    params_source: P,
    requirements: types::PaymentRequirementsV1,
}

impl<S, P> PaymentCandidateSigner for V1PayloadSigner<S, P>
where
    S: AvmClientSigner,
    P: AvmParamsSource,
{
    fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>> {
        Box::pin(async move {
            let params = self
                .params_source
                .suggested_params()
                .await
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            let intent = intent_from_extra(
                &self.requirements.asset,
                &self.requirements.max_amount_required,
                &self.requirements.pay_to,
                self.requirements.extra.as_ref(),
            )?;
            let group = build_payment_group(self.signer.as_ref(), &params, &intent)?;

            let payload = types::PaymentPayloadV1 {
                x402_version: v1::V1,
                scheme: types::ExactScheme,
                network: self.requirements.network.clone(),
                payload: group,
            };
            let header_value = pay402::proto::encoding::encode_header(&payload)
                .map_err(|e| X402Error::SigningError(e.to_string()))?;
            Ok(SignedPayment {
                header_value,
                x402_version: 1,
            })
        })
    }
}
