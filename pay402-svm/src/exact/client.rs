#![cfg(feature = "client")]

//! Client-side transaction building and signing for the Solana exact scheme.
//!
//! The payer is the fee payer: the client builds a complete transaction with
//! compute-budget instructions followed by one `TransferChecked`, signs it
//! with the local keypair, and ships it base64-encoded.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use solana_keypair::Keypair;
use solana_message::v0::Message as MessageV0;
use solana_message::{Hash, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;

use pay402::proto::{self, v1, v2};
use pay402::scheme::{
    BoxFuture, PaymentCandidate, PaymentCandidateSigner, SignedPayment, X402Error,
    X402SchemeClient, X402SchemeId,
};

use crate::chain::SolanaChainProvider;
use crate::exact::types::{self, ExactSolanaPayload, associated_token_account};
use crate::exact::{V1SolanaExact, V2SolanaExact};
use crate::networks::solana_network_registry;

/// Default compute unit limit for a token transfer.
const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 80_000;

/// Default priority fee in micro-lamports per compute unit.
const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 1;

/// Builds and signs one `TransferChecked` transaction with the payer as fee
/// payer. Pure given a blockhash; no node access happens here.
///
/// # Errors
///
/// Returns [`X402Error::SigningError`] when construction or signing fails.
pub fn build_transfer_transaction(
    payer: &Keypair,
    mint: &Pubkey,
    decimals: u8,
    token_program: &Pubkey,
    pay_to: &Pubkey,
    amount: u64,
    recent_blockhash: Hash,
) -> Result<VersionedTransaction, X402Error> {
    let payer_pubkey = payer.pubkey();
    let source = associated_token_account(&payer_pubkey, token_program, mint);
    let destination = associated_token_account(pay_to, token_program, mint);

    let transfer = if *token_program == spl_token::ID {
        spl_token::instruction::transfer_checked(
            token_program,
            &source,
            mint,
            &destination,
            &payer_pubkey,
            &[],
            amount,
            decimals,
        )
    } else {
        spl_token_2022::instruction::transfer_checked(
            token_program,
            &source,
            mint,
            &destination,
            &payer_pubkey,
            &[],
            amount,
            decimals,
        )
    }
    .map_err(|e| X402Error::SigningError(format!("transfer instruction: {e}")))?;

    let instructions = vec![
        solana_compute_budget_interface::ComputeBudgetInstruction::set_compute_unit_limit(
            DEFAULT_COMPUTE_UNIT_LIMIT,
        ),
        solana_compute_budget_interface::ComputeBudgetInstruction::set_compute_unit_price(
            DEFAULT_COMPUTE_UNIT_PRICE,
        ),
        transfer,
    ];

    let message = MessageV0::try_compile(&payer_pubkey, &instructions, &[], recent_blockhash)
        .map_err(|e| X402Error::SigningError(format!("message: {e}")))?;
    VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
        .map_err(|e| X402Error::SigningError(format!("signing: {e}")))
}

/// Reads the mint account to learn the owning token program and decimals.
async fn fetch_mint(
    provider: &SolanaChainProvider,
    mint: &Pubkey,
) -> Result<(Pubkey, u8), X402Error> {
    let account = provider
        .rpc()
        .get_account(mint)
        .await
        .map_err(|e| X402Error::SigningError(format!("fetch mint {mint}: {e}")))?;
    if account.owner == spl_token::ID {
        let state = spl_token::state::Mint::unpack(&account.data)
            .map_err(|e| X402Error::SigningError(format!("unpack mint {mint}: {e}")))?;
        Ok((spl_token::ID, state.decimals))
    } else if account.owner == spl_token_2022::ID {
        let state = spl_token_2022::state::Mint::unpack(&account.data)
            .map_err(|e| X402Error::SigningError(format!("unpack mint {mint}: {e}")))?;
        Ok((spl_token_2022::ID, state.decimals))
    } else {
        Err(X402Error::SigningError(format!(
            "mint {mint} has unknown owner {}",
            account.owner
        )))
    }
}

async fn build_signed_payload(
    signer: &Keypair,
    provider: &SolanaChainProvider,
    mint: &types::Address,
    pay_to: &types::Address,
    amount: u64,
) -> Result<ExactSolanaPayload, X402Error> {
    let (token_program, decimals) = fetch_mint(provider, mint.pubkey()).await?;
    let blockhash = provider
        .latest_blockhash()
        .await
        .map_err(|e| X402Error::SigningError(e.to_string()))?;
    let transaction = build_transfer_transaction(
        signer,
        mint.pubkey(),
        decimals,
        &token_program,
        pay_to.pubkey(),
        amount,
        blockhash,
    )?;
    let bytes = bincode::serialize(&transaction)
        .map_err(|e| X402Error::SigningError(format!("serialize: {e}")))?;
    Ok(ExactSolanaPayload {
        transaction: BASE64.encode(bytes),
    })
}

/// V2 client for the Solana exact scheme.
#[derive(Clone)]
pub struct V2SolanaExactClient {
    signer: Arc<Keypair>,
    provider: SolanaChainProvider,
}

impl std::fmt::Debug for V2SolanaExactClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V2SolanaExactClient").finish_non_exhaustive()
    }
}

impl V2SolanaExactClient {
    /// Creates a client over a local keypair and an RPC provider.
    #[must_use]
    pub fn new(signer: Keypair, provider: SolanaChainProvider) -> Self {
        Self {
            signer: Arc::new(signer),
            provider,
        }
    }
}

impl X402SchemeId for V2SolanaExactClient {
    fn namespace(&self) -> &str {
        V2SolanaExact.namespace()
    }

    fn scheme(&self) -> &str {
        V2SolanaExact.scheme()
    }
}

impl X402SchemeClient for V2SolanaExactClient {
    fn accept(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
        let proto::PaymentRequired::V2(payment_required) = payment_required else {
            return vec![];
        };
        payment_required
            .accepts
            .iter()
            .filter_map(|offer| {
                let requirements: types::PaymentRequirements = offer.as_concrete()?;
                if requirements.network.namespace() != "solana" {
                    return None;
                }
                Some(PaymentCandidate {
                    chain_id: requirements.network.clone(),
                    asset: requirements.asset.to_string(),
                    amount: requirements.amount.to_string(),
                    pay_to: requirements.pay_to.to_string(),
                    scheme: self.scheme().to_owned(),
                    x402_version: self.x402_version(),
                    signer: Box::new(V2PayloadSigner {
                        signer: Arc::clone(&self.signer),
                        provider: self.provider.clone(),
                        requirements,
                        resource: payment_required.resource.clone(),
                    }),
                })
            })
            .collect()
    }
}

struct V2PayloadSigner {
    signer: Arc<Keypair>,
    provider: SolanaChainProvider,
    requirements: types::PaymentRequirements,
    resource: v2::ResourceInfo,
}

impl PaymentCandidateSigner for V2PayloadSigner {
    fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>> {
        Box::pin(async move {
            let payload = build_signed_payload(
                &self.signer,
                &self.provider,
                &self.requirements.asset,
                &self.requirements.pay_to,
                self.requirements.amount.inner(),
            )
            .await?;
            let payment_payload = types::PaymentPayload {
                x402_version: v2::V2,
                accepted: self.requirements.clone(),
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

/// V1 client for the Solana exact scheme (legacy network names).
#[derive(Clone)]
pub struct V1SolanaExactClient {
    signer: Arc<Keypair>,
    provider: SolanaChainProvider,
}

impl std::fmt::Debug for V1SolanaExactClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V1SolanaExactClient").finish_non_exhaustive()
    }
}

impl V1SolanaExactClient {
    /// Creates a client over a local keypair and an RPC provider.
    #[must_use]
    pub fn new(signer: Keypair, provider: SolanaChainProvider) -> Self {
        Self {
            signer: Arc::new(signer),
            provider,
        }
    }
}

impl X402SchemeId for V1SolanaExactClient {
    fn x402_version(&self) -> u8 {
        V1SolanaExact.x402_version()
    }

    fn namespace(&self) -> &str {
        V1SolanaExact.namespace()
    }

    fn scheme(&self) -> &str {
        V1SolanaExact.scheme()
    }
}

impl X402SchemeClient for V1SolanaExactClient {
    fn accept(&self, payment_required: &proto::PaymentRequired) -> Vec<PaymentCandidate> {
        let proto::PaymentRequired::V1(payment_required) = payment_required else {
            return vec![];
        };
        payment_required
            .accepts
            .iter()
            .filter_map(|offer| {
                let requirements: types::PaymentRequirementsV1 = offer.as_concrete()?;
                let chain_id = solana_network_registry().canonicalize(&requirements.network)?;
                if chain_id.namespace() != "solana" {
                    return None;
                }
                Some(PaymentCandidate {
                    chain_id,
                    asset: requirements.asset.to_string(),
                    amount: requirements.max_amount_required.to_string(),
                    pay_to: requirements.pay_to.to_string(),
                    scheme: self.scheme().to_owned(),
                    x402_version: self.x402_version(),
                    signer: Box::new(V1PayloadSigner {
                        signer: Arc::clone(&self.signer),
                        provider: self.provider.clone(),
                        requirements,
                    }),
                })
            })
            .collect()
    }
}

struct V1PayloadSigner {
    signer: Arc<Keypair>,
    provider: SolanaChainProvider,
    requirements: types::PaymentRequirementsV1,
}

impl PaymentCandidateSigner for V1PayloadSigner {
    fn sign_payment(&self) -> BoxFuture<'_, Result<SignedPayment, X402Error>> {
        Box::pin(async move {
            let payload = build_signed_payload(
                &self.signer,
                &self.provider,
                &self.requirements.asset,
                &self.requirements.pay_to,
                self.requirements.max_amount_required.inner(),
            )
            .await?;
            let payment_payload = types::PaymentPayloadV1 {
                x402_version: v1::V1,
                scheme: types::ExactScheme,
                network: self.requirements.network.clone(),
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

    use crate::networks::KnownNetworkSolana;

    #[test]
    fn built_transaction_is_signed_by_payer() {
        let payer = Keypair::new();
        let pay_to = Keypair::new().pubkey();
        let deployment = pay402::networks::USDC::solana_devnet();
        let transaction = build_transfer_transaction(
            &payer,
            &deployment.mint,
            6,
            &spl_token::ID,
            &pay_to,
            1000,
            Hash::default(),
        )
        .unwrap();

        assert_eq!(
            transaction.message.header().num_required_signatures as usize,
            transaction.signatures.len()
        );
        assert_eq!(
            transaction.message.static_account_keys()[0],
            payer.pubkey()
        );
    }
}
