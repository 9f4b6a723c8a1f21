//! Algorand chain provider.
//!
//! [`AvmChainProvider`] owns the algod client and the facilitator's fee-payer
//! accounts for one Algorand network. All node interaction used by the exact
//! scheme goes through the [`AvmNodeClient`] seam so the verification logic
//! can be exercised against a stub node in tests.

use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use algonaut::algod::v2::Algod;
use algonaut::core::Address;
use algonaut::transaction::SignedTransaction;
use algonaut::transaction::account::Account;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use pay402::chain::{ChainId, ChainProviderOps};
use pay402::scheme::BoxFuture;

/// Interval between confirmation polls.
const CONFIRMATION_POLL: Duration = Duration::from_millis(500);

/// Rounds produced per poll-window estimate; Algorand finalizes a round in
/// under 4 seconds, so 8 polls per round bound the wait loop.
const POLLS_PER_ROUND: u32 = 8;

/// Errors raised by the Algorand chain provider.
#[derive(Debug, thiserror::Error)]
pub enum AvmChainError {
    /// The algod endpoint rejected a call or was unreachable.
    #[error("algod error: {0}")]
    Rpc(String),
    /// The group failed node-side simulation.
    #[error("{0}")]
    Simulation(String),
    /// The submitted group did not confirm within the round budget.
    #[error("transaction {txid} not confirmed within {rounds} rounds")]
    NotConfirmed {
        /// The transaction id that was awaited.
        txid: String,
        /// The round budget that elapsed.
        rounds: u64,
    },
    /// A transaction failed msgpack encoding.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Configuration is invalid (bad mnemonic, bad URL).
    #[error("configuration error: {0}")]
    Config(String),
}

/// Node operations the exact scheme needs.
///
/// Implemented by [`AvmChainProvider`] over algod; tests substitute a stub.
pub trait AvmNodeClient: Send + Sync {
    /// Returns the node's latest committed round.
    fn last_round(&self) -> BoxFuture<'_, Result<u64, AvmChainError>>;

    /// Returns whether `address` holds (has opted into) the given ASA.
    fn is_opted_in(&self, address: Address, asset_id: u64)
    -> BoxFuture<'_, Result<bool, AvmChainError>>;

    /// Simulates a transaction group; entries are msgpack-encoded
    /// `SignedTransaction` objects (unsigned fee-payer entries are wrapped
    /// with an empty signature and simulated with the empty-signature
    /// allowance).
    ///
    /// Returns `Ok(())` when every transaction in the group would succeed and
    /// the node's failure message otherwise.
    fn simulate_group(&self, entries: Vec<Vec<u8>>) -> BoxFuture<'_, Result<(), AvmChainError>>;

    /// Submits a fully signed group as one atomic raw submission and returns
    /// the id of the first transaction.
    fn broadcast_group(
        &self,
        group: Vec<SignedTransaction>,
    ) -> BoxFuture<'_, Result<String, AvmChainError>>;

    /// Waits for a transaction to confirm, polling for up to `rounds` rounds.
    fn wait_for_confirmation(
        &self,
        txid: String,
        rounds: u64,
    ) -> BoxFuture<'_, Result<(), AvmChainError>>;
}

/// Source of suggested transaction parameters for group construction.
///
/// Split from [`AvmNodeClient`] because the client side only ever needs
/// params, never simulation or submission.
pub trait AvmParamsSource: Send + Sync {
    /// Returns the node's current suggested transaction parameters.
    fn suggested_params(
        &self,
    ) -> BoxFuture<'_, Result<algonaut::core::SuggestedTransactionParams, AvmChainError>>;
}

/// Configuration for an Algorand chain provider.
#[derive(Debug, Clone)]
pub struct AvmChainConfig {
    /// The chain this provider serves.
    pub chain_id: ChainId,
    /// Algod REST endpoint.
    pub algod_url: String,
    /// Algod API token. Public endpoints accept any well-formed token.
    pub algod_token: String,
    /// Mnemonics of the facilitator's fee-payer accounts. May be empty for a
    /// verify-only or client-side provider.
    pub fee_payer_mnemonics: Vec<String>,
    /// Rounds to wait for settlement confirmation.
    pub confirmation_rounds: u64,
}

impl AvmChainConfig {
    /// Creates a config with the default confirmation budget of 4 rounds.
    #[must_use]
    pub fn new(chain_id: ChainId, algod_url: String, algod_token: String) -> Self {
        Self {
            chain_id,
            algod_url,
            algod_token,
            fee_payer_mnemonics: Vec::new(),
            confirmation_rounds: 4,
        }
    }
}

/// Algorand chain provider: algod client plus fee-payer accounts.
#[derive(Clone)]
pub struct AvmChainProvider {
    algod: Arc<Algod>,
    algod_url: String,
    http: reqwest::Client,
    fee_payers: Arc<Vec<Account>>,
    chain_id: ChainId,
    confirmation_rounds: u64,
}

impl Debug for AvmChainProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvmChainProvider")
            .field("chain_id", &self.chain_id)
            .field("algod_url", &self.algod_url)
            .field("fee_payers", &self.signer_addresses())
            .finish_non_exhaustive()
    }
}

impl AvmChainProvider {
    /// Builds a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AvmChainError::Config`] on a bad URL or mnemonic.
    pub fn try_new(config: &AvmChainConfig) -> Result<Self, AvmChainError> {
        let algod = Algod::new(&config.algod_url, &config.algod_token)
            .map_err(|e| AvmChainError::Config(format!("algod client: {e}")))?;
        let fee_payers = config
            .fee_payer_mnemonics
            .iter()
            .map(|mnemonic| {
                Account::from_mnemonic(mnemonic)
                    .map_err(|e| AvmChainError::Config(format!("fee payer mnemonic: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(feature = "telemetry")]
        tracing::info!(
            chain_id = %config.chain_id,
            algod_url = %config.algod_url,
            fee_payers = fee_payers.len(),
            "initialized Algorand provider"
        );

        Ok(Self {
            algod: Arc::new(algod),
            algod_url: config.algod_url.clone(),
            http: reqwest::Client::new(),
            fee_payers: Arc::new(fee_payers),
            chain_id: config.chain_id.clone(),
            confirmation_rounds: config.confirmation_rounds,
        })
    }

    /// Returns the configured confirmation budget in rounds.
    #[must_use]
    pub const fn confirmation_rounds(&self) -> u64 {
        self.confirmation_rounds
    }

    /// Returns the addresses of the facilitator's fee-payer accounts.
    #[must_use]
    pub fn fee_payer_addresses(&self) -> Vec<Address> {
        self.fee_payers.iter().map(Account::address).collect()
    }

    /// Picks a fee payer at random.
    ///
    /// Fee payers are interchangeable; a random pick spreads in-flight
    /// transactions across the configured accounts without coordination.
    #[must_use]
    pub fn pick_fee_payer(&self) -> Option<&Account> {
        use rand::seq::SliceRandom;
        self.fee_payers.choose(&mut rand::thread_rng())
    }

    /// Returns the fee-payer account for a sender address, if it is ours.
    #[must_use]
    pub fn account_for(&self, sender: &Address) -> Option<&Account> {
        self.fee_payers.iter().find(|a| a.address() == *sender)
    }

    /// Returns the underlying algod client.
    #[must_use]
    pub fn algod(&self) -> &Algod {
        &self.algod
    }
}

impl AvmParamsSource for AvmChainProvider {
    fn suggested_params(
        &self,
    ) -> BoxFuture<'_, Result<algonaut::core::SuggestedTransactionParams, AvmChainError>> {
        Box::pin(async move {
            self.algod
                .suggested_transaction_params()
                .await
                .map_err(|e| AvmChainError::Rpc(e.to_string()))
        })
    }
}

impl ChainProviderOps for AvmChainProvider {
    fn signer_addresses(&self) -> Vec<String> {
        self.fee_payers
            .iter()
            .map(|a| a.address().to_string())
            .collect()
    }

    fn chain_id(&self) -> ChainId {
        self.chain_id.clone()
    }
}

impl AvmNodeClient for AvmChainProvider {
    fn last_round(&self) -> BoxFuture<'_, Result<u64, AvmChainError>> {
        Box::pin(async move {
            let status = self
                .algod
                .status()
                .await
                .map_err(|e| AvmChainError::Rpc(e.to_string()))?;
            Ok(status.last_round)
        })
    }

    fn is_opted_in(
        &self,
        address: Address,
        asset_id: u64,
    ) -> BoxFuture<'_, Result<bool, AvmChainError>> {
        Box::pin(async move {
            let account = self
                .algod
                .account_information(&address)
                .await
                .map_err(|e| AvmChainError::Rpc(e.to_string()))?;
            Ok(account.assets.iter().any(|h| h.asset_id == asset_id))
        })
    }

    fn simulate_group(&self, entries: Vec<Vec<u8>>) -> BoxFuture<'_, Result<(), AvmChainError>> {
        Box::pin(async move {
            let txns: Vec<serde_json::Value> = entries
                .iter()
                .map(|bytes| serde_json::json!({ "txn": BASE64.encode(bytes) }))
                .collect();
            // Unsigned fee-payer entries carry no signature yet; the
            // empty-signature allowance makes the node treat them as signed
            // for simulation purposes.
            let body = serde_json::json!({
                "txn-groups": [ { "txns": txns } ],
                "allow-empty-signatures": true,
            });

            let url = format!("{}/v2/transactions/simulate", self.algod_url);
            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| AvmChainError::Rpc(format!("simulate request: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AvmChainError::Simulation(format!(
                    "simulate returned {status}: {body}"
                )));
            }

            let result: serde_json::Value = response
                .json()
                .await
                .map_err(|e| AvmChainError::Rpc(format!("simulate response: {e}")))?;

            if let Some(message) = simulation_failure_message(&result) {
                return Err(AvmChainError::Simulation(message));
            }
            Ok(())
        })
    }

    fn broadcast_group(
        &self,
        group: Vec<SignedTransaction>,
    ) -> BoxFuture<'_, Result<String, AvmChainError>> {
        Box::pin(async move {
            let response = self
                .algod
                .broadcast_signed_transactions(&group)
                .await
                .map_err(|e| AvmChainError::Rpc(format!("submission failed: {e}")))?;
            Ok(response.tx_id)
        })
    }

    fn wait_for_confirmation(
        &self,
        txid: String,
        rounds: u64,
    ) -> BoxFuture<'_, Result<(), AvmChainError>> {
        Box::pin(async move {
            let attempts = rounds as u32 * POLLS_PER_ROUND;
            for _ in 0..attempts {
                tokio::time::sleep(CONFIRMATION_POLL).await;
                match self.algod.pending_transaction_with_id(&txid).await {
                    Ok(info) => {
                        if info.confirmed_round.is_some() {
                            #[cfg(feature = "telemetry")]
                            tracing::info!(txid = %txid, round = ?info.confirmed_round, "confirmed");
                            return Ok(());
                        }
                        if let Some(pool_error) = non_empty(&info.pool_error) {
                            return Err(AvmChainError::Rpc(format!("pool error: {pool_error}")));
                        }
                    }
                    Err(_e) => {
                        #[cfg(feature = "telemetry")]
                        tracing::warn!(txid = %txid, error = %_e, "confirmation poll failed");
                    }
                }
            }
            Err(AvmChainError::NotConfirmed { txid, rounds })
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Walks a simulate response for a group- or transaction-level failure.
fn simulation_failure_message(result: &serde_json::Value) -> Option<String> {
    let groups = result.get("txn-groups")?.as_array()?;
    for group in groups {
        if let Some(failure) = group.get("failure-message").and_then(|f| f.as_str())
            && !failure.is_empty()
        {
            return Some(failure.to_owned());
        }
        if let Some(txn_results) = group.get("txn-results").and_then(|r| r.as_array()) {
            for (index, txn_result) in txn_results.iter().enumerate() {
                let failure = txn_result
                    .get("txn-result")
                    .and_then(|r| r.get("failure-message"))
                    .and_then(|f| f.as_str());
                if let Some(failure) = failure
                    && !failure.is_empty()
                {
                    return Some(format!("transaction {index}: {failure}"));
                }
            }
        }
    }
    None
}

/// Parses an Algorand address, mapping errors into [`AvmChainError`].
///
/// # Errors
///
/// Returns [`AvmChainError::Encoding`] for malformed addresses.
pub fn parse_address(address: &str) -> Result<Address, AvmChainError> {
    Address::from_str(address)
        .map_err(|e| AvmChainError::Encoding(format!("invalid address {address}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simulation_failure_walks_group_level() {
        let response = json!({
            "txn-groups": [ { "failure-message": "logic eval error" } ]
        });
        assert_eq!(
            simulation_failure_message(&response).unwrap(),
            "logic eval error"
        );
    }

    #[test]
    fn simulation_failure_walks_txn_level() {
        let response = json!({
            "txn-groups": [ {
                "failure-message": "",
                "txn-results": [
                    { "txn-result": { "failure-message": "" } },
                    { "txn-result": { "failure-message": "overspend" } }
                ]
            } ]
        });
        assert_eq!(
            simulation_failure_message(&response).unwrap(),
            "transaction 1: overspend"
        );
    }

    #[test]
    fn simulation_success_has_no_message() {
        let response = json!({
            "txn-groups": [ { "txn-results": [ { "txn-result": {} } ] } ]
        });
        assert!(simulation_failure_message(&response).is_none());
    }
}
