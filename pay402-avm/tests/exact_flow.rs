//! End-to-end exercises of the Algorand exact scheme against a stub node:
//! client-side group construction through facilitator verification, plus the
//! client engine's mutual-support filtering.

use std::sync::Mutex;

use algonaut::core::{Address, MicroAlgos, Round, SuggestedTransactionParams};
use algonaut::crypto::HashDigest;
use algonaut::transaction::SignedTransaction;
use algonaut::transaction::account::Account;

use pay402::proto::{self, v2};
use pay402::scheme::{
    BoxFuture, SchemeHandlerError, X402PaymentClient, X402SchemeClient,
};
use pay402_avm::chain::{AvmChainError, AvmNodeClient, AvmParamsSource};
use pay402_avm::exact::client::{PaymentIntent, V2AlgorandExactClient, build_payment_group};
use pay402_avm::exact::facilitator::{TransferRequirement, verify_group};
use pay402_avm::networks::testnet_chain_id;

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

/// Scriptable node double; defaults model a healthy chain at round 5500.
struct StubNode {
    last_round: u64,
    opted_in: bool,
    simulation_failure: Option<String>,
    simulated_groups: Mutex<usize>,
}

impl Default for StubNode {
    fn default() -> Self {
        Self {
            last_round: 5_500,
            opted_in: true,
            simulation_failure: None,
            simulated_groups: Mutex::new(0),
        }
    }
}

impl AvmNodeClient for StubNode {
    fn last_round(&self) -> BoxFuture<'_, Result<u64, AvmChainError>> {
        let round = self.last_round;
        Box::pin(async move { Ok(round) })
    }

    fn is_opted_in(
        &self,
        _address: Address,
        _asset_id: u64,
    ) -> BoxFuture<'_, Result<bool, AvmChainError>> {
        let opted_in = self.opted_in;
        Box::pin(async move { Ok(opted_in) })
    }

    fn simulate_group(&self, entries: Vec<Vec<u8>>) -> BoxFuture<'_, Result<(), AvmChainError>> {
        *self.simulated_groups.lock().unwrap() += 1;
        let failure = self.simulation_failure.clone();
        Box::pin(async move {
            assert!(!entries.is_empty());
            match failure {
                Some(message) => Err(AvmChainError::Simulation(message)),
                None => Ok(()),
            }
        })
    }

    fn broadcast_group(
        &self,
        _group: Vec<SignedTransaction>,
    ) -> BoxFuture<'_, Result<String, AvmChainError>> {
        Box::pin(async { Ok("TXID".to_owned()) })
    }

    fn wait_for_confirmation(
        &self,
        _txid: String,
        _rounds: u64,
    ) -> BoxFuture<'_, Result<(), AvmChainError>> {
        Box::pin(async { Ok(()) })
    }
}

fn sponsored_group(
    payer: &Account,
    fee_payer: &Account,
    receiver: Address,
) -> pay402_avm::exact::ExactAvmPayload {
    build_payment_group(
        payer,
        &params(),
        &PaymentIntent {
            asset_id: ASSET_ID,
            amount: AMOUNT,
            pay_to: receiver,
            fee_payer: Some(fee_payer.address()),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn happy_path_group_verifies_against_stub_node() {
    let payer = Account::generate();
    let fee_payer = Account::generate();
    let receiver = Account::generate().address();
    let payload = sponsored_group(&payer, &fee_payer, receiver);

    let node = StubNode::default();
    let requirement = TransferRequirement {
        asset_id: ASSET_ID,
        amount: AMOUNT,
        pay_to: receiver,
    };
    let verified = verify_group(&node, &payload, &requirement, &[fee_payer.address()])
        .await
        .unwrap();

    assert_eq!(verified.payer, payer.address());
    assert_eq!(*node.simulated_groups.lock().unwrap(), 1);
}

#[tokio::test]
async fn missing_opt_in_is_reported() {
    let payer = Account::generate();
    let fee_payer = Account::generate();
    let receiver = Account::generate().address();
    let payload = sponsored_group(&payer, &fee_payer, receiver);

    let node = StubNode {
        opted_in: false,
        ..StubNode::default()
    };
    let requirement = TransferRequirement {
        asset_id: ASSET_ID,
        amount: AMOUNT,
        pay_to: receiver,
    };
    let err = verify_group(&node, &payload, &requirement, &[fee_payer.address()])
        .await
        .unwrap_err();

    let SchemeHandlerError::PaymentVerification(reason) = err else {
        panic!("expected verification failure, got {err:?}");
    };
    assert!(reason.to_string().starts_with("asa_opt_in_required"));
}

#[tokio::test]
async fn simulation_failure_carries_node_message() {
    let payer = Account::generate();
    let fee_payer = Account::generate();
    let receiver = Account::generate().address();
    let payload = sponsored_group(&payer, &fee_payer, receiver);

    let node = StubNode {
        simulation_failure: Some("transaction already in ledger".to_owned()),
        ..StubNode::default()
    };
    let requirement = TransferRequirement {
        asset_id: ASSET_ID,
        amount: AMOUNT,
        pay_to: receiver,
    };
    let err = verify_group(&node, &payload, &requirement, &[fee_payer.address()])
        .await
        .unwrap_err();

    let SchemeHandlerError::PaymentVerification(reason) = err else {
        panic!("expected verification failure, got {err:?}");
    };
    assert_eq!(
        reason.to_string(),
        "simulation_failed: transaction already in ledger"
    );
}

#[tokio::test]
async fn expired_rounds_are_rejected_before_simulation() {
    let payer = Account::generate();
    let fee_payer = Account::generate();
    let receiver = Account::generate().address();
    let payload = sponsored_group(&payer, &fee_payer, receiver);

    let node = StubNode {
        last_round: 9_999,
        ..StubNode::default()
    };
    let requirement = TransferRequirement {
        asset_id: ASSET_ID,
        amount: AMOUNT,
        pay_to: receiver,
    };
    let err = verify_group(&node, &payload, &requirement, &[fee_payer.address()])
        .await
        .unwrap_err();

    let SchemeHandlerError::PaymentVerification(reason) = err else {
        panic!("expected verification failure, got {err:?}");
    };
    assert!(reason.to_string().starts_with("round_validity"));
    assert_eq!(*node.simulated_groups.lock().unwrap(), 0);
}

#[derive(Clone)]
struct StubParams;

impl AvmParamsSource for StubParams {
    fn suggested_params(
        &self,
    ) -> BoxFuture<'_, Result<SuggestedTransactionParams, AvmChainError>> {
        Box::pin(async { Ok(params()) })
    }
}

fn algorand_offer() -> v2::PaymentRequirements {
    v2::PaymentRequirements {
        scheme: "exact".into(),
        network: testnet_chain_id(),
        amount: AMOUNT.to_string(),
        pay_to: Account::generate().address().to_string(),
        max_timeout_seconds: 60,
        asset: ASSET_ID.to_string(),
        extra: None,
    }
}

fn evm_only_payment_required() -> proto::PaymentRequired {
    proto::PaymentRequired::V2(v2::PaymentRequired {
        x402_version: v2::V2,
        error: None,
        resource: v2::ResourceInfo {
            description: "feed".into(),
            mime_type: "application/json".into(),
            url: "https://api.example.com/feed".into(),
        },
        accepts: vec![v2::PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".parse().unwrap(),
            amount: "1000".into(),
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: 60,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: None,
        }],
        extensions: None,
    })
}

#[tokio::test]
async fn algorand_client_ignores_foreign_offers() {
    let client = V2AlgorandExactClient::new(Account::generate(), StubParams);
    assert!(client.accept(&evm_only_payment_required()).is_empty());

    // And the engine surfaces the gap as "no mutually supported option",
    // never reaching any signer.
    let engine = X402PaymentClient::new().register(client);
    let err = engine
        .create_payment_payload(&evm_only_payment_required())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no_mutually_supported_option");
}

#[tokio::test]
async fn algorand_client_signs_matching_offer() {
    let payer = Account::generate();
    let engine = X402PaymentClient::new()
        .register(V2AlgorandExactClient::new(payer, StubParams));

    let payment_required = proto::PaymentRequired::V2(v2::PaymentRequired {
        x402_version: v2::V2,
        error: None,
        resource: v2::ResourceInfo {
            description: "feed".into(),
            mime_type: "application/json".into(),
            url: "https://api.example.com/feed".into(),
        },
        accepts: vec![algorand_offer()],
        extensions: None,
    });

    let signed = engine.create_payment_payload(&payment_required).await.unwrap();
    assert_eq!(signed.x402_version, 2);

    // The header decodes back into a payload whose group carries the signed
    // ASA transfer at the declared index.
    let decoded: pay402_avm::exact::PaymentPayload =
        pay402::proto::encoding::decode_header(&signed.header_value).unwrap();
    assert_eq!(decoded.payload.payment_group.len(), 1);
    assert_eq!(decoded.payload.payment_index, 0);
    assert_eq!(decoded.accepted.amount.inner(), AMOUNT);
}
