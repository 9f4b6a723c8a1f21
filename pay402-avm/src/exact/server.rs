#![cfg(feature = "server")]

//! Resource-server helpers for the Algorand exact scheme: price tags and
//! facilitator enrichment.

use std::sync::Arc;

use pay402::amount::{MoneyAmount, MoneyAmountParseError};
use pay402::chain::ChainId;
use pay402::networks::USDC;
use pay402::proto::v2;

use crate::exact::types::{EXACT_SCHEME, SupportedPaymentKindExtra};
use crate::networks::{AsaDeployment, KnownNetworkAlgorand};

/// Default validity window for Algorand price tags, in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Builds a V2 price tag for an ASA amount on an Algorand chain.
///
/// The tag carries an enricher that fills `extra.feePayer` from the
/// facilitator's supported kinds, so requirement assembly automatically
/// offers gasless payment once a facilitator advertises a fee payer.
#[must_use]
pub fn price_tag(
    chain_id: ChainId,
    pay_to: impl Into<String>,
    asset: AsaDeployment,
    amount: u64,
) -> v2::PriceTag {
    let requirements = v2::PaymentRequirements {
        scheme: EXACT_SCHEME.to_owned(),
        network: chain_id,
        amount: amount.to_string(),
        pay_to: pay_to.into(),
        max_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        asset: asset.asset_id.to_string(),
        extra: None,
    };
    v2::PriceTag {
        requirements,
        enricher: Some(Arc::new(fee_payer_enricher)),
    }
}

/// Builds a V2 price tag from a USD money amount, paying in USDC.
///
/// This is the scheme's fallback money conversion: USD amounts convert to
/// the network's USDC deployment at 6 decimals through decimal-string
/// arithmetic.
///
/// # Errors
///
/// Returns an error when the money string fails to parse, exceeds USDC's
/// precision, or the chain has no known USDC deployment.
pub fn usd_price_tag(
    chain_id: ChainId,
    pay_to: impl Into<String>,
    money: &str,
) -> Result<v2::PriceTag, MoneyAmountParseError> {
    let deployment =
        USDC::on_chain(&chain_id).ok_or(MoneyAmountParseError::InvalidFormat)?;
    let amount = MoneyAmount::parse(money)?.as_token_amount(deployment.decimals)?;
    let amount: u64 = amount
        .parse()
        .map_err(|_| MoneyAmountParseError::OutOfRange)?;
    Ok(price_tag(chain_id, pay_to, deployment, amount))
}

/// Copies the facilitator's advertised fee payer into a price tag's extra.
fn fee_payer_enricher(tag: &mut v2::PriceTag, capabilities: &pay402::proto::SupportedResponse) {
    let network = tag.requirements.network.to_string();
    let fee_payer = capabilities
        .kinds
        .iter()
        .filter(|kind| kind.network == network && kind.scheme == EXACT_SCHEME)
        .find_map(|kind| {
            let extra: SupportedPaymentKindExtra =
                serde_json::from_value(kind.extra.clone()?).ok()?;
            extra.fee_payer
        });
    if let Some(fee_payer) = fee_payer {
        let extra = SupportedPaymentKindExtra {
            fee_payer: Some(fee_payer),
        };
        tag.requirements.extra = serde_json::to_value(extra).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::testnet_chain_id;
    use pay402::proto::{SupportedPaymentKind, SupportedResponse};

    const RECEIVER: &str = "RECEIVERAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    const FEE_PAYER: &str = "FEEPAYERAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    #[test]
    fn usd_price_tag_shifts_to_usdc_units() {
        let tag = usd_price_tag(testnet_chain_id(), RECEIVER, "$4.02").unwrap();
        assert_eq!(tag.requirements.amount, "4020000");
        assert_eq!(tag.requirements.asset, "10458941");
        assert_eq!(tag.requirements.scheme, "exact");
    }

    #[test]
    fn enricher_fills_fee_payer_from_supported() {
        let mut tag = usd_price_tag(testnet_chain_id(), RECEIVER, "1").unwrap();
        let capabilities = SupportedResponse {
            kinds: vec![SupportedPaymentKind {
                x402_version: 2,
                scheme: "exact".into(),
                network: testnet_chain_id().to_string(),
                extra: serde_json::to_value(SupportedPaymentKindExtra {
                    fee_payer: Some(FEE_PAYER.into()),
                })
                .ok(),
            }],
            extensions: vec![],
            signers: std::collections::HashMap::new(),
        };
        tag.enrich(&capabilities);
        let extra: SupportedPaymentKindExtra =
            serde_json::from_value(tag.requirements.extra.clone().unwrap()).unwrap();
        assert_eq!(extra.fee_payer.as_deref(), Some(FEE_PAYER));
    }

    #[test]
    fn enricher_ignores_foreign_networks() {
        let mut tag = usd_price_tag(testnet_chain_id(), RECEIVER, "1").unwrap();
        let capabilities = SupportedResponse {
            kinds: vec![SupportedPaymentKind {
                x402_version: 2,
                scheme: "exact".into(),
                network: "eip155:84532".into(),
                extra: serde_json::to_value(SupportedPaymentKindExtra {
                    fee_payer: Some(FEE_PAYER.into()),
                })
                .ok(),
            }],
            extensions: vec![],
            signers: std::collections::HashMap::new(),
        };
        tag.enrich(&capabilities);
        assert!(tag.requirements.extra.is_none());
    }
}
