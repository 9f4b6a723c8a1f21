#![cfg(feature = "server")]

//! Resource-server helpers for the EVM exact scheme: price tags carrying the
//! EIP-712 domain hints clients need to sign offline.

use pay402::amount::{MoneyAmount, MoneyAmountParseError};
use pay402::chain::ChainId;
use pay402::networks::USDC;
use pay402::proto::v2;

use crate::exact::types::{EXACT_SCHEME, PaymentRequirementsExtra};
use crate::networks::{Erc20Deployment, KnownNetworkEip155};

/// Default validity window for EVM price tags, in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Builds a V2 price tag for an ERC-20 amount on an EVM chain.
#[must_use]
pub fn price_tag(
    chain_id: ChainId,
    pay_to: impl Into<String>,
    token: Erc20Deployment,
    amount: impl ToString,
) -> v2::PriceTag {
    let extra = PaymentRequirementsExtra {
        name: token.eip712_name.to_owned(),
        version: token.eip712_version.to_owned(),
    };
    let requirements = v2::PaymentRequirements {
        scheme: EXACT_SCHEME.to_owned(),
        network: chain_id,
        amount: amount.to_string(),
        pay_to: pay_to.into(),
        max_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        asset: token.address.to_string(),
        extra: serde_json::to_value(extra).ok(),
    };
    v2::PriceTag {
        requirements,
        enricher: None,
    }
}

/// Builds a V2 price tag from a USD money amount, paying in USDC.
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
    let deployment = USDC::on_chain(&chain_id).ok_or(MoneyAmountParseError::InvalidFormat)?;
    let amount = MoneyAmount::parse(money)?.as_token_amount(deployment.decimals)?;
    Ok(price_tag(chain_id, pay_to, deployment, amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_price_tag_carries_domain_hints() {
        let tag = usd_price_tag(
            ChainId::new("eip155", "84532"),
            "0x1111111111111111111111111111111111111111",
            "1.50",
        )
        .unwrap();
        assert_eq!(tag.requirements.amount, "1500000");
        let extra: PaymentRequirementsExtra =
            serde_json::from_value(tag.requirements.extra.clone().unwrap()).unwrap();
        assert_eq!(extra.version, "2");
    }

    #[test]
    fn unknown_chain_has_no_usd_fallback() {
        assert!(
            usd_price_tag(
                ChainId::new("eip155", "424242"),
                "0x1111111111111111111111111111111111111111",
                "1"
            )
            .is_err()
        );
    }
}
