#![cfg(feature = "server")]

//! Resource-server helpers for the Solana exact scheme.

use pay402::amount::{MoneyAmount, MoneyAmountParseError};
use pay402::chain::ChainId;
use pay402::networks::USDC;
use pay402::proto::v2;

use crate::exact::types::EXACT_SCHEME;
use crate::networks::{KnownNetworkSolana, SplDeployment};

/// Default validity window for Solana price tags, in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Builds a V2 price tag for an SPL token amount on a Solana cluster.
#[must_use]
pub fn price_tag(
    chain_id: ChainId,
    pay_to: impl Into<String>,
    token: SplDeployment,
    amount: u64,
) -> v2::PriceTag {
    let requirements = v2::PaymentRequirements {
        scheme: EXACT_SCHEME.to_owned(),
        network: chain_id,
        amount: amount.to_string(),
        pay_to: pay_to.into(),
        max_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        asset: token.mint.to_string(),
        extra: None,
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
/// precision, or the cluster has no known USDC deployment.
pub fn usd_price_tag(
    chain_id: ChainId,
    pay_to: impl Into<String>,
    money: &str,
) -> Result<v2::PriceTag, MoneyAmountParseError> {
    let deployment = USDC::on_chain(&chain_id).ok_or(MoneyAmountParseError::InvalidFormat)?;
    let amount = MoneyAmount::parse(money)?.as_token_amount(deployment.decimals)?;
    let amount: u64 = amount
        .parse()
        .map_err(|_| MoneyAmountParseError::OutOfRange)?;
    Ok(price_tag(chain_id, pay_to, deployment, amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::MAINNET_GENESIS;

    #[test]
    fn usd_price_tag_uses_mainnet_usdc() {
        let chain_id = ChainId::new("solana", MAINNET_GENESIS);
        let tag = usd_price_tag(
            chain_id,
            "7v91N7iZ9mNicL8WfG6cgSCKyRXydQjLh6UYBWwm6y1Q",
            "0.000001",
        )
        .unwrap();
        assert_eq!(tag.requirements.amount, "1");
        assert_eq!(
            tag.requirements.asset,
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
        );
    }
}
