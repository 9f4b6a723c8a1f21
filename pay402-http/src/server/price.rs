//! Price resolution for requirement assembly.
//!
//! A protected route is priced either with an explicit [`AssetAmount`]
//! (used verbatim after validation) or with human [`Money`](Price::Money),
//! which runs through a chain of [`MoneyParser`]s: the first parser to return
//! an amount wins. The final fallback is registered by the application from
//! the scheme's default conversion (USD to USDC at 6 decimals in the chain
//! crates), so a bare `"$4.02"` always resolves somewhere.

use pay402::chain::ChainId;
use pay402::proto::v2;

/// An explicit atomic amount of a concrete asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAmount {
    /// The amount in the asset's smallest unit, as a decimal string.
    pub amount: String,
    /// The asset identifier (ERC-20 address, SPL mint, or ASA id).
    pub asset: String,
    /// Scheme-specific extra data to carry into the requirements.
    pub extra: Option<serde_json::Value>,
}

/// A price as configured on a protected route.
#[derive(Debug, Clone)]
pub enum Price {
    /// A human money amount, e.g. `"1.50"`, `"$4.02"`, or `"10 USDC"`.
    Money(String),
    /// An explicit asset amount, used verbatim.
    AssetAmount(AssetAmount),
}

impl From<&str> for Price {
    fn from(value: &str) -> Self {
        Self::Money(value.to_owned())
    }
}

impl From<AssetAmount> for Price {
    fn from(value: AssetAmount) -> Self {
        Self::AssetAmount(value)
    }
}

/// One link of the money parsing chain.
///
/// Returns `None` when this parser does not recognize the money string for
/// the given network, passing the turn to the next parser.
pub trait MoneyParser: Send + Sync {
    /// Attempts to turn a money string into an asset amount on a network.
    fn parse_money(&self, money: &str, network: &ChainId) -> Option<AssetAmount>;
}

impl<F> MoneyParser for F
where
    F: Fn(&str, &ChainId) -> Option<AssetAmount> + Send + Sync,
{
    fn parse_money(&self, money: &str, network: &ChainId) -> Option<AssetAmount> {
        self(money, network)
    }
}

/// Error raised when no parser in the chain recognizes a price.
#[derive(Debug, thiserror::Error)]
#[error("no money parser resolved {money:?} on {network}")]
pub struct PriceResolutionError {
    /// The unresolved money string.
    pub money: String,
    /// The target network.
    pub network: ChainId,
}

/// Assembles payment requirements from prices through the parser chain.
#[derive(Default)]
pub struct RequirementsBuilder {
    parsers: Vec<Box<dyn MoneyParser>>,
}

impl std::fmt::Debug for RequirementsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequirementsBuilder")
            .field("parsers", &self.parsers.len())
            .finish()
    }
}

impl RequirementsBuilder {
    /// Creates a builder with an empty parser chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parser to the chain. Earlier parsers win.
    #[must_use]
    pub fn with_parser<P: MoneyParser + 'static>(mut self, parser: P) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    /// Resolves a price into an asset amount on a network.
    ///
    /// # Errors
    ///
    /// Returns [`PriceResolutionError`] when the price is money and no
    /// parser recognizes it.
    pub fn resolve(
        &self,
        price: &Price,
        network: &ChainId,
    ) -> Result<AssetAmount, PriceResolutionError> {
        match price {
            Price::AssetAmount(amount) => Ok(amount.clone()),
            Price::Money(money) => self
                .parsers
                .iter()
                .find_map(|parser| parser.parse_money(money, network))
                .ok_or_else(|| PriceResolutionError {
                    money: money.clone(),
                    network: network.clone(),
                }),
        }
    }

    /// Builds V2 payment requirements from a price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceResolutionError`] when the price cannot be resolved.
    pub fn build_requirements(
        &self,
        scheme: impl Into<String>,
        network: ChainId,
        price: &Price,
        pay_to: impl Into<String>,
        max_timeout_seconds: u64,
    ) -> Result<v2::PaymentRequirements, PriceResolutionError> {
        let resolved = self.resolve(price, &network)?;
        Ok(v2::PaymentRequirements {
            scheme: scheme.into(),
            network,
            amount: resolved.amount,
            pay_to: pay_to.into(),
            max_timeout_seconds,
            asset: resolved.asset,
            extra: resolved.extra,
        })
    }
}
