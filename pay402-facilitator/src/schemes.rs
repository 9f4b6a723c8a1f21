//! Scheme blueprint implementations over the unified [`ChainProvider`].
//!
//! Each blueprint extracts the family-specific provider from the enum and
//! delegates to the chain crate's own builder.
//!
//! | Scheme | Chains |
//! |---|---|
//! | `V1Eip155Exact` / `V2Eip155Exact` | EIP-155 (EVM) |
//! | `V1SolanaExact` / `V2SolanaExact` | Solana |
//! | `V1AlgorandExact` / `V2AlgorandExact` | Algorand |

use pay402::scheme::{SchemeHandler, SchemeHandlerBuilder};
use pay402_avm::chain::AvmChainProvider;
use pay402_avm::{V1AlgorandExact, V2AlgorandExact};
use pay402_evm::chain::Eip155ChainProvider;
use pay402_evm::{V1Eip155Exact, V2Eip155Exact};
use pay402_svm::chain::SolanaChainProvider;
use pay402_svm::{V1SolanaExact, V2SolanaExact};

use crate::chain::ChainProvider;

macro_rules! family_blueprint {
    ($scheme:ty, $variant:ident, $provider:ty) => {
        impl SchemeHandlerBuilder<&ChainProvider> for $scheme {
            fn build(
                &self,
                provider: &ChainProvider,
                config: Option<serde_json::Value>,
            ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>> {
                let ChainProvider::$variant(provider) = provider else {
                    return Err(concat!(
                        stringify!($scheme),
                        "::build: provider is of the wrong chain family"
                    )
                    .into());
                };
                <$scheme as SchemeHandlerBuilder<&$provider>>::build(
                    self,
                    provider.as_ref(),
                    config,
                )
            }
        }
    };
}

family_blueprint!(V1Eip155Exact, Eip155, Eip155ChainProvider);
family_blueprint!(V2Eip155Exact, Eip155, Eip155ChainProvider);
family_blueprint!(V1SolanaExact, Solana, SolanaChainProvider);
family_blueprint!(V2SolanaExact, Solana, SolanaChainProvider);
family_blueprint!(V1AlgorandExact, Avm, AvmChainProvider);
family_blueprint!(V2AlgorandExact, Avm, AvmChainProvider);
