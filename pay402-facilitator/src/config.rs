//! Facilitator configuration.
//!
//! Loaded from a TOML file with `$VAR`/`${VAR}` environment expansion in all
//! string values, so secrets stay in the environment:
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//!
//! [chains."eip155:84532"]
//! rpc_url = "https://sepolia.base.org"
//! signer_private_key = "$SIGNER_KEY_BASE_SEPOLIA"
//!
//! [chains."solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1"]
//! rpc_url = "https://api.devnet.solana.com"
//!
//! [chains."algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI="]
//! algod_url = "https://testnet-api.algonode.cloud"
//! fee_payer_mnemonics = ["$ALGORAND_FEE_PAYER_MNEMONIC"]
//! ```
//!
//! `CONFIG` selects the file (default `config.toml`); `HOST` and `PORT`
//! override the bind address.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;

/// Placeholder algod API token; public endpoints accept any well-formed one.
const DEFAULT_ALGOD_TOKEN: &str =
    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Top-level facilitator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FacilitatorConfig {
    /// Server bind address (default `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default `4021`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Chain configurations keyed by CAIP-2 identifier.
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,
}

/// Per-chain configuration; the relevant fields depend on the chain family
/// named by the CAIP-2 key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    /// RPC endpoint (EVM and Solana chains).
    pub rpc_url: Option<String>,

    /// Facilitator signer key in hex (EVM chains).
    pub signer_private_key: Option<String>,

    /// Algod REST endpoint (Algorand chains).
    pub algod_url: Option<String>,

    /// Algod API token (Algorand chains; defaults to a placeholder accepted
    /// by public endpoints).
    pub algod_token: Option<String>,

    /// Fee-payer account mnemonics (Algorand chains).
    #[serde(default)]
    pub fee_payer_mnemonics: Vec<String>,

    /// Settlement confirmation budget in rounds (Algorand chains, default 4).
    pub confirmation_rounds: Option<u64>,

    /// Scheme-specific configuration forwarded to the handler builders.
    pub scheme_config: Option<serde_json::Value>,
}

impl ChainConfig {
    /// Returns the algod token, falling back to the public placeholder.
    #[must_use]
    pub fn algod_token_or_default(&self) -> String {
        self.algod_token
            .clone()
            .unwrap_or_else(|| DEFAULT_ALGOD_TOKEN.to_owned())
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    4021
}

impl FacilitatorConfig {
    /// Loads configuration from the `CONFIG` environment variable, falling
    /// back to `config.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults, so a bare facilitator can start
    /// for smoke testing with no chains configured.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };
        let expanded = expand_env_vars(&content);
        let mut config: Self = toml::from_str(&expanded)?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse()
        {
            config.port = port;
        }

        Ok(config)
    }
}

/// Matches `$VAR` and `${VAR}` environment references. Variable names are
/// `[A-Za-z0-9_]+`; a bare `$` with no name is not a reference.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{(?P<braced>[A-Za-z0-9_]+)\}|(?P<plain>[A-Za-z0-9_]+))")
        .expect("valid regex")
});

/// Expands `$VAR` and `${VAR}` references from the process environment,
/// leaving unresolved references as-is so a missing secret fails loudly at
/// parse time instead of silently becoming an empty string.
fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .name("braced")
                .or_else(|| caps.name("plain"))
                .map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_else(|_| caps[0].to_owned())
        })
        .into_owned()
}
