//! Facilitator service entrypoint.
//!
//! Assembles configuration, chain providers, scheme handlers, and the HTTP
//! server:
//!
//! - `.env` values load at startup; `HOST` and `PORT` override the bind
//!   address
//! - one handler per (scheme, configured chain, protocol version)
//! - CORS is open for GET/POST so browser paywalls can reach the service
//! - SIGINT/SIGTERM trigger graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use tower_http::cors;

use pay402::networks::NetworkRegistry;
use pay402::scheme::SchemeRegistry;
use pay402_avm::{V1AlgorandExact, V2AlgorandExact};
use pay402_evm::{V1Eip155Exact, V2Eip155Exact};
use pay402_svm::{V1SolanaExact, V2SolanaExact};

use crate::chain::chain_registry_from_config;
use crate::config::FacilitatorConfig;
use crate::error::FacilitatorSetupError;
use crate::handlers;
use crate::local::FacilitatorLocal;
use crate::util::SigDown;

/// Builds the scheme registry for every configured chain.
fn build_scheme_registry(
    config: &FacilitatorConfig,
) -> Result<SchemeRegistry, Box<dyn std::error::Error>> {
    let chains = chain_registry_from_config(config)?;
    let mut registry = SchemeRegistry::new();

    for (chain_id, provider) in chains.iter() {
        let scheme_config = config
            .chains
            .get(&chain_id.to_string())
            .and_then(|c| c.scheme_config.clone());
        let register =
            |registry: &mut SchemeRegistry,
             blueprint: &dyn pay402::scheme::SchemeBlueprint<crate::chain::ChainProvider>|
             -> Result<(), Box<dyn std::error::Error>> {
                registry
                    .register(blueprint, provider, scheme_config.clone())
                    .map_err(|e| {
                        FacilitatorSetupError::Scheme(format!("{chain_id}: {e}")).into()
                    })
            };
        match chain_id.namespace() {
            "eip155" => {
                register(&mut registry, &V1Eip155Exact)?;
                register(&mut registry, &V2Eip155Exact)?;
            }
            "solana" => {
                register(&mut registry, &V1SolanaExact)?;
                register(&mut registry, &V2SolanaExact)?;
            }
            "algorand" => {
                register(&mut registry, &V1AlgorandExact)?;
                register(&mut registry, &V2AlgorandExact)?;
            }
            other => {
                tracing::warn!(namespace = other, "no schemes for namespace, skipping");
            }
        }
        tracing::info!(chain_id = %chain_id, "registered scheme handlers");
    }

    Ok(registry)
}

/// Runs the facilitator until a termination signal arrives.
///
/// # Errors
///
/// Returns an error when configuration, chain setup, or binding fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
        .map_err(|_| "failed to install rustls crypto provider")?;

    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = FacilitatorConfig::load()?;
    let scheme_registry = build_scheme_registry(&config)?;

    let networks = NetworkRegistry::new()
        .with_networks(pay402_evm::EVM_NETWORKS)
        .with_networks(pay402_svm::SOLANA_NETWORKS)
        .with_networks(pay402_avm::ALGORAND_NETWORKS);

    let facilitator = Arc::new(FacilitatorLocal::new(scheme_registry, networks));

    let app = Router::new()
        .merge(handlers::routes(facilitator))
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("starting facilitator at http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let sig_down = SigDown::try_new()?;
    let cancellation = sig_down.cancellation_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancellation.cancelled().await })
        .await?;

    Ok(())
}
