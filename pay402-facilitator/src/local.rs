//! Local facilitator over the scheme registry.
//!
//! Routes each request to the handler registered for its
//! (chain, version, scheme) slug. V1 requests carry flat network names, so
//! routing consults the assembled [`NetworkRegistry`].

use std::collections::HashMap;

use pay402::facilitator::{BoxFuture, Facilitator, FacilitatorError};
use pay402::networks::NetworkRegistry;
use pay402::proto;
use pay402::scheme::SchemeRegistry;

/// A [`Facilitator`] delegating to registered scheme handlers.
#[derive(Debug)]
pub struct FacilitatorLocal {
    handlers: SchemeRegistry,
    networks: NetworkRegistry,
}

impl FacilitatorLocal {
    /// Creates a facilitator over a handler registry and the network name
    /// table used for V1 routing.
    #[must_use]
    pub const fn new(handlers: SchemeRegistry, networks: NetworkRegistry) -> Self {
        Self { handlers, networks }
    }

    fn handler_for(
        &self,
        slug: Option<pay402::scheme::SchemeHandlerSlug>,
    ) -> Result<&dyn pay402::scheme::SchemeHandler, FacilitatorError> {
        slug.and_then(|slug| self.handlers.by_slug(&slug))
            .ok_or(FacilitatorError::NoHandlerForNetwork)
    }
}

impl Facilitator for FacilitatorLocal {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, FacilitatorError>> {
        Box::pin(async move {
            let handler = self.handler_for(request.scheme_handler_slug(&self.networks))?;
            Ok(handler.verify(request).await?)
        })
    }

    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> BoxFuture<'_, Result<proto::SettleResponse, FacilitatorError>> {
        Box::pin(async move {
            let handler = self.handler_for(request.scheme_handler_slug(&self.networks))?;
            Ok(handler.settle(request).await?)
        })
    }

    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, FacilitatorError>> {
        Box::pin(async move {
            let mut kinds = vec![];
            let mut signers = HashMap::new();
            for handler in self.handlers.values() {
                if let Ok(mut supported) = handler.supported().await {
                    kinds.append(&mut supported.kinds);
                    for (chain_id, signer_addresses) in supported.signers {
                        signers.entry(chain_id).or_insert(signer_addresses);
                    }
                }
            }
            Ok(proto::SupportedResponse {
                kinds,
                extensions: Vec::new(),
                signers,
            })
        })
    }
}
