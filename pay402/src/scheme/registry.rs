//! Scheme blueprint and handler registries.
//!
//! [`SchemeBlueprints`] stores factories that can create handlers;
//! [`SchemeRegistry`] holds active handler instances keyed by
//! (chain pattern, protocol version, scheme name).
//!
//! # Matching rules
//!
//! Looking up a request-time network `family:reference`:
//!
//! 1. exact `family:reference` registrations are consulted first,
//! 2. then the `family:*` wildcard for the namespace,
//! 3. v1 and v2 registrations never mix (the version is part of the key),
//! 4. re-registering a slug replaces the earlier handler, so among equal
//!    specificity the last registration wins.

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

use crate::chain::{ChainId, ChainProviderOps};

use super::X402SchemeId;
use super::handler::{SchemeHandler, SchemeHandlerBuilder};

/// Marker trait for types that are both identifiable and buildable.
pub trait SchemeBlueprint<P>: X402SchemeId + for<'a> SchemeHandlerBuilder<&'a P> {}
impl<T, P> SchemeBlueprint<P> for T where T: X402SchemeId + for<'a> SchemeHandlerBuilder<&'a P> {}

/// Registry of scheme blueprints (factories).
///
/// Register blueprints at startup, then build handlers into a
/// [`SchemeRegistry`].
#[derive(Default)]
pub struct SchemeBlueprints<P>(HashMap<String, Box<dyn SchemeBlueprint<P>>>, PhantomData<P>);

impl<P> Debug for SchemeBlueprints<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let slugs: Vec<String> = self.0.keys().cloned().collect();
        f.debug_tuple("SchemeBlueprints").field(&slugs).finish()
    }
}

impl<P> SchemeBlueprints<P> {
    /// Creates an empty blueprint registry.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new(), PhantomData)
    }

    /// Registers a blueprint and returns self for chaining.
    #[must_use]
    pub fn and_register<B: SchemeBlueprint<P> + 'static>(mut self, blueprint: B) -> Self {
        self.register(blueprint);
        self
    }

    /// Registers a scheme blueprint, replacing any earlier one with the same
    /// id.
    pub fn register<B: SchemeBlueprint<P> + 'static>(&mut self, blueprint: B) {
        self.0.insert(blueprint.id(), Box::new(blueprint));
    }

    /// Gets a blueprint by its id (e.g., "v2-algorand-exact").
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&dyn SchemeBlueprint<P>> {
        self.0.get(id).map(|v| &**v)
    }
}

/// Unique identifier for a scheme handler registration.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct SchemeHandlerSlug {
    /// The chain this handler operates on; reference `*` denotes a wildcard
    /// registration serving the whole namespace.
    pub chain_id: ChainId,
    /// The x402 protocol version.
    pub x402_version: u8,
    /// The scheme name (e.g., "exact").
    pub name: String,
}

impl SchemeHandlerSlug {
    /// Creates a new scheme handler slug.
    #[must_use]
    pub const fn new(chain_id: ChainId, x402_version: u8, name: String) -> Self {
        Self {
            chain_id,
            x402_version,
            name,
        }
    }

    /// Returns the wildcard form of this slug (`family:*`).
    #[must_use]
    pub fn as_wildcard(&self) -> Self {
        Self {
            chain_id: ChainId::new(self.chain_id.namespace(), "*"),
            x402_version: self.x402_version,
            name: self.name.clone(),
        }
    }

    /// Returns `true` if this slug uses a wildcard reference.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.chain_id.reference() == "*"
    }
}

impl Display for SchemeHandlerSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:v{}:{}",
            self.chain_id.namespace(),
            self.chain_id.reference(),
            self.x402_version,
            self.name
        )
    }
}

/// Registry of active scheme handlers.
///
/// Built at startup and frozen afterwards; the engines only read it.
#[derive(Default)]
pub struct SchemeRegistry(HashMap<SchemeHandlerSlug, Box<dyn SchemeHandler>>);

impl Debug for SchemeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let slugs: Vec<String> = self.0.keys().map(ToString::to_string).collect();
        f.debug_tuple("SchemeRegistry").field(&slugs).finish()
    }
}

impl SchemeRegistry {
    /// Creates an empty scheme registry.
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Registers a handler for the blueprint on the provider's exact chain.
    ///
    /// Re-registering the same (chain, version, scheme) replaces the earlier
    /// handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler cannot be built from the provider.
    pub fn register<P: ChainProviderOps>(
        &mut self,
        blueprint: &dyn SchemeBlueprint<P>,
        provider: &P,
        config: Option<serde_json::Value>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let chain_id = provider.chain_id();
        let handler = blueprint.build(provider, config)?;
        let slug = SchemeHandlerSlug::new(
            chain_id,
            blueprint.x402_version(),
            blueprint.scheme().to_string(),
        );
        self.insert(slug, handler);
        Ok(())
    }

    /// Registers a handler for the whole namespace (`family:*`).
    ///
    /// The handler serves any chain within the namespace for which no exact
    /// registration exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler cannot be built from the provider.
    pub fn register_for_namespace<P: ChainProviderOps>(
        &mut self,
        blueprint: &dyn SchemeBlueprint<P>,
        provider: &P,
        config: Option<serde_json::Value>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let handler = blueprint.build(provider, config)?;
        let namespace = provider.chain_id().namespace().to_owned();
        let slug = SchemeHandlerSlug::new(
            ChainId::new(namespace, "*"),
            blueprint.x402_version(),
            blueprint.scheme().to_string(),
        );
        self.insert(slug, handler);
        Ok(())
    }

    /// Inserts a pre-built handler under an explicit slug.
    ///
    /// This is the low-level registration primitive; `register` and
    /// `register_for_namespace` funnel through it.
    pub fn insert(&mut self, slug: SchemeHandlerSlug, handler: Box<dyn SchemeHandler>) {
        self.0.insert(slug, handler);
    }

    /// Gets a handler for a request-time slug.
    ///
    /// Two-phase lookup: exact chain match first, namespace wildcard second.
    #[must_use]
    pub fn by_slug(&self, slug: &SchemeHandlerSlug) -> Option<&dyn SchemeHandler> {
        self.0
            .get(slug)
            .or_else(|| self.0.get(&slug.as_wildcard()))
            .map(|h| &**h)
    }

    /// Returns an iterator over all registered handlers.
    pub fn values(&self) -> impl Iterator<Item = &dyn SchemeHandler> {
        self.0.values().map(|v| &**v)
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto;
    use crate::scheme::handler::{BoxFuture, SchemeHandlerError};

    struct TagHandler(&'static str);

    impl SchemeHandler for TagHandler {
        fn verify(
            &self,
            _request: proto::VerifyRequest,
        ) -> BoxFuture<'_, Result<proto::VerifyResponse, SchemeHandlerError>> {
            let tag = self.0;
            Box::pin(async move { Ok(proto::VerifyResponse::valid(tag.into())) })
        }

        fn settle(
            &self,
            _request: proto::SettleRequest,
        ) -> BoxFuture<'_, Result<proto::SettleResponse, SchemeHandlerError>> {
            let tag = self.0;
            Box::pin(async move {
                Ok(proto::SettleResponse::Success {
                    payer: tag.into(),
                    transaction: "tx".into(),
                    network: "test".into(),
                    extensions: None,
                })
            })
        }

        fn supported(
            &self,
        ) -> BoxFuture<'_, Result<proto::SupportedResponse, SchemeHandlerError>> {
            Box::pin(async { Ok(proto::SupportedResponse::default()) })
        }
    }

    fn slug(reference: &str, version: u8) -> SchemeHandlerSlug {
        SchemeHandlerSlug::new(ChainId::new("algorand", reference), version, "exact".into())
    }

    async fn tag_of(registry: &SchemeRegistry, lookup: &SchemeHandlerSlug) -> String {
        let handler = registry.by_slug(lookup).unwrap();
        match handler
            .verify(proto::VerifyRequest::from(serde_json::Value::Null))
            .await
            .unwrap()
        {
            proto::VerifyResponse::Valid { payer } => payer,
            proto::VerifyResponse::Invalid { .. } => unreachable!(),
        }
    }

    #[tokio::test]
    async fn exact_registration_beats_wildcard() {
        let mut registry = SchemeRegistry::new();
        registry.insert(slug("*", 2), Box::new(TagHandler("wildcard")));
        registry.insert(slug("TESTNET", 2), Box::new(TagHandler("exact")));

        assert_eq!(tag_of(&registry, &slug("TESTNET", 2)).await, "exact");
        assert_eq!(tag_of(&registry, &slug("MAINNET", 2)).await, "wildcard");
    }

    #[tokio::test]
    async fn reregistration_replaces_earlier_handler() {
        let mut registry = SchemeRegistry::new();
        registry.insert(slug("*", 2), Box::new(TagHandler("first")));
        registry.insert(slug("*", 2), Box::new(TagHandler("second")));

        assert_eq!(registry.len(), 1);
        assert_eq!(tag_of(&registry, &slug("TESTNET", 2)).await, "second");
    }

    #[test]
    fn versions_never_mix() {
        let mut registry = SchemeRegistry::new();
        registry.insert(slug("*", 1), Box::new(TagHandler("v1")));

        assert!(registry.by_slug(&slug("TESTNET", 1)).is_some());
        assert!(registry.by_slug(&slug("TESTNET", 2)).is_none());
    }

    #[test]
    fn no_match_for_foreign_namespace() {
        let mut registry = SchemeRegistry::new();
        registry.insert(slug("*", 2), Box::new(TagHandler("avm")));

        let foreign =
            SchemeHandlerSlug::new(ChainId::new("eip155", "84532"), 2, "exact".into());
        assert!(registry.by_slug(&foreign).is_none());
    }
}
