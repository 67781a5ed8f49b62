//! Host registry and dispatcher.
//!
//! The registry is an immutable table from canonical domain to handler,
//! plus an alias table for mirror hostnames. Registration order is the
//! priority order used by [`ranking`](super::ranking).
//!
//! Aliases only affect lookup. The handler receives the URL exactly as
//! given, so a mirror's own origin is used for follow-up requests.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};
use url::Url;

use super::descriptor::MediaDescriptor;
use super::handler::{ExtractContext, HostHandler};
use super::services::Services;
use crate::error::RegistryError;

/// Ordered, read-only handler catalogue.
pub struct HostRegistry {
    handlers: Vec<Arc<dyn HostHandler>>,
    index: HashMap<&'static str, usize>,
    aliases: HashMap<String, String>,
}

/// Collects handlers and aliases, then validates them into a registry.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: Vec<Arc<dyn HostHandler>>,
    aliases: Vec<(String, String)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; later registrations rank lower.
    #[must_use]
    pub fn handler(mut self, handler: impl HostHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn HostHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Map a mirror hostname onto a registered domain.
    #[must_use]
    pub fn alias(mut self, mirror: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.push((mirror.into(), canonical.into()));
        self
    }

    /// Fails on duplicate domains or on an alias whose target is missing.
    pub fn build(self) -> Result<HostRegistry, RegistryError> {
        let mut index = HashMap::with_capacity(self.handlers.len());
        for (i, handler) in self.handlers.iter().enumerate() {
            if index.insert(handler.domain(), i).is_some() {
                return Err(RegistryError::DuplicateDomain(handler.domain().to_string()));
            }
        }

        let mut aliases = HashMap::with_capacity(self.aliases.len());
        for (mirror, canonical) in self.aliases {
            if !index.contains_key(canonical.as_str()) {
                return Err(RegistryError::DanglingAlias {
                    alias: mirror,
                    target: canonical,
                });
            }
            aliases.insert(mirror, canonical);
        }

        Ok(HostRegistry {
            handlers: self.handlers,
            index,
            aliases,
        })
    }
}

impl HostRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered domains in priority order.
    pub fn domains(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|h| h.domain())
    }

    /// `(mirror, canonical)` pairs, sorted by mirror.
    pub fn aliases(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self
            .aliases
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Hostname after alias resolution.
    pub fn canonical_domain<'a>(&'a self, host: &'a str) -> &'a str {
        self.aliases.get(host).map_or(host, String::as_str)
    }

    /// Registration index of `host` (alias-resolved), if known.
    pub fn priority_of_host(&self, host: &str) -> Option<usize> {
        self.index.get(self.canonical_domain(host)).copied()
    }

    /// Registration index of the URL's host, if known.
    pub fn priority(&self, url: &str) -> Option<usize> {
        let parsed = Url::parse(url).ok()?;
        self.priority_of_host(parsed.host_str()?)
    }

    pub fn handler_for(&self, url: &Url) -> Option<&Arc<dyn HostHandler>> {
        let i = self.priority_of_host(url.host_str()?)?;
        self.handlers.get(i)
    }
}

/// Resolves URLs to media descriptors, absorbing every handler failure.
pub struct Dispatcher {
    registry: Arc<HostRegistry>,
    services: Arc<Services>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HostRegistry>, services: Arc<Services>) -> Self {
        Self { registry, services }
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Resolve `url` to a descriptor.
    ///
    /// Returns `None` if:
    /// - the URL does not parse or its host has no handler (no I/O happens)
    /// - the handler returns an error or panics (logged as warning)
    pub async fn resolve(&self, url: &str, referer: Option<&str>) -> Option<MediaDescriptor> {
        self.resolve_at_depth(url, referer, 0).await
    }

    pub(crate) async fn resolve_at_depth(
        &self,
        url: &str,
        referer: Option<&str>,
        depth: usize,
    ) -> Option<MediaDescriptor> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Unparseable source URL {}: {}", url, e);
                return None;
            }
        };

        let Some(handler) = self.registry.handler_for(&parsed) else {
            debug!("No handler for {}", url);
            return None;
        };

        debug!("Matched host handler: {} (depth {})", handler.domain(), depth);
        let ctx = ExtractContext::new(&self.services, self, depth);

        match AssertUnwindSafe(handler.resolve(&parsed, referer, &ctx))
            .catch_unwind()
            .await
        {
            Ok(Ok(descriptor)) => Some(descriptor),
            Ok(Err(e)) => {
                warn!("Host handler {} failed for {}: {}", handler.domain(), url, e);
                None
            }
            Err(_) => {
                warn!("Host handler {} panicked for {}", handler.domain(), url);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::Result;

    struct Named(&'static str);

    #[async_trait]
    impl HostHandler for Named {
        fn domain(&self) -> &'static str {
            self.0
        }

        async fn resolve(
            &self,
            _url: &Url,
            _referer: Option<&str>,
            _ctx: &ExtractContext<'_>,
        ) -> Result<MediaDescriptor> {
            Err(crate::error::ExtractError::NoSources)
        }
    }

    fn registry() -> HostRegistry {
        HostRegistry::builder()
            .handler(Named("a.test"))
            .handler(Named("b.test"))
            .alias("mirror-b.test", "b.test")
            .build()
            .unwrap()
    }

    #[test]
    fn priority_follows_registration_order() {
        let reg = registry();
        assert_eq!(reg.priority("https://a.test/e/1"), Some(0));
        assert_eq!(reg.priority("https://b.test/e/1"), Some(1));
        assert_eq!(reg.priority("https://c.test/e/1"), None);
        assert_eq!(reg.domains().collect::<Vec<_>>(), ["a.test", "b.test"]);
    }

    #[test]
    fn alias_resolves_for_lookup() {
        let reg = registry();
        assert_eq!(reg.canonical_domain("mirror-b.test"), "b.test");
        assert_eq!(reg.canonical_domain("other.test"), "other.test");
        assert_eq!(reg.priority("https://mirror-b.test/x"), Some(1));
        let url = Url::parse("https://mirror-b.test/x").unwrap();
        assert_eq!(reg.handler_for(&url).unwrap().domain(), "b.test");
    }

    #[test]
    fn duplicate_domain_is_rejected() {
        let err = HostRegistry::builder()
            .handler(Named("a.test"))
            .handler(Named("a.test"))
            .build()
            .err();
        assert_eq!(err, Some(RegistryError::DuplicateDomain("a.test".into())));
    }

    #[test]
    fn dangling_alias_is_rejected() {
        let err = HostRegistry::builder()
            .handler(Named("a.test"))
            .alias("x.test", "missing.test")
            .build()
            .err();
        assert!(matches!(err, Some(RegistryError::DanglingAlias { .. })));
    }
}
