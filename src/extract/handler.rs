//! The per-host handler contract.

use async_trait::async_trait;
use futures::future::BoxFuture;
use url::Url;

use super::descriptor::MediaDescriptor;
use super::registry::Dispatcher;
use super::services::Services;
use crate::error::{ExtractError, Result};
use crate::http_client::HostClient;

/// Turns an embed page of one hosting site into a media descriptor.
///
/// Every handler takes the same arguments. Those that do not need the
/// referring page ignore `referer`; those that do return
/// [`ExtractError::RefererRequired`] without it.
#[async_trait]
pub trait HostHandler: Send + Sync {
    /// Canonical hostname this handler is registered under.
    fn domain(&self) -> &'static str;

    async fn resolve(
        &self,
        url: &Url,
        referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor>;
}

/// What a handler can reach while resolving.
pub struct ExtractContext<'a> {
    services: &'a Services,
    dispatcher: &'a Dispatcher,
    depth: usize,
}

impl<'a> ExtractContext<'a> {
    pub(crate) fn new(services: &'a Services, dispatcher: &'a Dispatcher, depth: usize) -> Self {
        Self {
            services,
            dispatcher,
            depth,
        }
    }

    pub fn services(&self) -> &'a Services {
        self.services
    }

    pub fn http(&self) -> &'a HostClient {
        self.services.http()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Resolve a redirect target through the full registry.
    ///
    /// Fails with [`ExtractError::RedirectDepth`] once the chain is longer
    /// than the configured limit.
    pub fn redispatch<'b>(
        &'b self,
        url: &'b str,
        referer: Option<&'b str>,
    ) -> BoxFuture<'b, Result<MediaDescriptor>> {
        Box::pin(async move {
            let limit = self.services.config().max_redirect_depth;
            let next = self.depth + 1;
            if next > limit {
                return Err(ExtractError::RedirectDepth(limit));
            }
            self.dispatcher
                .resolve_at_depth(url, referer, next)
                .await
                .ok_or(ExtractError::NoSources)
        })
    }
}
