//! vidoza.net: the source is inline in the player config.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

static SOURCES_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"sourcesCode:\s*\[\{\s*src:\s*"([^"]+)""#).expect("static regex")
});

pub struct Vidoza;

fn source(html: &str) -> Option<&str> {
    SOURCES_CODE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[async_trait]
impl HostHandler for Vidoza {
    fn domain(&self) -> &'static str {
        "vidoza.net"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let page = ctx.http().fetch_text(url.as_str(), None).await?;
        source(&page)
            .and_then(MediaDescriptor::new)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
