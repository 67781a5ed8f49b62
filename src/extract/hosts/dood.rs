//! dood.ws: the page fetches its stream URL from `/pass_md5/<token>`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::origin;
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

static PASS_MD5: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$\.get\('/pass_md5/([^']+)").expect("static regex"));

pub struct Dood;

fn pass_token(html: &str) -> Option<&str> {
    PASS_MD5
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[async_trait]
impl HostHandler for Dood {
    fn domain(&self) -> &'static str {
        "dood.ws"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let page = ctx.http().fetch_text(url.as_str(), None).await?;
        let token = pass_token(&page)
            .ok_or(ExtractError::MissingElement("pass_md5 call"))?
            .to_string();

        let pass_url = format!("{}/pass_md5/{}", origin(url), token);
        let stream = ctx.http().fetch_text(&pass_url, Some(url.as_str())).await?;

        MediaDescriptor::new(stream.trim())
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
