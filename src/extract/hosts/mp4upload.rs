//! www.mp4upload.com: packed player script calling `player.src("…")`.

use async_trait::async_trait;
use url::Url;

use super::unpack;
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

pub struct Mp4upload;

/// Argument of the first `player.src("…")` call in unpacked source.
fn player_src(unpacked: &str) -> Option<&str> {
    unpacked
        .split("player.")
        .find_map(|part| part.strip_prefix("src(\""))
        .and_then(|rest| rest.split('"').next())
        .filter(|src| !src.is_empty())
}

#[async_trait]
impl HostHandler for Mp4upload {
    fn domain(&self) -> &'static str {
        "www.mp4upload.com"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let page = ctx.http().fetch_text(url.as_str(), None).await?;
        let unpacked = unpack(ctx, &page).await?;
        let src = player_src(&unpacked).ok_or(ExtractError::NoSources)?;

        MediaDescriptor::new(src)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
