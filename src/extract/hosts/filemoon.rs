//! filemoon.sx: packed jwplayer setup with an HLS `file:` entry.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{origin, unpack};
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

static FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"file:\s*"([^"]+)""#).expect("static regex"));

pub struct Filemoon;

fn file_entry(unpacked: &str) -> Option<&str> {
    FILE.captures(unpacked).and_then(|c| c.get(1)).map(|m| m.as_str())
}

#[async_trait]
impl HostHandler for Filemoon {
    fn domain(&self) -> &'static str {
        "filemoon.sx"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let page = ctx.http().fetch_text(url.as_str(), None).await?;
        let unpacked = unpack(ctx, &page).await?;
        let file = file_entry(&unpacked).ok_or(ExtractError::NoSources)?;

        let origin = origin(url);
        MediaDescriptor::new(file)
            .map(|d| {
                d.with_referer(format!("{origin}/"))
                    .with_headers(ctx.http().profile().downloader_headers(Some(&origin)))
            })
            .ok_or(ExtractError::NoSources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hls_file_is_found() {
        let unpacked = r#"jwplayer("vplayer").setup({sources:[{file:"https://be.test/hls2/master.m3u8?t=1"}],image:"x.jpg"});"#;
        assert_eq!(file_entry(unpacked), Some("https://be.test/hls2/master.m3u8?t=1"));
        assert_eq!(file_entry("setup({})"), None);
    }
}
