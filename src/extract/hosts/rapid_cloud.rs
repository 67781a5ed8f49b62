//! rapid-cloud.co: browser-captured `master.m3u8` plus caption remux.
//!
//! The embed only plays when loaded from the episode page, so a referer is
//! mandatory. Captions are listed by the `getSources` endpoint and merged
//! into the final container after download.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::REFERER;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::sources_api::{subtitle_tracks, SourcesResponse};
use super::origin;
use crate::download::remux::{Remuxer, SubtitleTrack};
use crate::error::{ExtractError, Result};
use crate::extract::browser::{CaptureTarget, ManifestCapture, PLAY_BUTTON};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};
use crate::http_client::xhr_headers;

static EMBED: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".vidcloud-player-embed").expect("static selector"));
static PLAYER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#vidcloud-player").expect("static selector"));

pub struct RapidCloud;

/// Player id from the embed page; `Ok(None)` when the page has the embed
/// but no id attribute.
fn parse_player_page(html: &str) -> Result<Option<String>> {
    let doc = Html::parse_document(html);
    if doc.select(&EMBED).next().is_none() {
        return Err(ExtractError::MissingElement(".vidcloud-player-embed"));
    }
    Ok(doc
        .select(&PLAYER)
        .next()
        .and_then(|el| el.value().attr("data-id"))
        .map(str::to_string))
}

async fn fetch_subtitles(
    ctx: &ExtractContext<'_>,
    url: &Url,
    player_id: &str,
) -> Result<Vec<SubtitleTrack>> {
    let api = format!(
        "{}/ajax/embed-6/getSources?id={}",
        origin(url),
        urlencoding::encode(player_id)
    );
    let request = ctx.http().get(&api).headers(xhr_headers(url.as_str()));
    let response: SourcesResponse = ctx.http().fetch_json(request).await?;
    Ok(subtitle_tracks(&response.tracks))
}

#[async_trait]
impl HostHandler for RapidCloud {
    fn domain(&self) -> &'static str {
        "rapid-cloud.co"
    }

    async fn resolve(
        &self,
        url: &Url,
        referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let referer = referer.ok_or(ExtractError::RefererRequired)?;

        let page = ctx
            .http()
            .send(ctx.http().get(url.as_str()).header(REFERER, referer))
            .await?
            .text()
            .await?;
        let player_id = parse_player_page(&page)?;

        let capture = ManifestCapture::new(ctx.services().config().browser.clone());
        let found = capture
            .capture(&CaptureTarget {
                page_url: url.as_str(),
                referer: Some(referer),
                path_suffix: "master.m3u8",
                click_selector: PLAY_BUTTON,
            })
            .await?;

        let headers = found.downloader_headers(ctx.http().profile(), &origin(url));

        let mut descriptor = MediaDescriptor::new(found.url)
            .ok_or(ExtractError::NoSources)?
            .with_referer(referer)
            .with_headers(headers);

        // Missing captions never fail the stream itself.
        let subtitles = match player_id {
            Some(id) => fetch_subtitles(ctx, url, &id).await.unwrap_or_else(|e| {
                warn!("Could not list captions: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        debug!(count = subtitles.len(), "Caption tracks");
        if !subtitles.is_empty() {
            let remuxer = Remuxer::new(ctx.services().ffmpeg()).with_subtitles(subtitles);
            descriptor = descriptor.with_after_download(Arc::new(remuxer));
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_is_read_from_embed_page() {
        let html = r#"<div class="vidcloud-player-embed"><div id="vidcloud-player" data-id="Ab12"></div></div>"#;
        assert_eq!(parse_player_page(html).unwrap().as_deref(), Some("Ab12"));
    }

    #[test]
    fn page_without_embed_is_rejected() {
        let err = parse_player_page("<html><body>File not found</body></html>").unwrap_err();
        assert!(matches!(err, ExtractError::MissingElement(_)));
    }
}
