//! vidembed.io: a thin wrapper page around another host's player.
//!
//! Either the request is redirected to the real host, or the page embeds
//! it through an `<iframe>` or a meta refresh. The target goes back
//! through the dispatcher with this page as referer.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};

static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("static selector"));
static META: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[http-equiv][content]").expect("static selector"));

pub struct Vidembed;

/// `0; url=https://…` -> `https://…`
fn refresh_target(content: &str) -> Option<&str> {
    let (_, rest) = content.split_once(';')?;
    let rest = rest.trim();
    let eq = rest.find('=')?;
    if !rest[..eq].trim().eq_ignore_ascii_case("url") {
        return None;
    }
    let target = rest[eq + 1..].trim().trim_matches(|c| c == '\'' || c == '"');
    (!target.is_empty()).then_some(target)
}

/// Embedded player URL, resolved against the page URL.
fn embedded_target(html: &str, base: &Url) -> Option<Url> {
    let doc = Html::parse_document(html);
    let raw = doc
        .select(&IFRAME)
        .find_map(|el| el.value().attr("src").filter(|s| !s.trim().is_empty()))
        .or_else(|| {
            doc.select(&META)
                .filter(|el| {
                    el.value()
                        .attr("http-equiv")
                        .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
                })
                .find_map(|el| el.value().attr("content").and_then(refresh_target))
        })?;
    base.join(raw.trim()).ok()
}

#[async_trait]
impl HostHandler for Vidembed {
    fn domain(&self) -> &'static str {
        "vidembed.io"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let response = ctx.http().send(ctx.http().get(url.as_str())).await?;
        let landed = response.url().clone();

        if landed.host_str() != url.host_str() {
            debug!("Redirected to {}", landed);
            return ctx.redispatch(landed.as_str(), Some(url.as_str())).await;
        }

        let page = response.text().await?;
        let target = embedded_target(&page, &landed)
            .ok_or(ExtractError::MissingElement("embedded player"))?;
        debug!("Embedded player at {}", target);
        ctx.redispatch(target.as_str(), Some(url.as_str())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://vidembed.io/streaming.php?id=1").unwrap()
    }

    #[test]
    fn iframe_src_is_joined_to_page() {
        let html = r#"<html><body><iframe src="//gogoplay1.com/embedplus?id=MTc4"></iframe></body></html>"#;
        assert_eq!(
            embedded_target(html, &base()).unwrap().as_str(),
            "https://gogoplay1.com/embedplus?id=MTc4"
        );
    }

    #[test]
    fn meta_refresh_is_followed() {
        let html = r#"<html><head><meta http-equiv="Refresh" content="0; URL='https://dood.ws/e/abc'"></head></html>"#;
        assert_eq!(
            embedded_target(html, &base()).unwrap().as_str(),
            "https://dood.ws/e/abc"
        );
    }

    #[test]
    fn refresh_parsing() {
        assert_eq!(refresh_target("5;url=/next"), Some("/next"));
        assert_eq!(refresh_target("5"), None);
        assert_eq!(refresh_target("0; foo=bar"), None);
    }

    #[test]
    fn page_without_player_has_no_target() {
        assert!(embedded_target("<html><body>gone</body></html>", &base()).is_none());
    }
}
