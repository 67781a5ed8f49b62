//! gogoplay1.com and its many mirrors.
//!
//! The embed page carries three keys in class names and an encrypted
//! episode token. The token decrypts to `id&params`; the id is
//! re-encrypted and sent to `encrypt-ajax.php`, whose `data` field
//! decrypts (with the second key) to the source list.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{origin, parse_quality};
use crate::crypto::{decrypt_base64, encrypt_base64};
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractContext, HostHandler, MediaDescriptor};
use crate::http_client::xhr_headers;

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div[class]").expect("static selector"));
static EPISODE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[data-name="episode"]"#).expect("static selector"));

pub struct Gogoplay;

/// Crypto material scraped from the embed page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageKeys {
    key: String,
    iv: String,
    response_key: String,
    token: String,
}

fn class_list<'a>(el: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    el.value().attr("class").unwrap_or_default().split_whitespace()
}

/// Suffix of the first `prefix-XXX` class on any `div`.
fn div_class_suffix(doc: &Html, prefix: &str, needs_wrapper: bool) -> Option<String> {
    doc.select(&DIV)
        .filter(|el| !needs_wrapper || class_list(*el).any(|c| c == "wrapper"))
        .find_map(|el| {
            class_list(el)
                .find_map(|c| c.strip_prefix(prefix))
                .map(str::to_string)
        })
}

fn parse_page(html: &str) -> Result<PageKeys> {
    let doc = Html::parse_document(html);

    let key = doc
        .select(&BODY)
        .next()
        .and_then(|body| class_list(body).next())
        .and_then(|c| c.split('-').nth(1))
        .ok_or(ExtractError::MissingElement("body key class"))?
        .to_string();
    let iv = div_class_suffix(&doc, "container-", true)
        .ok_or(ExtractError::MissingElement("div.wrapper.container-*"))?;
    let response_key = div_class_suffix(&doc, "videocontent-", false)
        .ok_or(ExtractError::MissingElement("div.videocontent-*"))?;
    let token = doc
        .select(&EPISODE)
        .next()
        .and_then(|el| el.value().attr("data-value"))
        .ok_or(ExtractError::MissingElement("script[data-name=episode]"))?
        .to_string();

    Ok(PageKeys {
        key,
        iv,
        response_key,
        token,
    })
}

/// Path and query of the ajax call the player would make.
fn ajax_path(keys: &PageKeys) -> Result<String> {
    let plain = decrypt_base64(&keys.key, &keys.iv, &keys.token)?;
    let (id, rest) = match plain.find('&') {
        Some(i) => plain.split_at(i),
        None => (plain.as_str(), ""),
    };
    let encrypted = encrypt_base64(&keys.key, &keys.iv, id)?;
    Ok(format!(
        "/encrypt-ajax.php?id={}{}&alias={}",
        urlencoding::encode(&encrypted),
        rest,
        id
    ))
}

#[derive(Debug, Deserialize)]
struct AjaxResponse {
    data: String,
}

#[derive(Debug, Deserialize)]
struct SourceList {
    #[serde(default)]
    source: Vec<Source>,
}

#[derive(Debug, Deserialize)]
struct Source {
    file: String,
    #[serde(default)]
    label: String,
}

/// Highest-quality `NNN P` source. Labels not ending in `P` (such as
/// `auto`) are skipped; unparsable numbers rank as zero.
fn best_source(decrypted: &str) -> Result<String> {
    let list: SourceList = serde_json::from_str(decrypted)?;
    list.source
        .into_iter()
        .filter(|s| s.label.trim_end().ends_with('P'))
        .max_by_key(|s| parse_quality(&s.label).unwrap_or(0))
        .map(|s| s.file)
        .ok_or(ExtractError::NoSources)
}

#[async_trait]
impl HostHandler for Gogoplay {
    fn domain(&self) -> &'static str {
        "gogoplay1.com"
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        if !matches!(url.path(), "/embedplus" | "/streaming.php") {
            return Err(ExtractError::Unsupported(url.path().to_string()));
        }

        let page = ctx.http().fetch_text(url.as_str(), None).await?;
        let keys = parse_page(&page)?;
        let api = format!("{}{}", origin(url), ajax_path(&keys)?);
        debug!("Source api: {}", api);

        let request = ctx.http().get(&api).headers(xhr_headers(url.as_str()));
        let response: AjaxResponse = ctx.http().fetch_json(request).await?;
        let decrypted = decrypt_base64(&keys.response_key, &keys.iv, &response.data)?;

        MediaDescriptor::new(best_source(&decrypted)?)
            .map(|d| d.with_referer(url.as_str()))
            .ok_or(ExtractError::NoSources)
    }
}
