//! The handler catalogue.
//!
//! Registration order below is the preference order for ranking: hosts
//! that historically give the best quality and fail least come first.

pub mod api_web;
pub mod dood;
pub mod fembed;
pub mod filemoon;
pub mod gogoplay;
pub mod megacloud;
pub mod mixdrop;
pub mod mp4upload;
pub mod rabbitstream;
pub mod rapid_cloud;
pub mod sbplay;
mod sources_api;
pub mod streamani;
pub mod streamtape;
pub mod tool;
pub mod vidembed;
pub mod vidoza;
pub mod watchsb;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use super::handler::ExtractContext;
use super::registry::{HostRegistry, RegistryBuilder};
use crate::error::{ExtractError, RegistryError, Result};

/// Mirror hostnames and the domain they are served by.
pub const ALIASES: &[(&str, &str)] = &[
    ("gogo-stream.com", "gogoplay1.com"),
    ("goload.io", "gogoplay1.com"),
    ("goload.one", "gogoplay1.com"),
    ("gogoplay.io", "gogoplay1.com"),
    ("gogoplay4.com", "gogoplay1.com"),
    ("gogoplay5.com", "gogoplay1.com"),
    ("goload.pro", "gogoplay1.com"),
    ("gogohd.net", "gogoplay1.com"),
    ("sbplay1.com", "sbplay.one"),
    ("sbplay2.com", "sbplay.one"),
    ("sbplay2.xyz", "sbplay.one"),
    ("dood.la", "dood.ws"),
    ("dood.wf", "dood.ws"),
    ("streamtape.com", "streamtape.net"),
    ("streamsss.net", "watchsb.com"),
    ("fembed9hd.com", "fembed-hd.com"),
    ("filemoon.to", "filemoon.sx"),
    ("vidoza.co", "vidoza.net"),
    ("rapid-cloud.ru", "rapid-cloud.co"),
];

/// Every built-in handler, in priority order.
pub fn default_builder() -> RegistryBuilder {
    let mut builder = HostRegistry::builder()
        .handler(rapid_cloud::RapidCloud)
        .handler(gogoplay::Gogoplay)
        .handler(watchsb::Watchsb)
        .handler(fembed::FembedApi::new("fembed-hd.com"))
        .handler(dood::Dood)
        .handler(tool::YtDlpUrl::new("ani.googledrive.stream"))
        .handler(streamani::Streamani)
        .handler(sbplay::Sbplay)
        .handler(mp4upload::Mp4upload)
        .handler(fembed::FembedApi::new("embedsito.com"))
        .handler(mixdrop::Mixdrop)
        .handler(api_web::ApiWeb)
        .handler(streamtape::Streamtape)
        .handler(megacloud::Megacloud)
        .handler(rabbitstream::Rabbitstream)
        .handler(filemoon::Filemoon)
        .handler(vidoza::Vidoza)
        .handler(vidembed::Vidembed)
        .handler(tool::YtDlpUrl::new("ok.ru"));

    for (mirror, canonical) in ALIASES {
        builder = builder.alias(*mirror, *canonical);
    }
    builder
}

pub fn default_registry() -> Result<HostRegistry, RegistryError> {
    default_builder().build()
}

// ─── Shared parsing helpers ─────────────────────────────────────────────────

pub(crate) static SCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("script").expect("static selector"));

/// `scheme://host[:port]` of `url`.
pub(crate) fn origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Last non-empty path segment, e.g. the file id in `/e/abc123`.
pub(crate) fn last_path_segment(url: &Url) -> Option<&str> {
    url.path_segments()?.rev().find(|s| !s.is_empty())
}

/// Text of the first inline `<script>` containing `needle`.
pub(crate) fn find_script(html: &str, needle: &str) -> Option<String> {
    Html::parse_document(html)
        .select(&SCRIPT)
        .map(|el| el.text().collect::<String>())
        .find(|text| text.contains(needle))
        .map(|text| text.trim().to_string())
}

/// Numeric prefix of a quality label: `1080P`, `1080 P`, `720p` -> 1080/720.
pub(crate) fn parse_quality(label: &str) -> Option<u32> {
    let digits: String = label
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Reject sandbox output that signals a failed evaluation.
///
/// A player config without a source prints `undefined`, which after the
/// scheme prefix becomes `https:undefined`.
pub(crate) fn check_sandbox_output(output: &str) -> Result<&str> {
    let output = output.trim();
    match output {
        "" | "undefined" | "null" | "https:undefined" | "https:null" => {
            Err(ExtractError::UndefinedSentinel)
        }
        _ => Ok(output),
    }
}

/// Marker of Dean Edwards' packer, used by several players.
pub(crate) const PACKER: &str = "function(p,a,c,k,e,d)";

/// The packed expression with its leading `eval` removed, so evaluating
/// it yields the unpacked source instead of running it.
pub(crate) fn packed_expression(script: &str) -> &str {
    let script = script.trim();
    script.strip_prefix("eval").unwrap_or(script)
}

/// Unpack the first packed `<script>` on `html` in the sandbox.
pub(crate) async fn unpack(ctx: &ExtractContext<'_>, html: &str) -> Result<String> {
    let script = find_script(html, PACKER).ok_or(ExtractError::MissingElement("packed script"))?;
    let payload = format!(
        "const fn = {}\nconsole.log(fn.toString());",
        packed_expression(&script)
    );
    ctx.services().sandbox().run_js(&payload, &[]).await
}

/// Escape a string as a JavaScript literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_order_and_aliases() {
        let reg = default_registry().unwrap();
        let domains: Vec<_> = reg.domains().collect();
        assert_eq!(domains[0], "rapid-cloud.co");
        assert_eq!(domains[1], "gogoplay1.com");
        assert_eq!(domains[12], "streamtape.net");
        assert_eq!(domains.len(), 19);
        assert_eq!(reg.canonical_domain("goload.pro"), "gogoplay1.com");
        assert_eq!(reg.canonical_domain("dood.wf"), "dood.ws");
        assert_eq!(reg.aliases().len(), ALIASES.len());
    }

    #[test]
    fn every_alias_targets_a_registered_domain() {
        let reg = default_registry().unwrap();
        for (mirror, canonical) in ALIASES {
            assert_eq!(
                reg.priority(&format!("https://{mirror}/x")),
                reg.priority(&format!("https://{canonical}/x"))
            );
        }
    }

    #[test]
    fn quality_labels() {
        assert_eq!(parse_quality("1080P"), Some(1080));
        assert_eq!(parse_quality("1080 P"), Some(1080));
        assert_eq!(parse_quality(" 720p"), Some(720));
        assert_eq!(parse_quality("auto"), None);
    }

    #[test]
    fn sandbox_sentinels() {
        assert!(matches!(
            check_sandbox_output("https:undefined\n"),
            Err(ExtractError::UndefinedSentinel)
        ));
        assert!(check_sandbox_output("").is_err());
        assert_eq!(
            check_sandbox_output(" https://cdn.test/v.mp4 ").unwrap(),
            "https://cdn.test/v.mp4"
        );
    }

    #[test]
    fn script_lookup_and_url_parts() {
        let html = "<html><body><script>var a = 1;</script><script> MDCore.ref = 'x'; </script></body></html>";
        assert_eq!(find_script(html, "MDCore.ref").as_deref(), Some("MDCore.ref = 'x';"));
        assert_eq!(find_script(html, "nothing"), None);

        let url = Url::parse("https://host.test:8443/e/abc123/").unwrap();
        assert_eq!(origin(&url), "https://host.test:8443");
        assert_eq!(last_path_segment(&url), Some("abc123"));
    }

    #[test]
    fn packed_expression_drops_eval() {
        assert_eq!(
            packed_expression("  eval(function(p,a,c,k,e,d){return p}('x',1,1,'',0,{}))\n"),
            "(function(p,a,c,k,e,d){return p}('x',1,1,'',0,{}))"
        );
        assert_eq!(packed_expression("(1)"), "(1)");
    }

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }
}
