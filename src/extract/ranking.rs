//! Source ranking by handler priority.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::HostRegistry;

/// A labelled embed URL found by site scraping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSite {
    pub name: String,
    /// Sub-classification such as `sub` or `dub`.
    #[serde(rename = "type", default)]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub other: Value,
}

impl DownloadSite {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            url: url.into(),
            other: Value::Null,
        }
    }
}

/// Sort key: registration index, unknown hosts after every known one.
pub fn priority_key(registry: &HostRegistry, url: &str) -> usize {
    registry.priority(url).unwrap_or(registry.len() + 1)
}

/// Stable-sort `items` by the priority of the URL each one carries.
pub fn rank_by<T>(registry: &HostRegistry, mut items: Vec<T>, to_url: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by_cached_key(|item| priority_key(registry, to_url(item)));
    items
}

pub fn rank(registry: &HostRegistry, sites: Vec<DownloadSite>) -> Vec<DownloadSite> {
    rank_by(registry, sites, |s| s.url.as_str())
}

pub fn rank_urls(registry: &HostRegistry, urls: Vec<String>) -> Vec<String> {
    rank_by(registry, urls, String::as_str)
}

/// Secondary stable sort by the caller's type preference.
/// Types not listed go last, in their current order.
pub fn order_by_type(mut sites: Vec<DownloadSite>, order: &[String]) -> Vec<DownloadSite> {
    sites.sort_by_cached_key(|s| {
        order
            .iter()
            .position(|t| t.eq_ignore_ascii_case(&s.kind))
            .unwrap_or(usize::MAX)
    });
    sites
}
