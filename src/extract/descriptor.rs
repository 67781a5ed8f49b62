//! The result of a successful extraction.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemuxError;

/// Side effect run once the raw stream has been saved to disk.
#[async_trait]
pub trait PostProcess: Send + Sync {
    async fn after_download(
        &self,
        path: &Path,
        descriptor: &MediaDescriptor,
    ) -> Result<(), RemuxError>;
}

/// A direct media locator plus what the CDN needs to serve it.
///
/// Construct through [`MediaDescriptor::new`], which refuses an empty URL,
/// so a descriptor always points somewhere.
#[derive(Clone)]
pub struct MediaDescriptor {
    url: String,
    referer: Option<String>,
    headers: Vec<String>,
    after_download: Option<Arc<dyn PostProcess>>,
}

impl MediaDescriptor {
    /// Returns `None` for a blank URL.
    pub fn new(url: impl Into<String>) -> Option<Self> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return None;
        }
        Some(Self {
            url,
            referer: None,
            headers: Vec::new(),
            after_download: None,
        })
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Extra `Name: value` header lines, kept in order.
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_after_download(mut self, hook: Arc<dyn PostProcess>) -> Self {
        self.after_download = Some(hook);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn after_download(&self) -> Option<&Arc<dyn PostProcess>> {
        self.after_download.as_ref()
    }

    /// Host of the media URL, if it parses.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Run the post-download hook, if any.
    pub async fn run_after_download(&self, path: &Path) -> Result<(), RemuxError> {
        match &self.after_download {
            Some(hook) => hook.after_download(path, self).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MediaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDescriptor")
            .field("url", &self.url)
            .field("referer", &self.referer)
            .field("headers", &self.headers)
            .field("after_download", &self.after_download.is_some())
            .finish()
    }
}
