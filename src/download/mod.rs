//! Episode download orchestration.
//!
//! Sources are tried strictly one after another, in the order given:
//!
//! ```text
//! SELECTING_SOURCE -> FETCHING -> STREAMING -> SUCCESS
//!        ^                 |           |
//!        +---- SOURCE_FAILED <---------+        (exhausted: ALL_FAILED)
//! ```
//!
//! Recoverable failures (no handler, forbidden CDN, stall, aborted
//! connection, interrupt) move on to the next source. Anything else ends
//! the episode. An interrupt abandons only the current source; shutdown
//! ends the whole run.

pub mod progress;
pub mod remux;
pub mod ytdlp;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::DownloadError;
use crate::extract::{Dispatcher, DownloadSite, MediaDescriptor};

pub use progress::{human_byte_size, StallKind, StallThresholds};
pub use remux::{Chapter, Remuxer, SubtitleTrack};
pub use ytdlp::{DownloadBackend, YtDlpBackend};

/// Drives one episode through its candidate sources.
pub struct Orchestrator {
    dispatcher: Arc<Dispatcher>,
    backend: Arc<dyn DownloadBackend>,
    forbidden_cdns: HashSet<String>,
    shutdown: CancellationToken,
    interrupt: Arc<Notify>,
}

impl Orchestrator {
    pub fn new(dispatcher: Arc<Dispatcher>, backend: Arc<dyn DownloadBackend>) -> Self {
        Self {
            dispatcher,
            backend,
            forbidden_cdns: HashSet::new(),
            shutdown: CancellationToken::new(),
            interrupt: Arc::new(Notify::new()),
        }
    }

    /// Media hosts that are skipped without downloading.
    #[must_use]
    pub fn with_forbidden_cdns<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden_cdns
            .extend(hosts.into_iter().map(|h| h.into().to_ascii_lowercase()));
        self
    }

    /// Cancelling this token ends the run at the next await point.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// `notify_one` on this abandons the source currently being tried.
    pub fn interrupt_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.interrupt)
    }

    /// Try `sites` in order until one downloads to `output`.
    ///
    /// `referer` is the episode page, passed to handlers that need it.
    /// Returns the site that succeeded.
    pub async fn download_episode(
        &self,
        episode: &str,
        sites: &[DownloadSite],
        referer: Option<&str>,
        output: &Path,
    ) -> Result<DownloadSite, DownloadError> {
        info!("Trying to find download link...");

        for site in sites {
            if self.shutdown.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            match self.try_site(site, referer, output).await {
                Ok(()) => {
                    info!("Episode {} downloaded", episode);
                    return Ok(site.clone());
                }
                Err(DownloadError::NoHandler(url)) => {
                    debug!("No handler for {} on {}", url, site.name);
                }
                Err(DownloadError::ForbiddenCdn { host }) => {
                    info!("Skipping {}: {} is forbidden", site.name, host);
                }
                Err(e) if e.is_recoverable() => {
                    info!("Got recoverable error: {}, skipping source", e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DownloadError::AllSourcesFailed {
            episode: episode.to_string(),
        })
    }

    async fn try_site(
        &self,
        site: &DownloadSite,
        referer: Option<&str>,
        output: &Path,
    ) -> Result<(), DownloadError> {
        let resolved = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(DownloadError::Cancelled),
            () = self.interrupt.notified() => return Err(DownloadError::Interrupted),
            resolved = self.dispatcher.resolve(&site.url, referer) => resolved,
        };
        let descriptor = resolved.ok_or_else(|| DownloadError::NoHandler(site.url.clone()))?;

        self.check_cdn(&descriptor)?;
        info!("Downloading from {}: {}", site.name, descriptor.url());

        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(DownloadError::Cancelled),
            () = self.interrupt.notified() => return Err(DownloadError::Interrupted),
            result = self.backend.download(&descriptor, output) => result?,
        }

        descriptor.run_after_download(output).await?;
        Ok(())
    }

    fn check_cdn(&self, descriptor: &MediaDescriptor) -> Result<(), DownloadError> {
        match descriptor.host() {
            Some(host) if self.forbidden_cdns.contains(&host.to_ascii_lowercase()) => {
                Err(DownloadError::ForbiddenCdn { host })
            }
            _ => Ok(()),
        }
    }
}
