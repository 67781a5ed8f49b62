//! Error types for extraction, post-processing and downloading.
//!
//! Handler-level failures ([`ExtractError`]) are always downgraded to
//! "no result" by the dispatcher. Only [`DownloadError`] values that are not
//! [recoverable](DownloadError::is_recoverable) end an episode.

use thiserror::Error;

use crate::download::progress::StallKind;

/// Failure inside a host handler or one of its collaborators.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported host: {0}")]
    Unsupported(String),

    #[error("handler requires a referer")]
    RefererRequired,

    #[error("missing page element: {0}")]
    MissingElement(&'static str),

    /// The sandbox printed `https:undefined`, meaning the evaluated player
    /// config had no source URL.
    #[error("sandbox evaluation produced an undefined source")]
    UndefinedSentinel,

    #[error("no usable response from {url}")]
    NoResponse { url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("deobfuscator error: {0}")]
    Deobfuscator(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("external tool error: {0}")]
    Tool(String),

    #[error("no playable sources")]
    NoSources,

    #[error("redirect depth limit of {0} reached")]
    RedirectDepth(usize),

    #[error("invalid chapter metadata: {0}")]
    Chapters(#[from] RemuxError),
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

/// Inconsistent handler catalogue.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("domain registered twice: {0}")]
    DuplicateDomain(String),

    #[error("alias {alias} points at unregistered domain {target}")]
    DanglingAlias { alias: String, target: String },
}

/// Failure while building chapter metadata or remuxing a finished download.
#[derive(Error, Debug)]
pub enum RemuxError {
    #[error("invalid chapter bounds: start={start} end={end}")]
    InvalidChapter { start: f64, end: f64 },

    #[error("outro starts at {outro_start} before intro ends at {intro_end}")]
    OverlappingChapters { intro_end: f64, outro_start: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("remux exited with {code:?}\ncommand: {command}\n{stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Outcome of a single source attempt, or of a whole episode.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("no handler resolved {0}")]
    NoHandler(String),

    #[error("{host} is on the forbidden CDN list")]
    ForbiddenCdn { host: String },

    #[error("{0}")]
    Stalled(StallKind),

    #[error("connection aborted")]
    ConnectionAborted,

    #[error("interrupted")]
    Interrupted,

    #[error("cancelled")]
    Cancelled,

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("downloader exited with {code:?}\ncommand: {command}\n{stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("post-download step failed: {0}")]
    AfterDownload(#[from] RemuxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to download episode {episode}")]
    AllSourcesFailed { episode: String },
}

impl DownloadError {
    /// Whether the orchestrator should move on to the next source.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoHandler(_)
                | Self::ForbiddenCdn { .. }
                | Self::Stalled(_)
                | Self::ConnectionAborted
                | Self::Interrupted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalls_and_aborts_are_recoverable() {
        assert!(DownloadError::Stalled(StallKind::SizeStalled).is_recoverable());
        assert!(DownloadError::ConnectionAborted.is_recoverable());
        assert!(DownloadError::Interrupted.is_recoverable());
        assert!(DownloadError::NoHandler("https://x.test/".into()).is_recoverable());
    }

    #[test]
    fn unexpected_exit_is_fatal_and_carries_context() {
        let err = DownloadError::Failed {
            command: "yt-dlp --output out.mp4 https://cdn.test/a.m3u8".into(),
            code: Some(1),
            stderr: "ERROR: boom".into(),
        };
        assert!(!err.is_recoverable());
        let text = err.to_string();
        assert!(text.contains("yt-dlp --output out.mp4"));
        assert!(text.contains("ERROR: boom"));
    }

    #[test]
    fn cancellation_is_not_recoverable() {
        assert!(!DownloadError::Cancelled.is_recoverable());
        assert!(!DownloadError::AllSourcesFailed { episode: "3".into() }.is_recoverable());
    }
}
