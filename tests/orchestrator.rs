//! Source selection loop with a fake downloader.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use embed_dl::download::{DownloadBackend, Orchestrator, StallKind};
use embed_dl::error::{DownloadError, RemuxError, Result};
use embed_dl::extract::{
    Dispatcher, DownloadSite, ExtractContext, HostHandler, HostRegistry, MediaDescriptor,
    PostProcess, Services,
};
use embed_dl::sandbox::{CodeRunner, SourceFile};
use embed_dl::Config;

struct NoSandbox;

#[async_trait]
impl CodeRunner for NoSandbox {
    async fn run_js(&self, _code: &str, _files: &[SourceFile]) -> Result<String> {
        Ok(String::new())
    }
}

struct FailingHook;

#[async_trait]
impl PostProcess for FailingHook {
    async fn after_download(
        &self,
        path: &Path,
        _descriptor: &MediaDescriptor,
    ) -> std::result::Result<(), RemuxError> {
        Err(RemuxError::Failed {
            command: format!("ffmpeg -i {}", path.display()),
            code: Some(1),
            stderr: "Invalid data found when processing input".into(),
        })
    }
}

/// Resolves every URL on its domain to `https://<media_host>/<path>`.
struct Fixed {
    domain: &'static str,
    media_host: &'static str,
    hook: bool,
}

#[async_trait]
impl HostHandler for Fixed {
    fn domain(&self) -> &'static str {
        self.domain
    }

    async fn resolve(
        &self,
        url: &Url,
        _referer: Option<&str>,
        _ctx: &ExtractContext<'_>,
    ) -> Result<MediaDescriptor> {
        let media = MediaDescriptor::new(format!("https://{}{}", self.media_host, url.path())).unwrap();
        Ok(if self.hook {
            media.with_after_download(Arc::new(FailingHook))
        } else {
            media
        })
    }
}

enum Outcome {
    Ok,
    Stall,
    Abort,
    Crash,
    Hang,
}

/// Downloader that records every URL and answers by media host.
struct FakeBackend {
    calls: Mutex<Vec<String>>,
    outcome: fn(&str) -> Outcome,
}

impl FakeBackend {
    fn new(outcome: fn(&str) -> Outcome) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            outcome,
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadBackend for FakeBackend {
    async fn download(
        &self,
        descriptor: &MediaDescriptor,
        _output: &Path,
    ) -> std::result::Result<(), DownloadError> {
        self.calls.lock().unwrap().push(descriptor.url().to_string());
        match (self.outcome)(descriptor.url()) {
            Outcome::Ok => Ok(()),
            Outcome::Stall => Err(DownloadError::Stalled(StallKind::SizeStalled)),
            Outcome::Abort => Err(DownloadError::ConnectionAborted),
            Outcome::Crash => Err(DownloadError::Failed {
                command: "yt-dlp".into(),
                code: Some(1),
                stderr: "ERROR: unsupported".into(),
            }),
            Outcome::Hang => {
                futures::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

fn all_ok(_: &str) -> Outcome {
    Outcome::Ok
}

fn dispatcher() -> Arc<Dispatcher> {
    let registry = HostRegistry::builder()
        .handler(Fixed { domain: "a.test", media_host: "cdn-bad.test", hook: false })
        .handler(Fixed { domain: "b.test", media_host: "cdn-good.test", hook: false })
        .handler(Fixed { domain: "c.test", media_host: "cdn-other.test", hook: false })
        .handler(Fixed { domain: "hook.test", media_host: "cdn-good.test", hook: true })
        .build()
        .unwrap();
    let services = Services::with_sandbox(Config::default(), Arc::new(NoSandbox)).unwrap();
    Arc::new(Dispatcher::new(Arc::new(registry), Arc::new(services)))
}

fn site(name: &str, url: &str) -> DownloadSite {
    DownloadSite::new(name, "sub", url)
}

#[tokio::test]
async fn forbidden_cdn_is_skipped_without_downloading() {
    let backend = FakeBackend::new(all_ok);
    let orchestrator = Orchestrator::new(dispatcher(), backend.clone())
        .with_forbidden_cdns(["cdn-bad.test"]);

    let sites = [site("A", "https://a.test/e/1"), site("B", "https://b.test/e/1")];
    let winner = orchestrator
        .download_episode("7", &sites, None, Path::new("ep7.mp4"))
        .await
        .unwrap();

    assert_eq!(winner.name, "B");
    assert_eq!(backend.calls(), ["https://cdn-good.test/e/1"]);
}

#[tokio::test]
async fn unresolvable_sources_are_skipped() {
    let backend = FakeBackend::new(all_ok);
    let orchestrator = Orchestrator::new(dispatcher(), backend.clone());

    let sites = [site("X", "https://nohandler.test/e/1"), site("C", "https://c.test/e/2")];
    let winner = orchestrator
        .download_episode("1", &sites, None, Path::new("ep1.mp4"))
        .await
        .unwrap();
    assert_eq!(winner.name, "C");
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn recoverable_download_errors_move_on() {
    let backend = FakeBackend::new(|url| {
        if url.contains("cdn-bad") {
            Outcome::Stall
        } else if url.contains("cdn-good") {
            Outcome::Abort
        } else {
            Outcome::Ok
        }
    });
    let orchestrator = Orchestrator::new(dispatcher(), backend.clone());

    let sites = [
        site("A", "https://a.test/e/1"),
        site("B", "https://b.test/e/1"),
        site("C", "https://c.test/e/1"),
    ];
    let winner = orchestrator
        .download_episode("2", &sites, None, Path::new("ep2.mp4"))
        .await
        .unwrap();
    assert_eq!(winner.name, "C");
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test]
async fn unexpected_failure_ends_the_episode() {
    let backend = FakeBackend::new(|_| Outcome::Crash);
    let orchestrator = Orchestrator::new(dispatcher(), backend.clone());

    let sites = [site("A", "https://a.test/e/1"), site("B", "https://b.test/e/1")];
    let err = orchestrator
        .download_episode("3", &sites, None, Path::new("ep3.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::Failed { .. }));
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn exhaustion_reports_the_episode() {
    let backend = FakeBackend::new(|_| Outcome::Abort);
    let orchestrator = Orchestrator::new(dispatcher(), backend);

    let sites = [site("A", "https://a.test/e/1")];
    let err = orchestrator
        .download_episode("12", &sites, None, Path::new("ep12.mp4"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to download episode 12");
}

#[tokio::test]
async fn post_processing_failure_is_not_swallowed() {
    let backend = FakeBackend::new(all_ok);
    let orchestrator = Orchestrator::new(dispatcher(), backend.clone());

    let sites = [site("H", "https://hook.test/e/1"), site("C", "https://c.test/e/1")];
    let err = orchestrator
        .download_episode("4", &sites, None, Path::new("ep4.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::AfterDownload(_)));
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn interrupt_abandons_only_the_current_source() {
    let backend = FakeBackend::new(|url| {
        if url.contains("cdn-bad") {
            Outcome::Hang
        } else {
            Outcome::Ok
        }
    });
    let orchestrator = Orchestrator::new(dispatcher(), backend.clone());
    let interrupt = orchestrator.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        interrupt.notify_one();
    });

    let sites = [site("A", "https://a.test/e/1"), site("B", "https://b.test/e/1")];
    let winner = orchestrator
        .download_episode("5", &sites, None, Path::new("ep5.mp4"))
        .await
        .unwrap();
    assert_eq!(winner.name, "B");
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test]
async fn shutdown_ends_the_run() {
    let backend = FakeBackend::new(|_| Outcome::Hang);
    let orchestrator = Orchestrator::new(dispatcher(), backend.clone());
    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
    });

    let sites = [site("A", "https://a.test/e/1"), site("B", "https://b.test/e/1")];
    let err = orchestrator
        .download_episode("6", &sites, None, Path::new("ep6.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::Cancelled));
    assert_eq!(backend.calls().len(), 1);
}
