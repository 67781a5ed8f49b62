use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use embed_dl::{
    order_by_type, rank, Config, DownloadError, DownloadSite, Orchestrator, YtDlpBackend,
};

use super::dispatcher;

/// Exit code when a termination signal ended the run.
const EXIT_CANCELLED: u8 = 2;

pub struct DownloadArgs {
    pub episode: String,
    pub output: PathBuf,
    pub sites: Vec<String>,
    pub sites_file: Option<PathBuf>,
    pub referer: Option<String>,
    pub type_order: Vec<String>,
    pub forbid_cdn: Vec<String>,
    pub dump_download_sites: bool,
}

/// A bare `--site` URL, labelled by its host.
fn site_from_url(url: &str) -> DownloadSite {
    let name = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string());
    DownloadSite::new(name, "", url)
}

fn collect_sites(args: &DownloadArgs) -> Result<Vec<DownloadSite>> {
    let mut sites: Vec<DownloadSite> = args.sites.iter().map(|u| site_from_url(u)).collect();
    if let Some(path) = &args.sites_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let listed: Vec<DownloadSite> = serde_json::from_str(&content)
            .with_context(|| format!("invalid site list in {}", path.display()))?;
        sites.extend(listed);
    }
    Ok(sites)
}

/// Ctrl-C skips the current source; SIGTERM, SIGHUP and SIGQUIT end the run.
fn install_signal_handlers(interrupt: Arc<Notify>, shutdown: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, skipping current source");
            interrupt.notify_one();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())?;
        let mut hup = signal(SignalKind::hangup())?;
        let mut quit = signal(SignalKind::quit())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = term.recv() => debug!("SIGTERM"),
                _ = hup.recv() => debug!("SIGHUP"),
                _ = quit.recv() => debug!("SIGQUIT"),
            }
            shutdown.cancel();
        });
    }
    #[cfg(not(unix))]
    drop(shutdown);

    Ok(())
}

pub async fn cmd_download(args: DownloadArgs) -> Result<ExitCode> {
    let mut config = Config::load()?;
    config
        .download
        .forbidden_cdns
        .extend(args.forbid_cdn.iter().cloned());

    let dispatcher = Arc::new(dispatcher(config.clone())?);
    let sites = collect_sites(&args)?;
    let ranked = order_by_type(rank(dispatcher.registry(), sites), &args.type_order);

    if args.dump_download_sites {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(ExitCode::SUCCESS);
    }
    if ranked.is_empty() {
        anyhow::bail!("no candidate sources; pass --site or --sites-file");
    }

    let backend = Arc::new(YtDlpBackend::new(
        config.tools.ytdlp(),
        config.download.stall.clone(),
    ));
    let orchestrator = Orchestrator::new(dispatcher, backend)
        .with_forbidden_cdns(config.download.forbidden_cdns.iter().cloned());
    install_signal_handlers(orchestrator.interrupt_handle(), orchestrator.shutdown_token())?;

    match orchestrator
        .download_episode(&args.episode, &ranked, args.referer.as_deref(), &args.output)
        .await
    {
        Ok(site) => {
            eprintln!("✅ Episode {} downloaded from {}", args.episode, site.name);
            Ok(ExitCode::SUCCESS)
        }
        Err(DownloadError::Cancelled) => {
            eprintln!("🛑 Cancelled");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(e @ DownloadError::AllSourcesFailed { .. }) => {
            eprintln!("❌ {e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
