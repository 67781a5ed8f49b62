//! Shared collaborators handed to every host handler.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::deobfuscator::PlayerDeobfuscator;
use crate::error::Result;
use crate::http_client::HostClient;
use crate::sandbox::{CodeRunner, PistonRunner};

/// HTTP client, sandbox, deobfuscator and config, built once per process.
pub struct Services {
    http: HostClient,
    sandbox: Arc<dyn CodeRunner>,
    deobfuscator: PlayerDeobfuscator,
    config: Config,
}

impl Services {
    pub fn new(
        http: HostClient,
        sandbox: Arc<dyn CodeRunner>,
        deobfuscator: PlayerDeobfuscator,
        config: Config,
    ) -> Self {
        Self {
            http,
            sandbox,
            deobfuscator,
            config,
        }
    }

    /// Wire up the production collaborators from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let http = HostClient::new(config.retry.clone())?;
        let sandbox = Arc::new(PistonRunner::new(
            http.inner().clone(),
            config.endpoints.sandbox.clone(),
        ));
        let deobfuscator =
            PlayerDeobfuscator::new(http.inner().clone(), &config.endpoints.deobfuscator)?;
        Ok(Self::new(http, sandbox, deobfuscator, config))
    }

    /// Same as [`from_config`](Self::from_config) with a caller-supplied sandbox.
    pub fn with_sandbox(config: Config, sandbox: Arc<dyn CodeRunner>) -> Result<Self> {
        let http = HostClient::new(config.retry.clone())?;
        let deobfuscator =
            PlayerDeobfuscator::new(http.inner().clone(), &config.endpoints.deobfuscator)?;
        Ok(Self::new(http, sandbox, deobfuscator, config))
    }

    pub fn http(&self) -> &HostClient {
        &self.http
    }

    pub fn sandbox(&self) -> &dyn CodeRunner {
        self.sandbox.as_ref()
    }

    pub fn deobfuscator(&self) -> &PlayerDeobfuscator {
        &self.deobfuscator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ffmpeg(&self) -> PathBuf {
        self.config.tools.ffmpeg()
    }

    pub fn ytdlp(&self) -> PathBuf {
        self.config.tools.ytdlp()
    }
}
