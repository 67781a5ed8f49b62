//! Remote code-execution sandbox client.
//!
//! Obfuscated player scripts are never run in-process. They are posted to a
//! Piston-compatible execution service and only the captured stdout comes
//! back.
//!
//! ```text
//! POST {endpoint}/execute
//! {"language": "js", "version": "18.15.0",
//!  "files": [{"content": "<code>"}, {"name": "aux.js", "content": "..."}]}
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::error::{ExtractError, Result};

/// Default public Piston endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://emkc.org/api/v2/piston";

/// Auxiliary file shipped next to the main script.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

impl SourceFile {
    pub fn named(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: content.into(),
        }
    }
}

/// Evaluates JavaScript somewhere that is not this process.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    /// Run `code` (plus auxiliary `files`) and return its stdout.
    async fn run_js(&self, code: &str, files: &[SourceFile]) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct Runtime {
    language: String,
    version: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    runtime: Option<String>,
}

impl Runtime {
    fn serves(&self, language: &str) -> bool {
        self.language == language
            || self.runtime.as_deref() == Some(language)
            || self.aliases.iter().any(|a| a == language)
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<SourceFile>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    run: Option<RunOutput>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunOutput {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    code: Option<i32>,
}

/// [`CodeRunner`] backed by a Piston execution service.
pub struct PistonRunner {
    client: Client,
    endpoint: String,
    language: String,
    version: OnceCell<String>,
}

impl PistonRunner {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            language: "js".to_string(),
            version: OnceCell::new(),
        }
    }

    /// Pin the runtime version instead of asking the service.
    #[must_use]
    pub fn with_version(self, version: impl Into<String>) -> Self {
        let version = OnceCell::new_with(Some(version.into()));
        Self { version, ..self }
    }

    async fn runtime_version(&self) -> Result<&str> {
        let version = self
            .version
            .get_or_try_init(|| async {
                let url = format!("{}/runtimes", self.endpoint);
                let runtimes: Vec<Runtime> = self
                    .client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                runtimes
                    .into_iter()
                    .find(|r| r.serves(&self.language))
                    .map(|r| r.version)
                    .ok_or_else(|| {
                        ExtractError::Sandbox(format!("no runtime for {}", self.language))
                    })
            })
            .await?;
        Ok(version.as_str())
    }
}

#[async_trait]
impl CodeRunner for PistonRunner {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, bytes = code.len()))]
    async fn run_js(&self, code: &str, files: &[SourceFile]) -> Result<String> {
        let version = self.runtime_version().await?;

        let mut all_files = Vec::with_capacity(files.len() + 1);
        all_files.push(SourceFile {
            name: None,
            content: code.to_string(),
        });
        all_files.extend_from_slice(files);

        let body = ExecuteRequest {
            language: &self.language,
            version,
            files: all_files,
        };

        let response: ExecuteResponse = self
            .client
            .post(format!("{}/execute", self.endpoint))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let Some(run) = response.run else {
            return Err(ExtractError::Sandbox(
                response
                    .message
                    .unwrap_or_else(|| "response has no run section".to_string()),
            ));
        };

        if !run.stderr.is_empty() {
            debug!(code = ?run.code, stderr = %run.stderr, "Sandbox wrote to stderr");
        }
        Ok(run.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_matches_by_alias() {
        let rt: Runtime = serde_json::from_str(
            r#"{"language":"javascript","version":"18.15.0","aliases":["node-js","js"],"runtime":"node"}"#,
        )
        .unwrap();
        assert!(rt.serves("js"));
        assert!(rt.serves("node"));
        assert!(!rt.serves("python"));
    }

    #[test]
    fn main_file_has_no_name() {
        let files = vec![
            SourceFile {
                name: None,
                content: "1".into(),
            },
            SourceFile::named("crypto-js.js", "2"),
        ];
        let json = serde_json::to_value(ExecuteRequest {
            language: "js",
            version: "1",
            files,
        })
        .unwrap();
        assert!(json["files"][0].get("name").is_none());
        assert_eq!(json["files"][1]["name"], "crypto-js.js");
    }
}
