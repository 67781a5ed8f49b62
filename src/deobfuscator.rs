//! Client for the player deobfuscation service.
//!
//! Some hosts rotate their player-script obfuscation too often to track in
//! this crate. The service holds that logic: given the player script URL it
//! returns the current key, or given URL plus ciphertext it returns the
//! decrypted payload.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ExtractError, Result};

/// Default public endpoint, overridable via
/// `DOWNLOADERS_PLAYER_DEOBFUSCATOR_ENDPOINT`.
pub const DEFAULT_ENDPOINT: &str = "https://player-deobfuscator.fxk.ch";

#[derive(Debug, Serialize)]
struct KeyRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct DecryptRequest<'a> {
    url: &'a str,
    data: &'a str,
}

pub struct PlayerDeobfuscator {
    client: Client,
    endpoint: Url,
}

impl PlayerDeobfuscator {
    pub fn new(client: Client, endpoint: &str) -> Result<Self> {
        // A trailing slash makes relative joins append instead of replace.
        let endpoint = if endpoint.ends_with('/') {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("{endpoint}/"))?
        };
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST `payload` to `path` relative to the endpoint.
    async fn call<P: Serialize + ?Sized>(&self, path: &str, payload: &P) -> Result<Value> {
        let url = self.endpoint.join(path)?;
        let response = self.client.post(url.clone()).json(payload).send().await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ExtractError::Deobfuscator(format!("{url} returned {status}")));
        }

        let value: Value = response.json().await?;
        if let Some(message) = value.get("message") {
            let message = message.as_str().map_or_else(|| message.to_string(), str::to_string);
            return Err(ExtractError::Deobfuscator(message));
        }
        debug!(%url, %status, "Deobfuscator answered");
        Ok(value)
    }

    /// Recover the current decryption key for a player script.
    #[instrument(skip(self))]
    pub async fn recover_key(&self, player_url: &str) -> Result<String> {
        let value = self.call("key", &KeyRequest { url: player_url }).await?;
        value
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExtractError::Deobfuscator("response has no key".into()))
    }

    /// Decrypt `ciphertext` produced by the given player script.
    #[instrument(skip(self, ciphertext))]
    pub async fn decrypt(&self, player_url: &str, ciphertext: &str) -> Result<Value> {
        let mut value = self
            .call(
                "decrypt",
                &DecryptRequest {
                    url: player_url,
                    data: ciphertext,
                },
            )
            .await?;
        match value.get_mut("data").map(Value::take) {
            Some(Value::Null) | None => {
                Err(ExtractError::Deobfuscator("response has no data".into()))
            }
            Some(data) => Ok(data),
        }
    }
}

impl std::fmt::Debug for PlayerDeobfuscator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerDeobfuscator")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_gets_trailing_slash() {
        let d = PlayerDeobfuscator::new(Client::new(), "https://deob.test/api").unwrap();
        assert_eq!(d.endpoint().join("key").unwrap().as_str(), "https://deob.test/api/key");
    }

    #[test]
    fn endpoint_with_slash_is_kept() {
        let d = PlayerDeobfuscator::new(Client::new(), "https://deob.test/").unwrap();
        assert_eq!(d.endpoint().join("decrypt").unwrap().as_str(), "https://deob.test/decrypt");
    }
}
