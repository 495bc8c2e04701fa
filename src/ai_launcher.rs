//! Notifies the sibling AI service that it should connect as a client for a
//! given key. Direct port of `igo/aiserver/http_client.py`'s
//! `start_ai_player`: a GET to pick up a CSRF cookie (fetched once, shared
//! across the process), then a POST to `/start` carrying the player key and
//! AI secret.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Result, ServerError};

const AI_SLEEP: std::time::Duration = std::time::Duration::from_secs(2);

#[derive(Clone)]
pub struct AiLauncher {
    client: reqwest::Client,
    base_url: String,
    csrf: Arc<Mutex<Option<String>>>,
}

impl AiLauncher {
    pub fn new(base_url: String) -> Self {
        AiLauncher {
            client: reqwest::Client::new(),
            base_url,
            csrf: Arc::new(Mutex::new(None)),
        }
    }

    async fn csrf_token(&self) -> Result<String> {
        let mut guard = self.csrf.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .client
            .get(format!("{}/start", self.base_url))
            .send()
            .await
            .map_err(|e| ServerError::StartAi(e.to_string()))?;

        let token = response
            .cookies()
            .find(|c| c.name() == "_xsrf")
            .map(|c| c.value().to_string())
            .ok_or_else(|| ServerError::StartAi("AI server did not set a _xsrf cookie".into()))?;

        *guard = Some(token.clone());
        Ok(token)
    }

    /// Tells the AI service to connect and play `player_key`/`ai_secret`.
    /// Retries forever with `AI_SLEEP` backoff unless `just_once`, in which
    /// case a single failure is returned to the caller.
    pub async fn start(&self, player_key: &str, ai_secret: &str, just_once: bool) -> Result<()> {
        loop {
            match self.try_start(player_key, ai_secret).await {
                Ok(()) => {
                    tracing::info!(player_key, "successfully contracted the AI server");
                    return Ok(());
                }
                Err(e) if just_once => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, player_key, "failed to contact the AI server, retrying");
                    tokio::time::sleep(AI_SLEEP).await;
                }
            }
        }
    }

    async fn try_start(&self, player_key: &str, ai_secret: &str) -> Result<()> {
        let csrf = self.csrf_token().await?;
        // Tornado's XSRF check requires both the cookie and a matching
        // header on the same request; resend the cookie explicitly rather
        // than relying on an automatic cookie jar.
        self.client
            .post(format!("{}/start", self.base_url))
            .header("X-XSRFToken", &csrf)
            .header("Cookie", format!("_xsrf={csrf}"))
            .query(&[("player_key", player_key), ("ai_secret", ai_secret)])
            .send()
            .await
            .map_err(|e| ServerError::StartAi(e.to_string()))?
            .error_for_status()
            .map_err(|e| ServerError::StartAi(e.to_string()))?;
        Ok(())
    }
}
