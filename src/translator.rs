//! Translation collaborator contract and HTTP adapter.
//!
//! Translation failure is never fatal: callers substitute source-language
//! text and keep going, so this module only reports errors, it does not
//! retry.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::TranslatorConfig;
use crate::lexicon::primary_subtag;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("translation backend unreachable: {0}")]
    Unreachable(String),
    #[error("translation backend returned status {0}")]
    Status(u16),
    #[error("translation backend returned an empty result")]
    EmptyResult,
    #[error("translation is disabled")]
    Disabled,
}

/// External translation service: `translate(text, source, target)`.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError>;
}

/// Adapter for a LibreTranslate-style JSON endpoint.
pub struct HttpTranslator {
    config: TranslatorConfig,
    client: Client,
}

impl HttpTranslator {
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TranslateError::Unreachable(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        if !self.config.enabled {
            return Err(TranslateError::Disabled);
        }

        let body = json!({
            "q": text,
            "source": primary_subtag(source),
            "target": primary_subtag(target),
            "format": "text",
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    warn!("Cannot connect to translator at {}", self.config.endpoint);
                } else if e.is_timeout() {
                    warn!("Translator request timed out");
                }
                TranslateError::Unreachable(e.to_string())
            })?;

        if !resp.status().is_success() {
            return Err(TranslateError::Status(resp.status().as_u16()));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TranslateError::Unreachable(e.to_string()))?;

        let translated = data["translatedText"].as_str().unwrap_or("").trim();
        if translated.is_empty() {
            return Err(TranslateError::EmptyResult);
        }

        debug!(
            "Translated {} chars {source}→{target}",
            text.chars().count()
        );
        Ok(translated.to_string())
    }
}
