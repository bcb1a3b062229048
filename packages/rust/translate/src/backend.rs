//! Translation backends.
//!
//! Each backend speaks a different request/response shape but all reduce to
//! `translate(text, source, target) -> translated text`. Backends are tried in
//! the configured order by the [`TranslationService`](crate::TranslationService).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use slugforge_shared::{BackendConfig, BackendProtocol, Result, SlugforgeError};

/// Connection details common to every backend.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub name: String,
    pub url: Url,
    pub timeout: Duration,
}

/// A configured translation backend.
#[derive(Debug, Clone)]
pub enum Backend {
    LibreTranslate(Endpoint),
    Lingva(Endpoint),
    MyMemory(Endpoint),
    FormPost(Endpoint),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct LingvaResponse {
    translation: String,
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: MyMemoryData,
    #[serde(rename = "responseStatus", default)]
    response_status: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MyMemoryData {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

impl Backend {
    /// Build a backend from its config entry.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let endpoint = Endpoint {
            name: config.name.clone(),
            url: config.endpoint_url()?,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        };

        Ok(match config.protocol {
            BackendProtocol::LibreTranslate => Self::LibreTranslate(endpoint),
            BackendProtocol::Lingva => Self::Lingva(endpoint),
            BackendProtocol::MyMemory => Self::MyMemory(endpoint),
            BackendProtocol::FormPost => Self::FormPost(endpoint),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::LibreTranslate(e) | Self::Lingva(e) | Self::MyMemory(e) | Self::FormPost(e) => e,
        }
    }

    /// Human-readable backend name for tracing.
    pub fn name(&self) -> &str {
        &self.endpoint().name
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.endpoint().timeout
    }

    /// Translate `text` and return the backend's raw (unnormalized) output.
    ///
    /// Non-2xx statuses, unreadable bodies and blank translations are errors.
    pub async fn translate(
        &self,
        client: &Client,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String> {
        debug!(backend = self.name(), text, "backend request");

        let translated = match self {
            Self::LibreTranslate(ep) => {
                let request = LibreRequest {
                    q: text,
                    source: short_lang(source),
                    target,
                    format: "text",
                };
                let response = client
                    .post(ep.url.clone())
                    .timeout(ep.timeout)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| network_error(ep, e))?;
                let body: LibreResponse = read_json(ep, response).await?;
                body.translated_text
            }
            Self::Lingva(ep) => {
                let mut url = ep.url.clone();
                url.path_segments_mut()
                    .map_err(|_| {
                        SlugforgeError::config(format!("{}: endpoint cannot be a base URL", ep.name))
                    })?
                    .pop_if_empty()
                    .push(short_lang(source))
                    .push(target)
                    .push(text);
                let response = client
                    .get(url)
                    .timeout(ep.timeout)
                    .send()
                    .await
                    .map_err(|e| network_error(ep, e))?;
                let body: LingvaResponse = read_json(ep, response).await?;
                body.translation
            }
            Self::MyMemory(ep) => {
                let langpair = format!("{source}|{target}");
                let response = client
                    .get(ep.url.clone())
                    .timeout(ep.timeout)
                    .query(&[("q", text), ("langpair", langpair.as_str())])
                    .send()
                    .await
                    .map_err(|e| network_error(ep, e))?;
                let body: MyMemoryResponse = read_json(ep, response).await?;
                if !mymemory_status_ok(&body.response_status) {
                    return Err(SlugforgeError::Translation(format!(
                        "{}: responseStatus {}",
                        ep.name, body.response_status
                    )));
                }
                // Quota notices come back as 200 with the notice as "translation".
                if body.response_data.translated_text.starts_with("MYMEMORY WARNING") {
                    return Err(SlugforgeError::Translation(format!(
                        "{}: quota exhausted",
                        ep.name
                    )));
                }
                body.response_data.translated_text
            }
            Self::FormPost(ep) => {
                let response = client
                    .post(ep.url.clone())
                    .timeout(ep.timeout)
                    .form(&[("from", short_lang(source)), ("to", target), ("text", text)])
                    .send()
                    .await
                    .map_err(|e| network_error(ep, e))?;
                let body: serde_json::Value = read_json(ep, response).await?;
                body.get("translated-text")
                    .or_else(|| body.get("translated_text"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        SlugforgeError::parse(format!("{}: no translated-text field", ep.name))
                    })?
            }
        };

        let translated = translated.trim().to_string();
        if translated.is_empty() {
            return Err(SlugforgeError::Translation(format!(
                "{}: empty translation",
                self.name()
            )));
        }
        Ok(translated)
    }
}

/// Some services only accept the bare language (`zh`), not the region tag.
fn short_lang(lang: &str) -> &str {
    lang.split(['-', '_']).next().unwrap_or(lang)
}

fn mymemory_status_ok(status: &serde_json::Value) -> bool {
    match status {
        serde_json::Value::Null => true,
        serde_json::Value::Number(n) => n.as_u64() == Some(200),
        serde_json::Value::String(s) => s == "200",
        _ => false,
    }
}

fn network_error(ep: &Endpoint, e: reqwest::Error) -> SlugforgeError {
    if e.is_timeout() {
        SlugforgeError::Network(format!("{}: timed out after {:?}", ep.name, ep.timeout))
    } else {
        SlugforgeError::Network(format!("{}: {e}", ep.name))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    ep: &Endpoint,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(SlugforgeError::Network(format!(
            "{}: HTTP {status}",
            ep.name
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| SlugforgeError::Network(format!("{}: body read failed: {e}", ep.name)))?;

    serde_json::from_str(&body).map_err(|e| {
        SlugforgeError::parse(format!(
            "{}: malformed body: {e} (got: {})",
            ep.name,
            body.chars().take(200).collect::<String>()
        ))
    })
}
