//! Shared utility functions for provider adapters.

use wc_domain::config::ProviderConfig;
use wc_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Read a response body, turning non-2xx statuses into [`Error::Provider`].
pub(crate) async fn read_body(provider: &str, resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let text = resp.text().await.map_err(from_reqwest)?;
    if !status.is_success() {
        return Err(Error::Provider {
            provider: provider.to_string(),
            message: format!("HTTP {} - {}", status.as_u16(), text),
        });
    }
    Ok(text)
}

/// Resolve the API key from a [`ProviderConfig`].
///
/// Precedence:
/// 1. `api_key` field (plaintext, warns)
/// 2. the environment variable named by `api_key_env`
pub fn resolve_api_key(cfg: &ProviderConfig) -> Result<String> {
    if let Some(ref key) = cfg.api_key {
        tracing::warn!(
            provider = %cfg.id,
            "API key loaded from plaintext config field 'api_key'; prefer 'api_key_env'"
        );
        return Ok(key.clone());
    }

    match std::env::var(&cfg.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::Config(format!(
            "environment variable '{}' not set or empty",
            cfg.api_key_env
        ))),
    }
}
