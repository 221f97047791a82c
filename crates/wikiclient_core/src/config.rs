use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::api::ProtocolVersion;
use crate::session::{DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT, HttpOptions};

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub url: Option<String>,
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub version: Option<String>,
}

impl WikiConfig {
    /// Resolve the wiki base URL: env WIKI_URL > config > derived from api_url.
    pub fn wiki_url(&self) -> Option<String> {
        if let Some(value) = env_value("WIKI_URL") {
            return Some(value);
        }
        if let Some(url) = &self.wiki.url {
            return Some(url.clone());
        }
        self.api_url().and_then(|api| derive_wiki_url(&api))
    }

    /// Resolve the API URL: env WIKI_API_URL > config.
    pub fn api_url(&self) -> Option<String> {
        env_value("WIKI_API_URL").or_else(|| self.wiki.api_url.clone())
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > default.
    pub fn user_agent(&self) -> String {
        env_value("WIKI_USER_AGENT")
            .or_else(|| self.wiki.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Resolve the protocol generation: env WIKI_MEDIAWIKI_VERSION > config,
    /// defaulting to the modern dialect.
    pub fn protocol_version(&self) -> Result<ProtocolVersion> {
        let Some(raw) = env_value("WIKI_MEDIAWIKI_VERSION").or_else(|| self.wiki.version.clone())
        else {
            return Ok(ProtocolVersion::Modern);
        };
        raw.parse::<ProtocolVersion>().map_err(|message| anyhow!(message))
    }

    /// HTTP transport options resolved from env and config.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent(),
            timeout_ms: env_value("WIKI_HTTP_TIMEOUT_MS")
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Load and parse a WikiConfig from a TOML file. Returns default if the file
/// doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    if !config_path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: WikiConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Derive the wiki base URL from an API URL by stripping `/api.php`.
pub fn derive_wiki_url(api_url: &str) -> Option<String> {
    let trimmed = api_url.trim();
    let stripped = trimmed.strip_suffix("/api.php").unwrap_or(trimmed);
    let base = stripped.trim_end_matches('/');
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}
