//! URL shortener API client.
//!
//! Three services are known by name (GPLinks, ShortConnect, Dalink). Any
//! other site that speaks the common `GET {site}/api?api=<token>&url=<url>`
//! protocol can be registered as a custom shortener.

use serde_json::Value;
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::ShortenerConfig;

pub const CUSTOM_NAME: &str = "Custom Shortener";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    GpLinks,
    ShortConnect,
    Dalink,
    Custom,
}

impl ServiceKind {
    /// Detection order
    pub const KNOWN: [ServiceKind; 3] = [Self::GpLinks, Self::ShortConnect, Self::Dalink];

    pub fn name(self) -> &'static str {
        match self {
            Self::GpLinks => "GPLinks",
            Self::ShortConnect => "ShortConnect",
            Self::Dalink => "Dalink",
            Self::Custom => CUSTOM_NAME,
        }
    }

    /// Unknown names are treated as custom services.
    pub fn from_name(name: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(Self::Custom)
    }

    /// Site root stored in `shortener.json`
    pub fn website(self) -> Option<&'static str> {
        match self {
            Self::GpLinks => Some("https://api.gplinks.com"),
            Self::ShortConnect => Some("https://api.shortconnect.com"),
            Self::Dalink => Some("https://dalink.in"),
            Self::Custom => None,
        }
    }

    fn default_endpoint(self) -> Option<&'static str> {
        match self {
            Self::GpLinks => Some("https://api.gplinks.com/api"),
            Self::ShortConnect => Some("https://api.shortconnect.com/shorten"),
            Self::Dalink => Some("https://dalink.in/api"),
            Self::Custom => None,
        }
    }
}

/// Endpoint of a custom service: `{website}/api`.
pub fn custom_endpoint(website: &str) -> String {
    format!("{}/api", website.trim_end_matches('/'))
}

/// Pulls the short URL out of a shortening response.
///
/// Every service must report `"status": "success"`. GPLinks and Dalink
/// answer with `shortenedUrl`, ShortConnect with `short_url`; custom
/// services may use either.
pub fn extract_short_url(kind: ServiceKind, body: &Value) -> Option<String> {
    if body.get("status").and_then(Value::as_str) != Some("success") {
        return None;
    }
    let field = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    match kind {
        ServiceKind::GpLinks | ServiceKind::Dalink => field("shortenedUrl"),
        ServiceKind::ShortConnect => field("short_url"),
        ServiceKind::Custom => field("shortenedUrl").or_else(|| field("short_url")),
    }
}

/// Whether a probe response body shows the token was accepted.
///
/// Non-JSON bodies are accepted when they mention a short URL field.
pub fn probe_accepts(body: &str) -> bool {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            json.get("status").and_then(Value::as_str) == Some("success")
                || json.get("shortenedUrl").is_some()
                || json.get("short_url").is_some()
        }
        Err(_) => body.contains("shortenedUrl") || body.contains("short_url"),
    }
}

/// What the admin typed while the bot waits for an API token:
/// `TOKEN` or `TOKEN https://site.tld`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupInput {
    pub token: String,
    pub website: Option<String>,
}

impl SetupInput {
    pub fn parse(text: &str) -> AppResult<Self> {
        let mut parts = text.split_whitespace();
        let token = parts
            .next()
            .ok_or_else(|| AppError::Validation("empty API token".to_string()))?;
        if token.chars().count() < config::shortener::MIN_TOKEN_LEN {
            return Err(AppError::Validation(format!(
                "API token must be at least {} characters",
                config::shortener::MIN_TOKEN_LEN
            )));
        }

        let website = match parts.next() {
            Some(raw) => {
                let url = Url::parse(raw)?;
                if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                    return Err(AppError::Validation(format!("not a website: {}", raw)));
                }
                Some(raw.trim_end_matches('/').to_string())
            }
            None => None,
        };

        if parts.next().is_some() {
            return Err(AppError::Validation("expected `TOKEN [website]`".to_string()));
        }

        Ok(Self {
            token: token.to_string(),
            website,
        })
    }
}

/// A service that accepted a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedService {
    pub kind: ServiceKind,
    pub website: String,
}

impl DetectedService {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn into_config(self, token: String) -> ShortenerConfig {
        ShortenerConfig {
            enabled: true,
            api_key: token,
            website: self.website,
            website_name: self.kind.name().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShortenerClient {
    http: reqwest::Client,
    gplinks: String,
    shortconnect: String,
    dalink: String,
}

impl ShortenerClient {
    pub fn new() -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config::shortener::http_timeout())
            .build()?;
        Ok(Self {
            http,
            gplinks: ServiceKind::GpLinks.default_endpoint().unwrap_or_default().to_string(),
            shortconnect: ServiceKind::ShortConnect
                .default_endpoint()
                .unwrap_or_default()
                .to_string(),
            dalink: ServiceKind::Dalink.default_endpoint().unwrap_or_default().to_string(),
        })
    }

    /// Points a known service at another endpoint.
    pub fn with_endpoint(mut self, kind: ServiceKind, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        match kind {
            ServiceKind::GpLinks => self.gplinks = endpoint,
            ServiceKind::ShortConnect => self.shortconnect = endpoint,
            ServiceKind::Dalink => self.dalink = endpoint,
            ServiceKind::Custom => {}
        }
        self
    }

    fn endpoint_for(&self, kind: ServiceKind, website: &str) -> String {
        match kind {
            ServiceKind::GpLinks => self.gplinks.clone(),
            ServiceKind::ShortConnect => self.shortconnect.clone(),
            ServiceKind::Dalink => self.dalink.clone(),
            ServiceKind::Custom => custom_endpoint(website),
        }
    }

    async fn probe(&self, endpoint: &str, token: &str) -> bool {
        let response = match self
            .http
            .get(endpoint)
            .query(&[("api", token), ("url", config::shortener::PROBE_URL)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Shortener probe {} failed: {}", endpoint, e);
                return false;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            log::debug!("Shortener probe {} returned status {}", endpoint, response.status());
            return false;
        }

        match response.text().await {
            Ok(body) => probe_accepts(&body),
            Err(e) => {
                log::debug!("Shortener probe {} body unreadable: {}", endpoint, e);
                false
            }
        }
    }

    /// Tries the known services in order; `None` when none accepts the token.
    pub async fn detect(&self, token: &str) -> Option<DetectedService> {
        for kind in ServiceKind::KNOWN {
            let endpoint = self.endpoint_for(kind, "");
            if self.probe(&endpoint, token).await {
                log::info!("Shortener token verified against {}", kind.name());
                return Some(DetectedService {
                    kind,
                    website: kind.website().unwrap_or_default().to_string(),
                });
            }
        }
        None
    }

    /// Verifies a token against a custom site's `{website}/api`.
    pub async fn verify_custom(&self, token: &str, website: &str) -> Option<DetectedService> {
        if self.probe(&custom_endpoint(website), token).await {
            Some(DetectedService {
                kind: ServiceKind::Custom,
                website: website.trim_end_matches('/').to_string(),
            })
        } else {
            None
        }
    }

    /// Resolves a setup input: a custom website is probed directly, a bare
    /// token goes through detection.
    pub async fn resolve(&self, input: &SetupInput) -> Option<DetectedService> {
        match &input.website {
            Some(website) => self.verify_custom(&input.token, website).await,
            None => self.detect(&input.token).await,
        }
    }

    pub async fn shorten(&self, shortener: &ShortenerConfig, long_url: &str) -> AppResult<String> {
        if !shortener.is_ready() {
            return Err(AppError::Shortener("shortener is not configured".to_string()));
        }

        let kind = ServiceKind::from_name(&shortener.website_name);
        if kind == ServiceKind::Custom && shortener.website.is_empty() {
            return Err(AppError::Shortener("custom shortener has no website".to_string()));
        }
        let endpoint = self.endpoint_for(kind, &shortener.website);

        let response = self
            .http
            .get(&endpoint)
            .query(&[("api", shortener.api_key.as_str()), ("url", long_url)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::HttpStatus(response.status()));
        }

        let body: Value = response.json().await?;
        extract_short_url(kind, &body).ok_or_else(|| {
            log::warn!("{} returned no short URL: {}", kind.name(), body);
            AppError::Shortener(format!("{} did not return a short URL", kind.name()))
        })
    }
}
