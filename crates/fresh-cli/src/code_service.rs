//! Client for a remote code-to-URI lookup service.
//!
//! The service authenticates with an OAuth2 client-credentials token and
//! answers `GET <lookup_url>?searchText=<code>` with a JSON body carrying a
//! `foundationURI`. Every request is bounded by the configured timeout; a
//! timeout or transport failure is an error, an unsuccessful status or an
//! answer without URI means "no match".

use std::collections::HashMap;
use std::env;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::CodeServiceConfig;

const GRANT_TYPE: &str = "client_credentials";

/// Resolves classification codes to URIs.
pub trait CodeResolver {
    /// URI for `code`, or `None` when the service has no match.
    fn resolve(&self, code: &str) -> Result<Option<String>>;
}

/// Connection settings for [`HttpCodeResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub token_endpoint: String,
    pub lookup_url: String,
    pub scope: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
}

impl ServiceSettings {
    /// Settings from a step's service table, with credentials taken from
    /// the environment.
    pub fn from_config(config: &CodeServiceConfig) -> Result<Self> {
        let read = |name: &str| {
            env::var(name).with_context(|| format!("environment variable {name} is not set"))
        };
        Ok(Self {
            token_endpoint: config.token_endpoint.clone(),
            lookup_url: config.lookup_url.clone(),
            scope: config.scope.clone(),
            client_id: read(&config.client_id_env)?,
            client_secret: read(&config.client_secret_env)?,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(rename = "foundationURI")]
    foundation_uri: Option<String>,
}

/// [`CodeResolver`] backed by the remote service. The token is requested
/// once and reused; answers are cached per code for the life of the
/// resolver.
pub struct HttpCodeResolver {
    client: Client,
    settings: ServiceSettings,
    token: Mutex<Option<String>>,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl HttpCodeResolver {
    pub fn new(settings: ServiceSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            settings,
            token: Mutex::new(None),
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn request_failed(&self, what: &str, err: reqwest::Error) -> anyhow::Error {
        if err.is_timeout() {
            anyhow!("{what} timed out after {:?}", self.settings.timeout)
        } else {
            anyhow::Error::new(err).context(format!("{what} failed"))
        }
    }

    fn token(&self) -> Result<String> {
        let mut slot = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        debug!(endpoint = %self.settings.token_endpoint, "requesting access token");
        let response = self
            .client
            .post(&self.settings.token_endpoint)
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("scope", self.settings.scope.as_str()),
                ("grant_type", GRANT_TYPE),
            ])
            .send()
            .map_err(|err| self.request_failed("token request", err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("token request failed: {status} {}", body.trim());
        }
        let body: TokenResponse = response
            .json()
            .map_err(|err| self.request_failed("token response", err))?;
        let Some(token) = body.access_token.filter(|token| !token.is_empty()) else {
            bail!("token response carries no access_token");
        };
        info!("access token obtained");
        *slot = Some(token.clone());
        Ok(token)
    }

    fn lookup(&self, code: &str) -> Result<Option<String>> {
        let token = self.token()?;
        let what = format!("lookup of code '{code}'");
        let response = self
            .client
            .get(&self.settings.lookup_url)
            .query(&[("searchText", code)])
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, "en")
            .header("API-Version", "v2")
            .send()
            .map_err(|err| self.request_failed(&what, err))?;
        let status = response.status();
        if !status.is_success() {
            warn!(code, status = status.as_u16(), "code lookup rejected");
            return Ok(None);
        }
        let body: LookupResponse = response
            .json()
            .map_err(|err| self.request_failed(&what, err))?;
        if body.foundation_uri.is_none() {
            warn!(code, "no URI found for code");
        }
        Ok(body.foundation_uri.filter(|uri| !uri.is_empty()))
    }
}

impl CodeResolver for HttpCodeResolver {
    fn resolve(&self, code: &str) -> Result<Option<String>> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned();
        if let Some(answer) = cached {
            return Ok(answer);
        }
        let answer = self.lookup(code)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.to_string(), answer.clone());
        Ok(answer)
    }
}
