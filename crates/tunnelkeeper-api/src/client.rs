// Backend REST client
//
// Wraps `reqwest::Client` with URL construction, bearer-token handling,
// error-body decoding and retry. Endpoint groups (accounts, devices) are
// implemented as inherent methods in separate files to keep this module
// focused on transport mechanics.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{AccessTokenRequest, AccessTokenResponse, ErrorBody};
use crate::retry::{RetryStrategy, with_retry};
use crate::transport::TransportConfig;

/// Tokens expiring within this margin are refreshed before use.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

struct AccessToken {
    value: SecretString,
    expiry: DateTime<Utc>,
}

/// A single backend call, rebuilt for every retry attempt.
pub(crate) struct ApiRequest<'a, B: Serialize + ?Sized = ()> {
    pub method: Method,
    pub path: String,
    pub account_number: Option<&'a str>,
    pub body: Option<&'a B>,
    /// Treat 404 as a response rather than an error.
    pub allow_not_found: bool,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            account_number: None,
            body: None,
            allow_not_found: false,
        }
    }
}

impl<'a, B: Serialize + ?Sized> ApiRequest<'a, B> {
    pub fn json<C: Serialize + ?Sized>(self, body: &'a C) -> ApiRequest<'a, C> {
        ApiRequest {
            method: self.method,
            path: self.path,
            account_number: self.account_number,
            body: Some(body),
            allow_not_found: self.allow_not_found,
        }
    }

    pub fn authorized(mut self, account_number: &'a str) -> Self {
        self.account_number = Some(account_number);
        self
    }

    pub fn allow_not_found(mut self) -> Self {
        self.allow_not_found = true;
        self
    }
}

/// Async client for the account/device backend.
///
/// Access tokens are obtained per account number and cached until shortly
/// before they expire. A 401 response evicts the cached token.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self::with_client(http, base_url))
    }

    fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&full)?)
    }

    // ── Access tokens ────────────────────────────────────────────────

    /// Return a valid access token for `account_number`, fetching one if
    /// the cache holds none or it is about to expire.
    async fn access_token(&self, account_number: &str) -> Result<String, Error> {
        let mut tokens = self.tokens.lock().await;
        let threshold = Utc::now() + TimeDelta::seconds(TOKEN_EXPIRY_MARGIN_SECS);

        if let Some(token) = tokens.get(account_number) {
            if token.expiry > threshold {
                return Ok(token.value.expose_secret().to_owned());
            }
        }

        let url = self.api_url("auth/v1/token")?;
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .json(&AccessTokenRequest { account_number })
            .send()
            .await?;
        let resp = check_status(resp, false).await?;
        let token: AccessTokenResponse = decode_json(resp).await?;

        let value = token.access_token.clone();
        tokens.insert(
            account_number.to_owned(),
            AccessToken {
                value: SecretString::from(token.access_token),
                expiry: token.expiry,
            },
        );
        Ok(value)
    }

    async fn evict_token(&self, account_number: &str) {
        self.tokens.lock().await.remove(account_number);
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send `request` under `retry`, returning the raw response once its
    /// status has been checked.
    pub(crate) async fn send<B: Serialize + ?Sized>(
        &self,
        request: &ApiRequest<'_, B>,
        retry: RetryStrategy,
    ) -> Result<reqwest::Response, Error> {
        with_retry(retry, move || self.send_once(request)).await
    }

    /// Send `request` and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        request: &ApiRequest<'_, B>,
        retry: RetryStrategy,
    ) -> Result<T, Error> {
        let resp = self.send(request, retry).await?;
        decode_json(resp).await
    }

    async fn send_once<B: Serialize + ?Sized>(
        &self,
        request: &ApiRequest<'_, B>,
    ) -> Result<reqwest::Response, Error> {
        let url = self.api_url(&request.path)?;
        debug!("{} {}", request.method, url);

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(number) = request.account_number {
            builder = builder.bearer_auth(self.access_token(number).await?);
        }
        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;

        let result = check_status(resp, request.allow_not_found).await;
        if let (Err(e), Some(number)) = (&result, request.account_number) {
            if e.is_unauthorized() {
                self.evict_token(number).await;
            }
        }
        result
    }
}

/// Map a non-success status into `Error::Server`, decoding the backend's
/// `{code, detail}` body when present.
async fn check_status(
    resp: reqwest::Response,
    allow_not_found: bool,
) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() || (allow_not_found && status == StatusCode::NOT_FOUND) {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    Err(Error::Server {
        status: status.as_u16(),
        code: parsed.code,
        message: parsed
            .detail
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_owned()),
    })
}

pub(crate) async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
