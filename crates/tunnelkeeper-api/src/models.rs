// Wire types for the account/device backend.
//
// Field names follow the backend's snake_case JSON. Public keys travel as
// base64 strings; this crate never handles key material itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A freshly created account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAccount {
    pub id: String,
    pub number: String,
    pub expiry: DateTime<Utc>,
}

/// Account details returned by `GET /accounts/v1/accounts/me`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub expiry: DateTime<Utc>,
}

/// A device registered on an account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub pubkey: String,
    pub hijack_dns: bool,
    pub created: DateTime<Utc>,
    pub ipv4_address: String,
    pub ipv6_address: String,
}

/// Body of `POST /accounts/v1/devices`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDeviceRequest<'a> {
    pub pubkey: &'a str,
    pub hijack_dns: bool,
}

/// Body of `PUT /accounts/v1/devices/{id}/pubkey`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RotateDeviceKeyRequest<'a> {
    pub pubkey: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccessTokenRequest<'a> {
    pub account_number: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccessTokenResponse {
    pub access_token: String,
    pub expiry: DateTime<Utc>,
}

/// Error body returned alongside non-success statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}
