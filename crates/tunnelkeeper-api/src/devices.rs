// Device endpoints
//
// Devices are scoped to the account behind the access token. Lookups and
// deletions treat 404 as an answer, not a failure.

use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::client::{ApiRequest, RestClient, decode_json};
use crate::error::Error;
use crate::models::{CreateDeviceRequest, Device, RotateDeviceKeyRequest};
use crate::retry::RetryStrategy;

impl RestClient {
    /// Register a new device with the given public key.
    ///
    /// `POST /accounts/v1/devices`
    pub async fn create_device(
        &self,
        account_number: &str,
        body: &CreateDeviceRequest<'_>,
        retry: RetryStrategy,
    ) -> Result<Device, Error> {
        let request = ApiRequest::new(Method::POST, "accounts/v1/devices")
            .authorized(account_number)
            .json(body);
        self.send_json(&request, retry).await
    }

    /// Fetch a device. Returns `None` if the backend no longer knows it.
    ///
    /// `GET /accounts/v1/devices/{id}`
    pub async fn get_device(
        &self,
        account_number: &str,
        device_id: &str,
        retry: RetryStrategy,
    ) -> Result<Option<Device>, Error> {
        let request = ApiRequest::new(Method::GET, format!("accounts/v1/devices/{device_id}"))
            .authorized(account_number)
            .allow_not_found();
        let resp = self.send(&request, retry).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(device_id, "device not found");
            return Ok(None);
        }
        decode_json(resp).await.map(Some)
    }

    /// Delete a device. Returns `false` if it was already gone.
    ///
    /// `DELETE /accounts/v1/devices/{id}`
    pub async fn delete_device(
        &self,
        account_number: &str,
        device_id: &str,
        retry: RetryStrategy,
    ) -> Result<bool, Error> {
        let request = ApiRequest::new(Method::DELETE, format!("accounts/v1/devices/{device_id}"))
            .authorized(account_number)
            .allow_not_found();
        let resp = self.send(&request, retry).await?;
        Ok(resp.status() != StatusCode::NOT_FOUND)
    }

    /// Replace the device's public key.
    ///
    /// `PUT /accounts/v1/devices/{id}/pubkey`
    pub async fn rotate_device_key(
        &self,
        account_number: &str,
        device_id: &str,
        pubkey: &str,
        retry: RetryStrategy,
    ) -> Result<Device, Error> {
        let body = RotateDeviceKeyRequest { pubkey };
        let request = ApiRequest::new(
            Method::PUT,
            format!("accounts/v1/devices/{device_id}/pubkey"),
        )
        .authorized(account_number)
        .json(&body);
        self.send_json(&request, retry).await
    }
}
