// ── Account and device service seams ──
//
// Operations talk to the backend through these traits so tests can swap in
// fakes. `RestClient` is the production implementation.

use async_trait::async_trait;
use tunnelkeeper_api::{
    AccountResponse, CreateDeviceRequest, Device, Error, NewAccount, RestClient, RetryStrategy,
};

use crate::model::PublicKey;

#[async_trait]
pub trait AccountsProxy: Send + Sync {
    async fn create_account(&self, retry: RetryStrategy) -> Result<NewAccount, Error>;

    async fn get_account_data(
        &self,
        account_number: &str,
        retry: RetryStrategy,
    ) -> Result<AccountResponse, Error>;
}

#[async_trait]
pub trait DevicesProxy: Send + Sync {
    async fn create_device(
        &self,
        account_number: &str,
        public_key: &PublicKey,
        hijack_dns: bool,
        retry: RetryStrategy,
    ) -> Result<Device, Error>;

    /// `None` when the backend no longer knows the device.
    async fn get_device(
        &self,
        account_number: &str,
        device_id: &str,
        retry: RetryStrategy,
    ) -> Result<Option<Device>, Error>;

    /// `false` when the device was already gone.
    async fn delete_device(
        &self,
        account_number: &str,
        device_id: &str,
        retry: RetryStrategy,
    ) -> Result<bool, Error>;

    async fn rotate_device_key(
        &self,
        account_number: &str,
        device_id: &str,
        public_key: &PublicKey,
        retry: RetryStrategy,
    ) -> Result<Device, Error>;
}

#[async_trait]
impl AccountsProxy for RestClient {
    async fn create_account(&self, retry: RetryStrategy) -> Result<NewAccount, Error> {
        RestClient::create_account(self, retry).await
    }

    async fn get_account_data(
        &self,
        account_number: &str,
        retry: RetryStrategy,
    ) -> Result<AccountResponse, Error> {
        RestClient::get_account_data(self, account_number, retry).await
    }
}

#[async_trait]
impl DevicesProxy for RestClient {
    async fn create_device(
        &self,
        account_number: &str,
        public_key: &PublicKey,
        hijack_dns: bool,
        retry: RetryStrategy,
    ) -> Result<Device, Error> {
        let pubkey = public_key.to_base64();
        let body = CreateDeviceRequest {
            pubkey: &pubkey,
            hijack_dns,
        };
        RestClient::create_device(self, account_number, &body, retry).await
    }

    async fn get_device(
        &self,
        account_number: &str,
        device_id: &str,
        retry: RetryStrategy,
    ) -> Result<Option<Device>, Error> {
        RestClient::get_device(self, account_number, device_id, retry).await
    }

    async fn delete_device(
        &self,
        account_number: &str,
        device_id: &str,
        retry: RetryStrategy,
    ) -> Result<bool, Error> {
        RestClient::delete_device(self, account_number, device_id, retry).await
    }

    async fn rotate_device_key(
        &self,
        account_number: &str,
        device_id: &str,
        public_key: &PublicKey,
        retry: RetryStrategy,
    ) -> Result<Device, Error> {
        let pubkey = public_key.to_base64();
        RestClient::rotate_device_key(self, account_number, device_id, &pubkey, retry).await
    }
}
