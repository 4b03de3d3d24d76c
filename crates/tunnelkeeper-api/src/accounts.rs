// Account endpoints
//
// Account creation is anonymous; everything else authenticates with an
// access token derived from the account number.

use reqwest::Method;

use crate::client::{ApiRequest, RestClient};
use crate::error::Error;
use crate::models::{AccountResponse, NewAccount};
use crate::retry::RetryStrategy;

impl RestClient {
    /// Create a new account.
    ///
    /// `POST /accounts/v1/accounts`
    pub async fn create_account(&self, retry: RetryStrategy) -> Result<NewAccount, Error> {
        let request = ApiRequest::new(Method::POST, "accounts/v1/accounts");
        self.send_json(&request, retry).await
    }

    /// Fetch account details (currently only the expiry matters).
    ///
    /// `GET /accounts/v1/accounts/me`
    pub async fn get_account_data(
        &self,
        account_number: &str,
        retry: RetryStrategy,
    ) -> Result<AccountResponse, Error> {
        let request =
            ApiRequest::new(Method::GET, "accounts/v1/accounts/me").authorized(account_number);
        self.send_json(&request, retry).await
    }
}
