use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account stored alongside the device once logged in.
///
/// `identifier` and `number` never change after login; only `expiry` is
/// refreshed from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub identifier: String,
    pub number: String,
    pub expiry: DateTime<Utc>,
}

impl AccountData {
    pub fn is_expired(&self) -> bool {
        self.expiry <= Utc::now()
    }
}

impl From<tunnelkeeper_api::NewAccount> for AccountData {
    fn from(account: tunnelkeeper_api::NewAccount) -> Self {
        Self {
            identifier: account.id,
            number: account.number,
            expiry: account.expiry,
        }
    }
}
