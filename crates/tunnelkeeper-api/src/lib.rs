// tunnelkeeper-api: Async client for the account/device backend.

pub mod accounts;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod retry;
pub mod transport;

pub use client::RestClient;
pub use error::{Error, ErrorKind};
pub use models::{AccountResponse, CreateDeviceRequest, Device, NewAccount};
pub use retry::RetryStrategy;
pub use transport::{TlsMode, TransportConfig};
