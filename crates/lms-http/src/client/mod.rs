//! Authenticated API client implementation.

mod auth;
mod config;
mod fetch;
pub mod native_network;
pub mod utils;

pub use auth::{resolve_credential, Credential, CredentialSource};
pub use config::{ClientConfig, API_URL_ENV, DEFAULT_API_URL};
pub use fetch::ApiClient;
pub use native_network::NativeNetwork;
