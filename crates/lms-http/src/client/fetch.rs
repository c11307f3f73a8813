//! Main API client implementation.

use crate::client::auth::resolve_credential;
use crate::client::config::ClientConfig;
use crate::client::native_network::NativeNetwork;
use crate::client::utils::{join_path, parse_method};
use crate::error::{ApiError, Result};
use crate::traits::ApiNetwork;
use crate::types::{ApiRequest, ApiResponse};
use lms_common::DurableStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// The single network-call surface for the LMS API.
///
/// Every request is resolved against the configured base URL and, when
/// durable storage holds a credential, carries `Authorization: Bearer`.
/// Statuses are not interpreted: non-2xx responses become
/// [`ApiError::Status`] and the caller decides what they mean.
#[derive(Clone)]
pub struct ApiClient {
    network: Arc<dyn ApiNetwork>,
    config: Arc<ClientConfig>,
    base_url: Arc<str>,
    storage: Arc<dyn DurableStore>,
}

impl ApiClient {
    /// Client backed by reqwest.
    pub fn new(config: ClientConfig, storage: Arc<dyn DurableStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Self::with_network(config, Arc::new(NativeNetwork::new(client)), storage)
    }

    /// Client over an arbitrary transport.
    pub fn with_network(
        config: ClientConfig,
        network: Arc<dyn ApiNetwork>,
        storage: Arc<dyn DurableStore>,
    ) -> Result<Self> {
        let base_url: Arc<str> = config.normalized_base_url()?.into();
        Ok(ApiClient {
            network,
            config: Arc::new(config),
            base_url,
            storage,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Normalized base URL, always ending in `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &Arc<dyn DurableStore> {
        &self.storage
    }

    /// Absolute URL a call-site path resolves to.
    pub fn url_for(&self, path: &str) -> String {
        join_path(&self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.fetch(path, ApiRequest::new()).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.fetch(path, ApiRequest::new().with_method("DELETE"))
            .await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send_body("POST", path, body).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.send_body("PUT", path, body).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        self.send_body("PATCH", path, body).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(path, body).await?.json()
    }

    /// Send `body` as JSON with any method and decode a JSON reply.
    pub async fn send_json<B, T>(&self, method: &str, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_body(method, path, body).await?.json()
    }

    async fn send_body<B: Serialize + ?Sized>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        let request = ApiRequest::new().with_method(method).with_json(body)?;
        self.fetch(path, request).await
    }

    /// Dispatch `request` to `path`.
    ///
    /// Caller headers are kept except `Authorization`, which is replaced
    /// when durable storage holds a credential. The method is sent as given;
    /// one that is not a valid HTTP token fails before anything is sent.
    pub async fn fetch(&self, path: &str, request: ApiRequest) -> Result<ApiResponse> {
        parse_method(&request.method)?;
        let url = self.url_for(path);
        let request = self.authorize(request)?;

        self.log_request(&url, &request);
        let response = self.network.fetch(&url, request).await?;
        self.log_response(&url, &response);

        if !response.is_success() {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            return Err(ApiError::Status {
                status: response.status,
                body,
            });
        }

        Ok(response)
    }

    fn authorize(&self, request: ApiRequest) -> Result<ApiRequest> {
        match resolve_credential(self.storage.as_ref())? {
            Some(credential) => {
                tracing::trace!("Attaching credential from {:?}", credential.source);
                Ok(request.replace_header("Authorization", credential.header_value()))
            }
            None => Ok(request),
        }
    }

    fn log_request(&self, url: &str, request: &ApiRequest) {
        if self.config.enable_logging {
            tracing::debug!(
                "[LmsHTTP-Out] {} {} authenticated={}",
                request.method,
                url,
                request.header("authorization").is_some()
            );
        }
    }

    fn log_response(&self, url: &str, response: &ApiResponse) {
        if self.config.enable_logging {
            tracing::debug!(
                "[LmsHTTP-In] {} status={} bytes={}",
                url,
                response.status,
                response.body.len()
            );
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish()
    }
}
