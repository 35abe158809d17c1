//! REST client for HCS service endpoints
//!
//! [`RestClient`] is the reqwest-backed [`Invoker`]: one per service endpoint,
//! carrying the auth token. [`ClientFactory`] builds them from the provider
//! configuration.

use std::time::Duration;

use async_trait::async_trait;
use hcs_core::error::{LifecycleError, LifecycleResult};
use hcs_core::invoker::{Invoker, Method, OperationRequest, Response, decode_response};
use log::debug;
use reqwest::Client;

use crate::config::ProviderConfig;

/// Timeout of a single HTTP request
const REQUEST_TIMEOUT_SECS: u64 = 60;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Invoker bound to one service endpoint
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestClient {
    pub fn new(http: Client, base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            http,
            base_url,
            auth_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Invoker for RestClient {
    async fn invoke(&self, request: OperationRequest) -> LifecycleResult<Response> {
        let url = self.url(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .http
            .request(to_reqwest(request.method), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &self.auth_token {
            builder = builder.header(AUTH_TOKEN_HEADER, token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LifecycleError::Transport(format!("{} {}: {}", request.method, url, e)))?;
        let status = response.status().as_u16();
        let raw = response
            .bytes()
            .await
            .map_err(|e| LifecycleError::Transport(format!("{} {}: {}", request.method, url, e)))?;

        debug!("{} {} -> {}", request.method, url, status);
        decode_response(&request, status, &raw)
    }
}

/// Builds service clients from the provider configuration
pub struct ClientFactory {
    http: Client,
    config: ProviderConfig,
}

impl ClientFactory {
    pub fn new(config: ProviderConfig) -> LifecycleResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| LifecycleError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Client for a service in the configured region
    pub fn client(&self, service: &str) -> RestClient {
        RestClient::new(
            self.http.clone(),
            self.config.endpoint_for(service),
            self.config.auth_token.clone(),
        )
    }

    /// Client for a service in another region
    pub fn client_in(&self, service: &str, region: &str) -> RestClient {
        let base_url = match self.config.endpoints.get(service) {
            Some(url) => url.clone(),
            None => format!("https://{}.{}.{}/", service, region, self.config.cloud),
        };
        RestClient::new(self.http.clone(), base_url, self.config.auth_token.clone())
    }
}
