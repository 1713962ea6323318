//! Common utilities for the cloud gateway client
//!
//! Wraps a reqwest client with authentication headers and maps HTTP status
//! codes onto [`CloudError`] variants.

use crate::error::CloudError;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// HTTP client wrapper with authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(
        client: Client,
        base_url: &str,
        region: &str,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: Option<&str>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            region: region.to_string(),
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: session_token.map(str::to_string),
        }
    }

    /// Gateway base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Region sent with every request
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Authorization", format!("Credential {}:{}", self.access_key_id, self.secret_access_key))
            .header("X-Cloud-Region", &self.region)
            .header("Accept", "application/json");
        match &self.session_token {
            Some(token) => request.header("X-Cloud-Session-Token", token),
            None => request,
        }
    }

    async fn check(method: &str, path: &str, response: Response) -> Result<Response, CloudError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!("{} {} failed: {} - {}", method, path, status, body);
        Err(CloudError::from_status(status.as_u16(), format!("{method} {path}: {body}")))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CloudError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            CloudError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CloudError> {
        let url = self.build_url(path);
        debug!("GET {}", url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = Self::check("GET", path, response).await?;
        Self::decode(response).await
    }

    /// Make a POST request
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, CloudError> {
        let url = self.build_url(path);
        debug!("POST {}", url);
        let response = self.authorize(self.client.post(&url)).json(body).send().await?;
        let response = Self::check("POST", path, response).await?;
        Self::decode(response).await
    }

    /// Make a PATCH request
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, CloudError> {
        let url = self.build_url(path);
        debug!("PATCH {}", url);
        let response = self.authorize(self.client.patch(&url)).json(body).send().await?;
        let response = Self::check("PATCH", path, response).await?;
        Self::decode(response).await
    }

    /// Make a PUT request, ignoring the response body
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), CloudError> {
        let url = self.build_url(path);
        debug!("PUT {}", url);
        let response = self.authorize(self.client.put(&url)).json(body).send().await?;
        Self::check("PUT", path, response).await?;
        Ok(())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), CloudError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);
        let response = self.authorize(self.client.delete(&url)).send().await?;
        Self::check("DELETE", path, response).await?;
        Ok(())
    }
}
