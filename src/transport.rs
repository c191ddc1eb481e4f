//! HTTP transport for provider requests
//!
//! [`HttpClient`] wraps a `reqwest::Client` configured from an
//! [`AuthClientConfig`]: optional extra trust anchor, cookie forwarding and
//! request timeout. Each authentication engine owns its own instance, so
//! independent contexts never share connection or cookie state.
//!
//! The client reports only transport failures as errors. Every HTTP status
//! comes back as an [`HttpResponse`] and the caller decides what counts as
//! success.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::AuthClientConfig;
use crate::error::{AuthError, Result};

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers; repeated headers are joined with `", "`
    pub headers: BTreeMap<String, String>,
    /// Raw body text
    pub body: String,
}

impl HttpResponse {
    /// Returns `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidResponse`] carrying the status and body
    /// if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            tracing::debug!(status = self.status, error = %e, "Response body did not parse");
            AuthError::InvalidResponse {
                status: self.status,
                body: self.body.clone(),
            }
        })
    }

    /// Extracts the OAuth `error` code from a JSON error body, if any.
    pub fn oauth_error_code(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_string)
    }

    /// Turns a non-2xx response into [`AuthError::NetworkRequest`].
    pub fn into_network_error(self, message: impl Into<String>) -> AuthError {
        AuthError::NetworkRequest {
            message: format!("{} (status {})", message.into(), self.status),
            status: Some(self.status),
            code: self.oauth_error_code(),
            body: Some(self.body),
        }
    }
}

/// Per-context HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Builds a client honoring the transport settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the certificate is not valid PEM or
    /// the client cannot be constructed.
    pub fn from_config(config: &AuthClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .cookie_store(config.send_cookies_in_requests);

        if let Some(pem) = config.certificate.as_deref().filter(|c| !c.trim().is_empty()) {
            let certificate = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| AuthError::Config(format!("invalid certificate: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        let inner = builder
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { inner })
    }

    /// Issues a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NetworkRequest`] if no response was received.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        tracing::debug!(url, "GET");
        let request = self
            .inner
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        Self::send(request).await
    }

    /// Issues a form-encoded POST request, optionally with a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NetworkRequest`] if no response was received.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        bearer: Option<&str>,
    ) -> Result<HttpResponse> {
        tracing::debug!(url, fields = form.len(), "POST form");
        let mut request = self
            .inner
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Self::send(request).await
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::network(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let body = response.text().await.map_err(|e| AuthError::NetworkRequest {
            message: format!("failed to read response body: {e}"),
            status: Some(status),
            code: None,
            body: None,
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
