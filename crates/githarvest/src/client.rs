//! Authenticated JSON API client.
//!
//! The client owns the transport and the opaque bearer credential; every
//! component that issues a request borrows it rather than touching process
//! globals. The credential is attached as an `Authorization` header and is
//! never logged.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpTransport};
use crate::retry::{RetryError, RetryPolicy, retry};

/// Default API base for github.com-style deployments.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// True for the failures the resilient transport retries: connection-level
/// errors and 403/429 throttling responses. Everything else, including
/// undecodable bodies, surfaces immediately.
#[must_use]
pub fn is_transient(err: &ApiError) -> bool {
    matches!(
        err,
        ApiError::Transport(_)
            | ApiError::Status {
                status: 403 | 429,
                ..
            }
    )
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    token: Arc<String>,
    api_base: String,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, token: impl Into<String>) -> Self {
        Self {
            transport,
            token: Arc::new(token.into()),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Override the API base, e.g. for a GitHub Enterprise deployment.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request(&self, url: &str, query: &[(String, String)]) -> HttpRequest {
        let mut request = HttpRequest::get(url)
            .with_header("Accept", "application/vnd.github+json")
            .with_header("User-Agent", "githarvest")
            .with_header("Authorization", format!("Bearer {}", self.token));
        for (key, value) in query {
            request = request.with_query(key.clone(), value.clone());
        }
        request
    }

    /// One GET without retry, decoding the JSON body.
    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let request = self.request(url, query);
        let full_url = request.full_url();

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !(200..300).contains(&response.status) {
            return Err(ApiError::Status {
                status: response.status,
                url: full_url,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            tracing::error!(
                url = %full_url,
                body = %String::from_utf8_lossy(&response.body),
                "undecodable response body"
            );
            ApiError::Decode {
                url: full_url,
                message: e.to_string(),
            }
        })
    }

    /// Resilient GET: retries failures `when` accepts under `policy`.
    pub async fn get_json_when<T, When>(
        &self,
        url: &str,
        query: &[(String, String)],
        policy: RetryPolicy,
        when: When,
        cancel: &CancelToken,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        When: Fn(&ApiError) -> bool,
    {
        retry(policy, cancel, || self.get_json_once(url, query), when)
            .await
            .map_err(|err| match err {
                RetryError::Terminal(e) => e,
                RetryError::Exhausted { attempts, last } => ApiError::Exhausted {
                    attempts,
                    last: Box::new(last),
                },
                RetryError::Cancelled(c) => ApiError::Cancelled(c),
            })
    }

    /// Resilient GET with the standard transient classification
    /// ([`is_transient`]): connection failures and 403/429 only.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
        policy: RetryPolicy,
        cancel: &CancelToken,
    ) -> Result<T, ApiError> {
        self.get_json_when(url, query, policy, is_transient, cancel)
            .await
    }
}
