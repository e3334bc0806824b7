// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sends one logical HTTP request, retrying transient failures.

use crate::Result;
use crate::error::Error;
use crate::options::ClientConfig;
use crate::retry_loop::retry_loop;
use crate::retry_predicate::RetryPredicate;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::time::Duration;

const USER_PROJECT_HEADER: HeaderName = HeaderName::from_static("x-goog-user-project");
const REQUEST_REASON_HEADER: HeaderName = HeaderName::from_static("x-goog-request-reason");

/// The parameters for [send_request].
///
/// # Example
/// ```
/// # use google_provider_transport::{RetryPredicate, SendRequestOptions};
/// # use google_provider_transport::retry_predicate::is_fingerprint_error;
/// use std::sync::Arc;
/// use std::time::Duration;
/// let options = SendRequestOptions::new(
///         http::Method::PATCH,
///         "https://compute.googleapis.com/compute/v1/projects/p/zones/z/instances/i",
///     )
///     .set_project("p")
///     .set_body(serde_json::json!({"labels": {"env": "test"}}))
///     .set_timeout(Duration::from_secs(20 * 60))
///     .set_retry_predicates([Arc::new(is_fingerprint_error) as RetryPredicate]);
/// ```
#[derive(Clone)]
pub struct SendRequestOptions {
    method: http::Method,
    raw_url: String,
    project: Option<String>,
    user_agent: Option<String>,
    body: Option<serde_json::Value>,
    timeout: Option<Duration>,
    headers: HeaderMap,
    error_retry_predicates: Vec<RetryPredicate>,
    error_abort_predicates: Vec<RetryPredicate>,
}

impl SendRequestOptions {
    pub fn new<U: Into<String>>(method: http::Method, raw_url: U) -> Self {
        Self {
            method,
            raw_url: raw_url.into(),
            project: None,
            user_agent: None,
            body: None,
            timeout: None,
            headers: HeaderMap::new(),
            error_retry_predicates: Vec::new(),
            error_abort_predicates: Vec::new(),
        }
    }

    /// The resource project, sent as `X-Goog-User-Project` when the user
    /// project override is enabled and no billing project is configured.
    pub fn set_project<V: Into<String>>(mut self, v: V) -> Self {
        self.project = Some(v.into());
        self
    }

    /// Overrides the configured `User-Agent`.
    pub fn set_user_agent<V: Into<String>>(mut self, v: V) -> Self {
        self.user_agent = Some(v.into());
        self
    }

    /// The request body, sent as JSON.
    pub fn set_body(mut self, v: serde_json::Value) -> Self {
        self.body = Some(v);
        self
    }

    /// The time bound for the request, including retries. Defaults to the
    /// configured [request timeout][ClientConfig::request_timeout].
    pub fn set_timeout(mut self, v: Duration) -> Self {
        self.timeout = Some(v);
        self
    }

    /// Additional headers. These replace any header of the same name set by
    /// the transport.
    pub fn set_headers(mut self, v: HeaderMap) -> Self {
        self.headers = v;
        self
    }

    /// Predicates to retry failures beyond the default set.
    pub fn set_retry_predicates<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = RetryPredicate>,
    {
        self.error_retry_predicates = v.into_iter().collect();
        self
    }

    /// Predicates that stop the retry loop, even if the failure is retryable.
    pub fn set_abort_predicates<I>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = RetryPredicate>,
    {
        self.error_abort_predicates = v.into_iter().collect();
        self
    }
}

impl std::fmt::Debug for SendRequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendRequestOptions")
            .field("method", &self.method)
            .field("raw_url", &self.raw_url)
            .field("project", &self.project)
            .field("user_agent", &self.user_agent)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("error_retry_predicates", &self.error_retry_predicates.len())
            .field("error_abort_predicates", &self.error_abort_predicates.len())
            .finish()
    }
}

/// Sends a JSON request and returns the parsed JSON response.
///
/// Failures are retried while any retry predicate matches, and no abort
/// predicate does, until the request timeout elapses. Responses without
/// content (e.g. `204 No Content`) return `Ok(None)`.
pub async fn send_request(
    config: &ClientConfig,
    options: SendRequestOptions,
) -> Result<Option<serde_json::Value>> {
    let timeout = options.timeout.unwrap_or(config.request_timeout());
    let headers = request_headers(config, &options)?;
    let body = options
        .body
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()
        .map_err(Error::ser)?
        .map(Bytes::from);
    tracing::debug!(method = %options.method, url = %options.raw_url, "sending request");

    let backoff = config.backoff_policy();
    let attempt_config = config.clone();
    let attempt_options = options.clone();
    let inner = async move |remaining| {
        request_attempt(
            &attempt_config,
            &attempt_options,
            &headers,
            body.clone(),
            remaining,
        )
        .await
    };
    let sleep = async |d| tokio::time::sleep(d).await;
    retry_loop(
        inner,
        sleep,
        timeout,
        &options.error_retry_predicates,
        &options.error_abort_predicates,
        backoff.as_ref(),
    )
    .await
}

fn request_headers(config: &ClientConfig, options: &SendRequestOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(ua) = options.user_agent.as_deref().or(config.user_agent()) {
        headers.insert(USER_AGENT, HeaderValue::from_str(ua).map_err(Error::ser)?);
    }
    if let Some(project) = config.user_project(options.project.as_deref()) {
        headers.insert(
            USER_PROJECT_HEADER,
            HeaderValue::from_str(&project).map_err(Error::ser)?,
        );
    }
    if let Some(reason) = config.request_reason() {
        headers.insert(
            REQUEST_REASON_HEADER,
            HeaderValue::from_str(reason).map_err(Error::ser)?,
        );
    }
    for (name, value) in options.headers.iter() {
        headers.insert(name, value.clone());
    }
    Ok(headers)
}

async fn request_attempt(
    config: &ClientConfig,
    options: &SendRequestOptions,
    headers: &HeaderMap,
    body: Option<Bytes>,
    remaining_time: Duration,
) -> Result<Option<serde_json::Value>> {
    let mut builder = config
        .http_client()
        .request(options.method.clone(), &options.raw_url)
        .headers(headers.clone())
        .timeout(remaining_time);
    let auth_headers = config
        .credentials()
        .headers()
        .await
        .map_err(Error::authentication)?;
    builder = builder.headers(auth_headers);
    if let Some(body) = body {
        builder = builder.body(body);
    }
    let response = builder.send().await.map_err(map_send_error)?;
    tracing::debug!(status = %response.status(), url = %options.raw_url, "received response");
    if !response.status().is_success() {
        return to_http_error(response).await;
    }
    to_json_response(response).await
}

fn map_send_error(err: reqwest::Error) -> Error {
    match err {
        e if e.is_timeout() => Error::timeout(e),
        e => Error::io(e),
    }
}

async fn to_http_error<O>(response: reqwest::Response) -> Result<O> {
    let status_code = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(Error::io)?;
    Err(Error::http(status_code, headers, body))
}

async fn to_json_response(response: reqwest::Response) -> Result<Option<serde_json::Value>> {
    // 204 No Content has no body, and serde_json fails on empty input.
    if response.status() == reqwest::StatusCode::NO_CONTENT {
        return Ok(None);
    }
    let body = response.bytes().await.map_err(Error::io)?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&body).map(Some).map_err(Error::deser)
}
