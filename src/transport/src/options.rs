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

//! Client configuration shared by every request.

use crate::backoff_policy::{BackoffPolicy, BackoffPolicyArg};
use crate::credentials::Credentials;
use crate::exponential_backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use crate::polling_backoff_policy::{PollingBackoffPolicy, PollingBackoffPolicyArg};
use std::sync::Arc;
use std::time::Duration;

/// The default time bound for one logical request, including retries.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(4 * 60);

pub const DEFAULT_COMPUTE_BASE_PATH: &str = "https://compute.googleapis.com/compute/v1/";
pub const DEFAULT_CONTAINER_BASE_PATH: &str = "https://container.googleapis.com/v1/";
pub const DEFAULT_SQL_BASE_PATH: &str = "https://sqladmin.googleapis.com/sql/v1beta4/";
pub const DEFAULT_LOGGING_BASE_PATH: &str = "https://logging.googleapis.com/v2/";

/// The configuration for [send_request][crate::send_request] and the
/// operation waiters.
///
/// # Example
/// ```
/// # use google_provider_transport::ClientConfig;
/// # use google_provider_transport::credentials::AccessToken;
/// use std::time::Duration;
/// let config = ClientConfig::new()
///     .with_credentials(AccessToken::new("ya29.example"))
///     .with_user_agent("my-tool/1.0")
///     .with_billing_project("my-billing-project")
///     .with_user_project_override(true)
///     .with_request_timeout(Duration::from_secs(60));
/// assert_eq!(config.request_timeout(), Duration::from_secs(60));
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    client: reqwest::Client,
    credentials: Credentials,
    user_agent: Option<String>,
    user_project_override: bool,
    billing_project: Option<String>,
    request_reason: Option<String>,
    request_timeout: Duration,
    backoff_policy: Arc<dyn BackoffPolicy>,
    polling_backoff_policy: Arc<dyn PollingBackoffPolicy>,
    poll_interval: Option<Duration>,
    compute_base_path: String,
    container_base_path: String,
    sql_base_path: String,
    logging_base_path: String,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials: Credentials::default(),
            user_agent: None,
            user_project_override: false,
            billing_project: None,
            request_reason: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff_policy: Arc::new(ExponentialBackoff::default()),
            polling_backoff_policy: Arc::new(ExponentialBackoffBuilder::polling().clamp()),
            poll_interval: None,
            compute_base_path: DEFAULT_COMPUTE_BASE_PATH.to_string(),
            container_base_path: DEFAULT_CONTAINER_BASE_PATH.to_string(),
            sql_base_path: DEFAULT_SQL_BASE_PATH.to_string(),
            logging_base_path: DEFAULT_LOGGING_BASE_PATH.to_string(),
        }
    }

    /// Use a pre-configured HTTP client, e.g. one with a proxy.
    pub fn with_http_client(mut self, v: reqwest::Client) -> Self {
        self.client = v;
        self
    }

    /// Configure the authentication credentials.
    pub fn with_credentials<T: Into<Credentials>>(mut self, v: T) -> Self {
        self.credentials = v.into();
        self
    }

    /// Sets the `User-Agent` header sent with each request.
    pub fn with_user_agent<V: Into<String>>(mut self, v: V) -> Self {
        self.user_agent = Some(v.into());
        self
    }

    /// When enabled, requests carry the `X-Goog-User-Project` header, so quota
    /// and billing are charged to the resource (or billing) project instead of
    /// the project that owns the credentials.
    pub fn with_user_project_override(mut self, v: bool) -> Self {
        self.user_project_override = v;
        self
    }

    /// Sets the project charged when `user_project_override` is enabled. It
    /// takes precedence over the resource project.
    pub fn with_billing_project<V: Into<String>>(mut self, v: V) -> Self {
        self.billing_project = Some(v.into());
        self
    }

    /// Sets the `X-Goog-Request-Reason` header sent with each request. The
    /// reason is recorded in Cloud Audit Logs.
    pub fn with_request_reason<V: Into<String>>(mut self, v: V) -> Self {
        self.request_reason = Some(v.into());
        self
    }

    /// Sets the default time bound for requests that do not specify one.
    pub fn with_request_timeout(mut self, v: Duration) -> Self {
        self.request_timeout = v;
        self
    }

    /// Configure the retry backoff policy.
    pub fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff_policy = v.into().0;
        self
    }

    /// Configure the backoff policy between operation polls.
    ///
    /// Ignored when a [poll interval][ClientConfig::with_poll_interval] is set.
    pub fn with_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.polling_backoff_policy = v.into().0;
        self
    }

    /// Poll operations at a fixed interval.
    pub fn with_poll_interval(mut self, v: Duration) -> Self {
        self.poll_interval = Some(v);
        self
    }

    pub fn with_compute_base_path<V: Into<String>>(mut self, v: V) -> Self {
        self.compute_base_path = v.into();
        self
    }

    pub fn with_container_base_path<V: Into<String>>(mut self, v: V) -> Self {
        self.container_base_path = v.into();
        self
    }

    pub fn with_sql_base_path<V: Into<String>>(mut self, v: V) -> Self {
        self.sql_base_path = v.into();
        self
    }

    pub fn with_logging_base_path<V: Into<String>>(mut self, v: V) -> Self {
        self.logging_base_path = v.into();
        self
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns the project to send in `X-Goog-User-Project`, if any.
    ///
    /// The billing project takes precedence over `resource_project`. Returns
    /// `None` when the user project override is disabled.
    pub fn user_project(&self, resource_project: Option<&str>) -> Option<String> {
        if !self.user_project_override {
            return None;
        }
        self.billing_project
            .as_deref()
            .or(resource_project)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }

    pub fn request_reason(&self) -> Option<&str> {
        self.request_reason.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn backoff_policy(&self) -> Arc<dyn BackoffPolicy> {
        self.backoff_policy.clone()
    }

    pub fn polling_backoff_policy(&self) -> Arc<dyn PollingBackoffPolicy> {
        self.polling_backoff_policy.clone()
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    pub fn compute_base_path(&self) -> &str {
        &self.compute_base_path
    }

    pub fn container_base_path(&self) -> &str {
        &self.container_base_path
    }

    pub fn sql_base_path(&self) -> &str {
        &self.sql_base_path
    }

    pub fn logging_base_path(&self) -> &str {
        &self.logging_base_path
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
