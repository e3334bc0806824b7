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

//! Supplies the authentication headers for each request.
//!
//! Acquiring tokens is left to the caller: implement [CredentialsProvider]
//! with whatever token source the application uses, and wrap it with
//! [Credentials::from()]. [AccessToken] covers the common case of a token
//! obtained elsewhere, [Anonymous] sends no authentication headers at all,
//! which is useful with emulators and fake servers.

use crate::Result;
use crate::error::Error;
use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;

/// The credentials used by [send_request][crate::send_request].
#[derive(Clone, Debug)]
pub struct Credentials {
    inner: Arc<dyn dynamic::CredentialsProvider>,
}

impl<T> std::convert::From<T> for Credentials
where
    T: CredentialsProvider + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl Credentials {
    /// Returns the headers to authenticate one request.
    pub async fn headers(&self) -> Result<HeaderMap> {
        self.inner.headers().await
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::from(Anonymous)
    }
}

/// Implemented by token sources.
///
/// Implementations should refresh tokens as needed, `headers()` is called
/// once per request attempt.
pub trait CredentialsProvider: std::fmt::Debug {
    /// Asynchronously constructs the authentication headers.
    fn headers(&self) -> impl Future<Output = Result<HeaderMap>> + Send;
}

pub(crate) mod dynamic {
    use super::HeaderMap;
    use super::Result;

    /// A dyn-compatible, crate-private version of `CredentialsProvider`.
    #[async_trait::async_trait]
    pub trait CredentialsProvider: Send + Sync + std::fmt::Debug {
        async fn headers(&self) -> Result<HeaderMap>;
    }

    #[async_trait::async_trait]
    impl<T> CredentialsProvider for T
    where
        T: super::CredentialsProvider + Send + Sync,
    {
        async fn headers(&self) -> Result<HeaderMap> {
            T::headers(self).await
        }
    }
}

/// Sends no authentication headers.
#[derive(Clone, Debug, Default)]
pub struct Anonymous;

impl CredentialsProvider for Anonymous {
    async fn headers(&self) -> Result<HeaderMap> {
        Ok(HeaderMap::new())
    }
}

/// Sends a pre-existing OAuth2 access token as a bearer token.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new<T: Into<String>>(token: T) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"[censored]").finish()
    }
}

impl CredentialsProvider for AccessToken {
    async fn headers(&self) -> Result<HeaderMap> {
        let mut value =
            HeaderValue::from_str(&format!("Bearer {}", self.0)).map_err(Error::authentication)?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}
