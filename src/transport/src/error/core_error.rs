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

use super::OperationError;
use bytes::Bytes;
use http::HeaderMap;
use std::borrow::Cow;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by the transport and the operation waiters.
///
/// Errors come from multiple sources. The service may reject a request with a
/// non-2xx HTTP response, the transport may be unable to connect, the request
/// may time out, the retry loop may run out of time, the response may not be
/// valid JSON, or a long-running operation may complete with an error.
///
/// Retry predicates interrogate errors of this type. The accessors below expose
/// the pieces they match on: the HTTP status code, the response body, and the
/// errors reported by a completed operation.
///
/// # Example
/// ```
/// use google_provider_transport::error::Error;
/// let error = Error::http(404, http::HeaderMap::new(), bytes::Bytes::from_static(b"Missing page"));
/// assert_eq!(error.http_status_code(), Some(404));
/// assert_eq!(error.http_body().as_deref(), Some("Missing page"));
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error representing a non-2xx HTTP response.
    ///
    /// The payload is kept verbatim, retry predicates match on its contents.
    /// If the payload is a Google API error document the parsed form is
    /// available via [api_error()][Error::api_error].
    pub fn http(status_code: u16, headers: HeaderMap, payload: Bytes) -> Self {
        let api_error = ApiError::parse(&payload);
        let details = HttpDetails {
            status_code,
            headers,
            payload,
            api_error,
        };
        Self {
            kind: ErrorKind::Http(Box::new(details)),
            source: None,
        }
    }

    /// The service rejected the request with a non-2xx HTTP response.
    pub fn is_http(&self) -> bool {
        matches!(self.kind, ErrorKind::Http(_))
    }

    /// Creates an error representing a failure to send the request or receive
    /// the response.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Io,
            source: Some(source.into()),
        }
    }

    /// The request could not be sent, or the response could not be received.
    ///
    /// These errors never reached the service, or the service response was
    /// lost. Many of them are transient.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// Creates an error representing a timeout.
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The request could not be completed before its deadline.
    ///
    /// This is always a client-side generated error. The request may or may
    /// not have reached the service.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing an exhausted retry loop.
    ///
    /// The source is the last error seen by the retry loop.
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The retry loop ran out of time while the errors were still retryable.
    ///
    /// Use [source()][std::error::Error::source] to examine the last error.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a deserialization problem.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// The response could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing a serialization problem.
    pub fn ser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Serialization,
            source: Some(source.into()),
        }
    }

    /// The request could not be serialized.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Serialization)
    }

    /// Creates an error representing a failure to create the authentication
    /// headers.
    pub fn authentication<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Authentication,
            source: Some(source.into()),
        }
    }

    /// The request never left the client, the credentials failed.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
    }

    /// Creates an error reported by a completed long-running operation.
    pub fn operation(error: OperationError) -> Self {
        Self {
            kind: ErrorKind::Operation(Box::new(error)),
            source: None,
        }
    }

    /// The long-running operation completed, and it completed with an error.
    pub fn is_operation(&self) -> bool {
        matches!(self.kind, ErrorKind::Operation(_))
    }

    /// Creates an unclassified error.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }

    /// The HTTP status code, if any, associated with this error.
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Http(d) => Some(d.status_code),
            _ => None,
        }
    }

    /// The HTTP headers, if any, associated with this error.
    pub fn http_headers(&self) -> Option<&HeaderMap> {
        match &self.kind {
            ErrorKind::Http(d) => Some(&d.headers),
            _ => None,
        }
    }

    /// The HTTP payload, if any, associated with this error.
    pub fn http_payload(&self) -> Option<&Bytes> {
        match &self.kind {
            ErrorKind::Http(d) => Some(&d.payload),
            _ => None,
        }
    }

    /// The HTTP payload as text.
    ///
    /// Invalid UTF-8 sequences are replaced, the result is only used to match
    /// well-known messages.
    pub fn http_body(&self) -> Option<Cow<'_, str>> {
        self.http_payload().map(|p| String::from_utf8_lossy(p))
    }

    /// The parsed Google API error document, if the payload contains one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.kind {
            ErrorKind::Http(d) => d.api_error.as_ref(),
            _ => None,
        }
    }

    /// The error reported by a completed long-running operation, if any.
    pub fn operation_error(&self) -> Option<&OperationError> {
        match &self.kind {
            ErrorKind::Operation(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Http(d), _) => d.display(f),
            (ErrorKind::Io, Some(e)) => write!(f, "cannot send the request or receive the response: {e}"),
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline: {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => write!(f, "{e}"),
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response: {e}")
            }
            (ErrorKind::Serialization, Some(e)) => write!(f, "cannot serialize the request: {e}"),
            (ErrorKind::Authentication, Some(e)) => {
                write!(f, "cannot create the authentication headers: {e}")
            }
            (ErrorKind::Operation(e), _) => write!(f, "{e}"),
            (ErrorKind::Other, Some(e)) => write!(f, "{e}"),
            (_, None) => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Http(Box<HttpDetails>),
    Io,
    Timeout,
    Exhausted,
    Deserialization,
    Serialization,
    Authentication,
    Operation(Box<OperationError>),
    Other,
}

#[derive(Debug)]
struct HttpDetails {
    status_code: u16,
    headers: HeaderMap,
    payload: Bytes,
    api_error: Option<ApiError>,
}

impl HttpDetails {
    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.api_error {
            Some(e) => write!(f, "Error {}: {}", self.status_code, e.message)?,
            None if self.payload.is_empty() => write!(f, "Error {}", self.status_code)?,
            None => write!(
                f,
                "Error {}: {}",
                self.status_code,
                String::from_utf8_lossy(&self.payload)
            )?,
        };
        if let Some(e) = &self.api_error {
            for detail in e.errors.iter().filter(|d| !d.reason.is_empty()) {
                write!(f, ", {}", detail.reason)?;
            }
        }
        Ok(())
    }
}

/// The error document returned by Google APIs.
///
/// Google APIs return errors as `{"error": {"code": ..., "message": ...}}`.
/// Older APIs also include an `errors` list with a `reason` for each error.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ApiError {
    /// The HTTP status code as reported in the payload.
    pub code: u16,
    /// A developer-facing error message.
    pub message: String,
    /// The canonical status name, e.g. `NOT_FOUND`.
    pub status: String,
    /// Legacy error details.
    pub errors: Vec<ApiErrorItem>,
}

/// One entry in the legacy `errors` list of an [ApiError].
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ApiErrorItem {
    pub domain: String,
    pub reason: String,
    pub message: String,
}

impl ApiError {
    fn parse(payload: &Bytes) -> Option<Self> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            error: ApiError,
        }
        serde_json::from_slice::<Wrapper>(payload)
            .ok()
            .map(|w| w.error)
    }
}
