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

use std::time::Duration;

/// The error type for the waiters and the polling loop.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The wait did not complete before its deadline.
    ///
    /// This is never the service's fault, the operation may still complete.
    #[error(
        "timeout after {elapsed:?} waiting for {activity}, last state: {}",
        .last_state.as_deref().unwrap_or("none")
    )]
    Timeout {
        activity: String,
        elapsed: Duration,
        last_state: Option<String>,
    },

    /// The wait stopped because of a permanent error.
    ///
    /// Use `source` to examine the error, it may be an HTTP error reading the
    /// resource or the error reported by a completed operation.
    #[error("error waiting for {activity}: {source}")]
    Failed {
        activity: String,
        source: transport::Error,
    },
}

impl Error {
    pub(crate) fn timeout<A: Into<String>>(
        activity: A,
        elapsed: Duration,
        last_state: Option<String>,
    ) -> Self {
        Self::Timeout {
            activity: activity.into(),
            elapsed,
            last_state,
        }
    }

    pub(crate) fn failed<A: Into<String>>(activity: A, source: transport::Error) -> Self {
        Self::Failed {
            activity: activity.into(),
            source,
        }
    }

    /// The wait timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The activity named by the caller when the wait started.
    pub fn activity(&self) -> &str {
        match self {
            Self::Timeout { activity, .. } | Self::Failed { activity, .. } => activity,
        }
    }

    /// The underlying error, if the wait failed with a permanent error.
    pub fn transport_error(&self) -> Option<&transport::Error> {
        match self {
            Self::Failed { source, .. } => Some(source),
            Self::Timeout { .. } => None,
        }
    }
}
