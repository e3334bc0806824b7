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

//! Defines the trait for polling backoff policies and common implementations.
//!
//! The operation waiters poll long-running operations until they complete.
//! Between polls they back off to avoid overloading the service.
//!
//! These policies should not be confused with retry backoff policies. Polling
//! backoff policies do not use jitter, while retry policies should.
//!
//! Two implementations are provided. [FixedInterval] polls at a constant rate,
//! this is what the operation waiters use when the caller asks for a specific
//! poll interval. [ExponentialBackoff][crate::exponential_backoff::ExponentialBackoff]
//! grows the period exponentially until some limit is reached, which works
//! well when the expected execution time is not known in advance.
//!
//! # Example
//! ```
//! # use google_provider_transport::exponential_backoff::Error;
//! # use google_provider_transport::exponential_backoff::ExponentialBackoffBuilder;
//! use std::time::Duration;
//!
//! let policy = ExponentialBackoffBuilder::new()
//!     .with_initial_delay(Duration::from_secs(1))
//!     .with_maximum_delay(Duration::from_secs(10))
//!     .build()?;
//! // `policy` implements the `PollingBackoffPolicy` trait.
//! # Ok::<(), Error>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Defines the trait implemented by all polling backoff strategies.
pub trait PollingBackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the wait period before the next poll.
    ///
    /// # Parameters
    /// * `loop_start` - when the polling loop started.
    /// * `attempt_count` - the number of polls so far. This method is always
    ///   called after the first poll.
    fn wait_period(&self, loop_start: std::time::Instant, attempt_count: u32) -> Duration;
}

/// A helper type to use [PollingBackoffPolicy] in [ClientConfig][crate::ClientConfig].
#[derive(Clone, Debug)]
pub struct PollingBackoffPolicyArg(pub(crate) Arc<dyn PollingBackoffPolicy>);

impl<T: PollingBackoffPolicy + 'static> std::convert::From<T> for PollingBackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingBackoffPolicy>> for PollingBackoffPolicyArg {
    fn from(value: Arc<dyn PollingBackoffPolicy>) -> Self {
        Self(value)
    }
}

/// Polls at a fixed interval.
///
/// # Example
/// ```
/// # use google_provider_transport::polling_backoff_policy::*;
/// use std::time::{Duration, Instant};
/// let policy = FixedInterval::new(Duration::from_secs(2));
/// assert_eq!(policy.wait_period(Instant::now(), 7), Duration::from_secs(2));
/// ```
#[derive(Clone, Debug)]
pub struct FixedInterval(Duration);

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self(interval)
    }
}

impl PollingBackoffPolicy for FixedInterval {
    fn wait_period(&self, _loop_start: std::time::Instant, _attempt_count: u32) -> Duration {
        self.0
    }
}
