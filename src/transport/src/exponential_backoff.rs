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

//! Truncated exponential backoff, for retries and for polling.
//!
//! The same policy type serves both loops. Between retry attempts the delay is
//! drawn uniformly from `[0, delay]` (full jitter), so concurrent Terraform
//! resources do not retry in lockstep. Between polls of an operation the delay
//! is used as-is.

use std::time::Duration;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_SCALING: f64 = 32.0;

/// Invalid parameters for [ExponentialBackoffBuilder::build].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("backoff scaling must be at least 1.0, got {0}")]
    ScalingBelowOne(f64),
    #[error("backoff initial delay must be positive, got {0:?}")]
    ZeroInitialDelay(Duration),
    #[error("backoff maximum delay {maximum:?} is shorter than the initial delay {initial:?}")]
    MaximumBelowInitial { initial: Duration, maximum: Duration },
}

/// Configures an [ExponentialBackoff].
///
/// # Example
/// ```
/// # use google_provider_transport::exponential_backoff::{Error, ExponentialBackoffBuilder};
/// # use google_provider_transport::ClientConfig;
/// use std::time::Duration;
/// // Retry rate-limited APIs more patiently.
/// let backoff = ExponentialBackoffBuilder::new()
///     .with_initial_delay(Duration::from_secs(2))
///     .with_maximum_delay(Duration::from_secs(120))
///     .with_scaling(3.0)
///     .build()?;
/// let config = ClientConfig::new().with_backoff_policy(backoff);
/// # Ok::<(), Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoffBuilder {
    /// Retry parameters: start at one second, double, stop growing at one
    /// minute.
    pub fn new() -> Self {
        let ExponentialBackoff {
            initial_delay,
            maximum_delay,
            scaling,
        } = ExponentialBackoff::default();
        Self {
            initial_delay,
            maximum_delay,
            scaling,
        }
    }

    /// Polling parameters: start at one second, double, stop growing at ten
    /// seconds.
    pub fn polling() -> Self {
        Self::new().with_maximum_delay(Duration::from_secs(10))
    }

    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_delay = v.into();
        self
    }

    pub fn with_maximum_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_delay = v.into();
        self
    }

    /// The factor applied to the delay after each attempt.
    pub fn with_scaling<V: Into<f64>>(mut self, v: V) -> Self {
        self.scaling = v.into();
        self
    }

    /// Validates the parameters and creates the policy.
    pub fn build(self) -> Result<ExponentialBackoff, Error> {
        if self.initial_delay.is_zero() {
            return Err(Error::ZeroInitialDelay(self.initial_delay));
        }
        if self.scaling < 1.0 {
            return Err(Error::ScalingBelowOne(self.scaling));
        }
        if self.maximum_delay < self.initial_delay {
            return Err(Error::MaximumBelowInitial {
                initial: self.initial_delay,
                maximum: self.maximum_delay,
            });
        }
        Ok(self.into_policy())
    }

    /// Creates the policy, forcing out-of-range parameters into range.
    ///
    /// The maximum delay is kept within `[1s, 1 day]`, the initial delay within
    /// `[1ms, maximum]`, and the scaling within `[1.0, 32.0]`.
    ///
    /// ```
    /// # use google_provider_transport::exponential_backoff::ExponentialBackoffBuilder;
    /// # use google_provider_transport::polling_backoff_policy::PollingBackoffPolicy;
    /// use std::time::{Duration, Instant};
    /// let backoff = ExponentialBackoffBuilder::polling()
    ///     .with_maximum_delay(Duration::ZERO)
    ///     .clamp();
    /// assert_eq!(backoff.wait_period(Instant::now(), 5), Duration::from_secs(1));
    /// ```
    pub fn clamp(self) -> ExponentialBackoff {
        let maximum_delay = self.maximum_delay.clamp(Duration::from_secs(1), ONE_DAY);
        Self {
            maximum_delay,
            initial_delay: self
                .initial_delay
                .clamp(Duration::from_millis(1), maximum_delay),
            scaling: self.scaling.clamp(1.0, MAX_SCALING),
        }
        .into_policy()
    }

    fn into_policy(self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_delay: self.initial_delay,
            maximum_delay: self.maximum_delay,
            scaling: self.scaling,
        }
    }
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A truncated exponential backoff policy.
///
/// The n-th attempt waits `initial_delay * scaling^(n-1)`, capped at
/// `maximum_delay`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoff {
    fn delay(&self, attempt_count: u32) -> Duration {
        // powi() takes an i32, larger exponents are capped anyway.
        let exponent = attempt_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.scaling.powi(exponent);
        let cap = self.maximum_delay.div_duration_f64(self.initial_delay);
        if factor < cap {
            self.initial_delay.mul_f64(factor)
        } else {
            self.maximum_delay
        }
    }

    fn delay_with_jitter(&self, attempt_count: u32, rng: &mut impl rand::Rng) -> Duration {
        rng.random_range(Duration::ZERO..=self.delay(attempt_count))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(60),
            scaling: 2.0,
        }
    }
}

impl crate::backoff_policy::BackoffPolicy for ExponentialBackoff {
    fn on_failure(&self, _loop_start: std::time::Instant, attempt_count: u32) -> Duration {
        self.delay_with_jitter(attempt_count, &mut rand::rng())
    }
}

impl crate::polling_backoff_policy::PollingBackoffPolicy for ExponentialBackoff {
    fn wait_period(&self, _loop_start: std::time::Instant, attempt_count: u32) -> Duration {
        self.delay(attempt_count)
    }
}
