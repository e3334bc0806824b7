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

//! A time-bounded retry loop.
//!
//! The loop is bounded by wall-clock time, never by the number of attempts.
//! Failures are retried while any retry predicate matches them and no abort
//! predicate does. Once the next backoff would reach the deadline the
//! loop returns an [exhausted][Error::is_exhausted] error wrapping the last
//! failure.

use crate::Result;
use crate::backoff_policy::BackoffPolicy;
use crate::error::Error;
use crate::exponential_backoff::ExponentialBackoff;
use crate::retry_predicate::{RetryPredicate, any_matches, is_retryable_error};
use std::time::Duration;

/// Calls `inner` until it succeeds, fails with a non-retryable error, or
/// `timeout` elapses.
///
/// `inner` receives the time remaining in the loop, use it to bound each
/// attempt. The default retry predicates always apply, `predicates` adds more.
///
/// # Example
/// ```
/// # use google_provider_transport::retry_loop::retry_time_duration;
/// # use google_provider_transport::retry_predicate::*;
/// # use google_provider_transport::Result;
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # async fn create_peering() -> Result<String> { Ok("done".into()) }
/// async fn sample() -> Result<String> {
///     let predicates: [RetryPredicate; 1] = [Arc::new(is_peering_operation_in_progress)];
///     retry_time_duration(
///         async |_remaining| create_peering().await,
///         Duration::from_secs(240),
///         &predicates,
///     )
///     .await
/// }
/// ```
pub async fn retry_time_duration<F, T>(
    inner: F,
    timeout: Duration,
    predicates: &[RetryPredicate],
) -> Result<T>
where
    F: AsyncFnMut(Duration) -> Result<T> + Send,
{
    let sleep = async |d| tokio::time::sleep(d).await;
    retry_loop(
        inner,
        sleep,
        timeout,
        predicates,
        &[],
        &ExponentialBackoff::default(),
    )
    .await
}

/// Runs the retry loop with an injected `sleep` and backoff policy.
pub(crate) async fn retry_loop<F, S, T>(
    mut inner: F,
    sleep: S,
    timeout: Duration,
    retry_predicates: &[RetryPredicate],
    abort_predicates: &[RetryPredicate],
    backoff_policy: &dyn BackoffPolicy,
) -> Result<T>
where
    F: AsyncFnMut(Duration) -> Result<T> + Send,
    S: AsyncFn(Duration) -> () + Send,
{
    let loop_start = tokio::time::Instant::now();
    let mut attempt_count = 0_u32;
    loop {
        let remaining_time = timeout.saturating_sub(loop_start.elapsed());
        attempt_count += 1;
        let error = match inner(remaining_time).await {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        if let Some(reason) = any_matches(&error, abort_predicates) {
            tracing::debug!("aborting retries: {reason} - {error}");
            return Err(error);
        }
        if !is_retryable_error(&error, retry_predicates) {
            return Err(error);
        }
        let delay = backoff_policy.on_failure(loop_start.into_std(), attempt_count);
        let remaining_time = timeout.saturating_sub(loop_start.elapsed());
        if remaining_time <= delay {
            return Err(Error::exhausted(error));
        }
        tracing::debug!(attempt_count, ?delay, "retrying after error: {error}");
        sleep(delay).await;
        // The sleep may overshoot, never start an attempt without time left.
        if loop_start.elapsed() >= timeout {
            return Err(Error::exhausted(error));
        }
    }
}
