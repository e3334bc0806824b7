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

//! The polling loop shared by every waiter.
//!
//! The loop reads, classifies the read with a check function, and sleeps
//! between reads following a [PollingBackoffPolicy]. The first read happens
//! immediately. The loop is bounded by wall-clock time, and each read is
//! bounded by the time remaining.

use crate::{Error, PollResult, Result};
use std::time::Duration;
use transport::exponential_backoff::ExponentialBackoffBuilder;
use transport::polling_backoff_policy::PollingBackoffPolicy;

/// Reads until `check` reports success `target_occurrences` times in a row.
///
/// Use this to wait for eventually consistent resources. `read` fetches the
/// resource, `check` classifies the result, see the [checks][crate::checks]
/// module for common classifiers. A `Pending` result resets the count of
/// consecutive successes. A `Fatal` result stops the loop at once.
///
/// # Example
/// ```
/// # use google_provider_operation::{checks, polling_wait_time, Result};
/// # use transport::{ClientConfig, SendRequestOptions, send_request};
/// # use std::time::Duration;
/// async fn wait_for_topic(config: &ClientConfig, url: &str) -> Result<()> {
///     let read = async || {
///         send_request(config, SendRequestOptions::new(http::Method::GET, url)).await
///     };
///     polling_wait_time(
///         read,
///         checks::poll_check_for_existence,
///         "Creating Topic",
///         Duration::from_secs(20 * 60),
///         1,
///     )
///     .await
/// }
/// ```
pub async fn polling_wait_time<R, C, T>(
    mut read: R,
    mut check: C,
    activity: &str,
    timeout: Duration,
    target_occurrences: u32,
) -> Result<()>
where
    R: AsyncFnMut() -> transport::Result<T> + Send,
    C: FnMut(transport::Result<T>) -> PollResult + Send,
{
    tracing::debug!("{activity}: polling until expected state is read");
    let poll = async || check(read().await);
    let sleep = async |d| tokio::time::sleep(d).await;
    let backoff = ExponentialBackoffBuilder::polling().clamp();
    poll_loop(poll, sleep, activity, timeout, target_occurrences, &backoff).await
}

/// Runs the polling loop with an injected `sleep` and backoff policy.
pub(crate) async fn poll_loop<P, S>(
    mut poll: P,
    sleep: S,
    activity: &str,
    timeout: Duration,
    target_occurrences: u32,
    backoff_policy: &dyn PollingBackoffPolicy,
) -> Result<()>
where
    P: AsyncFnMut() -> PollResult + Send,
    S: AsyncFn(Duration) -> () + Send,
{
    let target_occurrences = target_occurrences.max(1);
    let loop_start = tokio::time::Instant::now();
    let mut attempt_count = 0_u32;
    let mut successes = 0_u32;
    let mut last_state: Option<String> = None;
    loop {
        let remaining_time = timeout.saturating_sub(loop_start.elapsed());
        if attempt_count > 0 && remaining_time.is_zero() {
            return Err(Error::timeout(activity, loop_start.elapsed(), last_state));
        }
        attempt_count += 1;
        let result = match tokio::time::timeout(remaining_time, poll()).await {
            Ok(r) => r,
            Err(_) => return Err(Error::timeout(activity, loop_start.elapsed(), last_state)),
        };
        match result {
            PollResult::Success => {
                successes += 1;
                if successes >= target_occurrences {
                    return Ok(());
                }
                tracing::debug!(
                    "{activity}: expected state seen {successes} of {target_occurrences} times"
                );
            }
            PollResult::Pending(state) => {
                successes = 0;
                tracing::debug!("{activity}: pending, state is {state}");
                last_state = Some(state);
            }
            PollResult::Fatal(e) => return Err(Error::failed(activity, e)),
        }
        let delay = backoff_policy.wait_period(loop_start.into_std(), attempt_count);
        let remaining_time = timeout.saturating_sub(loop_start.elapsed());
        sleep(delay.min(remaining_time)).await;
    }
}
