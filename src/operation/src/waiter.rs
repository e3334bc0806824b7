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

//! Polls long-running operations until they reach a terminal state.
//!
//! Each API family represents operations differently. A [Waiter] wraps the
//! family's operation type and tells [operation_wait] how to read its state,
//! how to extract its error, and how to query a fresh snapshot.

use crate::polling::poll_loop;
use crate::{Error, PollResult, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use transport::ClientConfig;
use transport::exponential_backoff::ExponentialBackoffBuilder;
use transport::polling_backoff_policy::{FixedInterval, PollingBackoffPolicy};
use transport::retry_predicate::is_not_found_retryable_error;
use transport::{SendRequestOptions, send_request};

/// Interprets the operation type of one API family.
///
/// The waiter holds the latest snapshot of the operation. [operation_wait]
/// replaces it, via [set_op][Waiter::set_op], each time it queries the
/// service.
pub trait Waiter {
    /// The operation type returned by the service.
    type Operation;

    /// The current state of the operation, e.g. `RUNNING`.
    fn state(&self) -> String;

    /// The error reported by the operation, if it completed with one.
    fn error(&self) -> Option<transport::Error>;

    /// Returns true if the error reported by the operation is transient, or if
    /// an error querying the operation should be ignored.
    fn is_retryable(&self, _error: &transport::Error) -> bool {
        false
    }

    /// Replaces the operation snapshot.
    fn set_op(&mut self, op: Self::Operation);

    /// Queries the service for a fresh snapshot of the operation.
    fn query_op(&self) -> impl Future<Output = transport::Result<Self::Operation>> + Send;

    /// The name of the operation.
    fn op_name(&self) -> String;

    /// The states where the operation is still running.
    fn pending_states(&self) -> &[&str];

    /// The states where the operation has completed.
    fn target_states(&self) -> &[&str];
}

/// Polls the operation held by `waiter` until it completes.
///
/// If the operation is already complete no requests are made. Otherwise the
/// operation is polled every `poll_interval`, or with exponential backoff if
/// no interval is given, until it completes or `timeout` elapses.
///
/// On success the waiter holds the final snapshot of the operation.
pub async fn operation_wait<W>(
    waiter: &mut W,
    activity: &str,
    timeout: Duration,
    poll_interval: Option<Duration>,
) -> Result<()>
where
    W: Waiter + Send,
{
    let backoff: Arc<dyn PollingBackoffPolicy> = match poll_interval {
        Some(interval) => Arc::new(FixedInterval::new(interval)),
        None => Arc::new(ExponentialBackoffBuilder::polling().clamp()),
    };
    wait_with_backoff(waiter, activity, timeout, backoff.as_ref()).await
}

/// Like [operation_wait], with the polling policy from `config`.
pub(crate) async fn operation_wait_with_config<W>(
    waiter: &mut W,
    config: &ClientConfig,
    activity: &str,
    timeout: Duration,
) -> Result<()>
where
    W: Waiter + Send,
{
    match config.poll_interval() {
        Some(_) => operation_wait(waiter, activity, timeout, config.poll_interval()).await,
        None => {
            let backoff = config.polling_backoff_policy();
            wait_with_backoff(waiter, activity, timeout, backoff.as_ref()).await
        }
    }
}

async fn wait_with_backoff<W>(
    waiter: &mut W,
    activity: &str,
    timeout: Duration,
    backoff: &dyn PollingBackoffPolicy,
) -> Result<()>
where
    W: Waiter + Send,
{
    let sleep = async |d| tokio::time::sleep(d).await;
    wait_loop(waiter, sleep, activity, timeout, backoff).await
}

pub(crate) async fn wait_loop<W, S>(
    waiter: &mut W,
    sleep: S,
    activity: &str,
    timeout: Duration,
    backoff: &dyn PollingBackoffPolicy,
) -> Result<()>
where
    W: Waiter + Send,
    S: AsyncFn(Duration) -> () + Send,
{
    // Only a completed starting handle ends the wait without polling, any
    // other state is refreshed from the service first.
    if waiter.target_states().contains(&waiter.state().as_str()) {
        match classify(waiter) {
            PollResult::Success => return Ok(()),
            PollResult::Fatal(e) => return Err(Error::failed(activity, e)),
            PollResult::Pending(_) => {}
        }
    }
    if waiter.op_name().is_empty() {
        return Err(Error::failed(
            activity,
            transport::Error::other("cannot wait for an operation without a name"),
        ));
    }
    let poll = async || match waiter.query_op().await {
        Ok(op) => {
            waiter.set_op(op);
            classify(waiter)
        }
        Err(e) if e.is_exhausted() || e.is_deserialization() || waiter.is_retryable(&e) => {
            PollResult::pending(format!("error while retrieving operation: {e}"))
        }
        Err(e) => PollResult::Fatal(e),
    };
    poll_loop(poll, sleep, activity, timeout, 1, backoff).await
}

fn classify<W: Waiter>(waiter: &W) -> PollResult {
    let state = waiter.state();
    tracing::debug!(
        "got {state} while polling for operation {}",
        waiter.op_name()
    );
    if waiter.pending_states().contains(&state.as_str()) {
        return PollResult::Pending(state);
    }
    if waiter.target_states().contains(&state.as_str()) {
        return match waiter.error() {
            None => PollResult::Success,
            Some(e) if waiter.is_retryable(&e) => {
                PollResult::pending(format!("{state}, with retryable error: {e}"))
            }
            Some(e) => PollResult::Fatal(e),
        };
    }
    PollResult::fatal(format!("unexpected operation state: {state}"))
}

/// Fetches an operation, retrying transient errors and 404s.
///
/// Operations may not be visible for a short time after the mutation that
/// created them.
pub(crate) async fn get_operation<O>(
    config: &ClientConfig,
    url: String,
    project: Option<&str>,
    user_agent: Option<&str>,
) -> transport::Result<O>
where
    O: DeserializeOwned,
{
    let mut options = SendRequestOptions::new(http::Method::GET, url)
        .set_retry_predicates([is_not_found_retryable_error("GET operation")]);
    if let Some(project) = project {
        options = options.set_project(project);
    }
    if let Some(user_agent) = user_agent {
        options = options.set_user_agent(user_agent);
    }
    let response = send_request(config, options)
        .await?
        .ok_or_else(|| transport::Error::deser("empty response while reading operation"))?;
    serde_json::from_value(response).map_err(transport::Error::deser)
}

/// Converts the operation returned by a mutating call into `O`.
pub(crate) fn to_operation<O>(activity: &str, op: serde_json::Value) -> Result<O>
where
    O: DeserializeOwned,
{
    serde_json::from_value(op).map_err(|e| Error::failed(activity, transport::Error::deser(e)))
}

/// Returns the last segment of a resource URL, e.g. the zone name in
/// `https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a`.
pub(crate) fn resource_name_from_self_link(link: &str) -> &str {
    link.trim_end_matches('/').rsplit('/').next().unwrap_or(link)
}
