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

//! Classifiers for [polling_wait_time][crate::polling_wait_time].
//!
//! Each function takes the result of one read and decides whether the wait is
//! over, should continue, or must stop with an error.

use crate::PollResult;
use serde::Deserialize;
use serde_json::Value;

/// Waits for a resource to exist.
///
/// A 404 is pending, any other error is fatal, and any successful read means
/// the resource exists.
pub fn poll_check_for_existence<T>(result: transport::Result<T>) -> PollResult {
    match result {
        Ok(_) => PollResult::Success,
        Err(e) if e.http_status_code() == Some(404) => PollResult::pending("not found"),
        Err(e) => PollResult::Fatal(e),
    }
}

/// Like [poll_check_for_existence], but a 403 is also pending.
///
/// Freshly created resources may reject reads with a 403 until their IAM
/// policy propagates.
pub fn poll_check_for_existence_with_403<T>(result: transport::Result<T>) -> PollResult {
    match result {
        Err(e) if e.http_status_code() == Some(403) => PollResult::pending("forbidden"),
        r => poll_check_for_existence(r),
    }
}

/// Waits for a resource to be fully deleted.
///
/// A 404 means the resource is gone, any other error is fatal, and any
/// successful read means the resource still exists.
pub fn poll_check_for_absence<T>(result: transport::Result<T>) -> PollResult {
    match result {
        Ok(_) => PollResult::pending("found"),
        Err(e) if e.http_status_code() == Some(404) => PollResult::Success,
        Err(e) => PollResult::Fatal(e),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct KnativeResource {
    status: Option<KnativeStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct KnativeStatus {
    observed_generation: i64,
    conditions: Vec<KnativeCondition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct KnativeCondition {
    #[serde(rename = "type")]
    condition_type: String,
    status: String,
    reason: String,
    message: String,
}

fn parse_knative(result: transport::Result<Option<Value>>) -> Result<KnativeResource, PollResult> {
    let value = result.map_err(PollResult::Fatal)?.unwrap_or(Value::Null);
    if value.is_null() {
        return Ok(KnativeResource::default());
    }
    serde_json::from_value(value).map_err(|e| PollResult::Fatal(transport::Error::deser(e)))
}

fn classify_ready(status: &KnativeStatus) -> PollResult {
    let Some(ready) = status
        .conditions
        .iter()
        .find(|c| c.condition_type == "Ready")
    else {
        return PollResult::pending("no status yet");
    };
    match ready.status.as_str() {
        "True" => PollResult::Success,
        "False" => PollResult::fatal(format!(
            "resource is in failed state \"Ready:False\", message: {}",
            ready.message
        )),
        // The resource is functional, only waiting for external DNS verification.
        "Unknown" if ready.reason == "CertificatePending" => PollResult::Success,
        other => PollResult::pending(format!("{other}:{}", ready.message)),
    }
}

/// Waits for a Knative-style resource (e.g. Cloud Run) to become ready.
///
/// The resource status carries a list of conditions. Only the `Ready`
/// condition is examined.
///
/// # Example
/// ```
/// # use google_provider_operation::{checks::poll_check_knative_status, PollResult};
/// let resource = serde_json::json!({"status": {"conditions": [
///     {"type": "Ready", "status": "Unknown", "message": "Deploying revision"},
/// ]}});
/// let result = poll_check_knative_status(Ok(Some(resource)));
/// assert!(matches!(result, PollResult::Pending(s) if s == "Unknown:Deploying revision"));
/// ```
pub fn poll_check_knative_status(result: transport::Result<Option<Value>>) -> PollResult {
    match parse_knative(result) {
        Ok(resource) => classify_ready(&resource.status.unwrap_or_default()),
        Err(poll) => poll,
    }
}

/// Returns a classifier that waits for the service to observe
/// `expected_generation`, and then for the resource to become ready.
///
/// Use this after an update, the `Ready` condition may still describe the
/// previous generation.
pub fn poll_check_knative_status_func(
    expected_generation: i64,
) -> impl FnMut(transport::Result<Option<Value>>) -> PollResult + Send + Clone {
    move |result| {
        let status = match parse_knative(result) {
            Ok(r) => r.status.unwrap_or_default(),
            Err(poll) => return poll,
        };
        if status.observed_generation < expected_generation {
            return PollResult::pending("waiting for observed generation to match");
        }
        classify_ready(&status)
    }
}

/// Waits for a stateful managed instance group per-instance config to be
/// deleted.
///
/// The read returns the per-instance config, or `None` once it is gone. A
/// config in the `DELETING` state is pending, any other state is an error.
pub fn poll_check_instance_config_deleted(
    result: transport::Result<Option<Value>>,
) -> PollResult {
    let config = match result {
        Err(e) => return PollResult::Fatal(e),
        Ok(None) | Ok(Some(Value::Null)) => return PollResult::Success,
        Ok(Some(v)) => v,
    };
    match config.get("status").and_then(Value::as_str) {
        Some("DELETING") => PollResult::pending("DELETING"),
        Some(status) => PollResult::fatal(format!(
            "expected per-instance config to be DELETING, got {status}"
        )),
        None => PollResult::fatal("expected per-instance config to be DELETING, got no status"),
    }
}
