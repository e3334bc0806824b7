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

//! Rules to classify errors as retryable.
//!
//! A retry predicate examines an [Error] and returns `Some(reason)` if the
//! error is transient and the request should be retried. The reason is logged
//! and has no other effect. Predicates are pure functions of the error, they
//! can be freely composed: the transport retries a failure if *any* predicate
//! matches.
//!
//! [default_retry_predicates()] returns the predicates applied to every
//! request. The remaining functions in this module form an opt-in catalog,
//! callers add them to [SendRequestOptions][crate::SendRequestOptions] when a
//! service is known to report transient failures in an unusual way.
//!
//! # Example
//! ```
//! # use google_provider_transport::retry_predicate::*;
//! # use google_provider_transport::Error;
//! let error = Error::http(
//!     409,
//!     http::HeaderMap::new(),
//!     bytes::Bytes::from_static(b"Operation is already in progress"),
//! );
//! assert!(is_app_engine_retryable_error(&error).is_some());
//! let custom: RetryPredicate = std::sync::Arc::new(is_app_engine_retryable_error);
//! assert!(is_retryable_error(&error, &[custom]));
//! ```

use crate::error::Error;
use std::error::Error as StdError;
use std::sync::{Arc, LazyLock};

/// A rule to classify errors as retryable.
///
/// Returns `Some(reason)` if the error is retryable.
pub type RetryPredicate = Arc<dyn Fn(&Error) -> Option<String> + Send + Sync>;

/// Returns the predicates applied to every request.
pub fn default_retry_predicates() -> Vec<RetryPredicate> {
    let predicates: [RetryPredicate; 8] = [
        Arc::new(is_network_temporary_error),
        Arc::new(is_network_timeout_error),
        Arc::new(is_io_eof_error),
        Arc::new(is_connection_reset_network_error),
        Arc::new(is_common_retryable_error_code),
        Arc::new(is_409_operation_in_progress_error),
        Arc::new(is_subnetwork_unready_error),
        Arc::new(is_403_quota_exceeded_per_minute_error),
    ];
    predicates.into()
}

/// Returns true if any of the default predicates, or any of `custom`, matches
/// the error or any error in its [source][std::error::Error::source] chain.
pub fn is_retryable_error(error: &Error, custom: &[RetryPredicate]) -> bool {
    let defaults = default_retry_predicates();
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(e) = current {
        if let Some(e) = e.downcast_ref::<Error>() {
            if let Some(reason) = defaults.iter().chain(custom.iter()).find_map(|p| p(e)) {
                tracing::debug!("dismissed an error as retryable. {reason} - {e}");
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Returns the reason of the first matching predicate. Used for abort
/// predicates, which stop the retry loop even when the error is retryable.
pub(crate) fn any_matches(error: &Error, predicates: &[RetryPredicate]) -> Option<String> {
    predicates.iter().find_map(|p| p(error))
}

fn find_source<T: StdError + 'static>(error: &Error) -> Option<&T> {
    let mut current: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(e) = current {
        if let Some(t) = e.downcast_ref::<T>() {
            return Some(t);
        }
        current = e.source();
    }
    None
}

fn io_error_kind(error: &Error) -> Option<std::io::ErrorKind> {
    find_source::<std::io::Error>(error).map(|e| e.kind())
}

fn http_match(error: &Error, code: u16, needle: &str) -> bool {
    error.http_status_code() == Some(code)
        && error
            .http_body()
            .is_some_and(|b| b.contains(needle))
}

fn http_match_lowercase(error: &Error, code: u16, needle: &str) -> bool {
    error.http_status_code() == Some(code)
        && error
            .http_body()
            .is_some_and(|b| b.to_lowercase().contains(needle))
}

/// Connection failures, the request never reached the service.
pub fn is_network_temporary_error(error: &Error) -> Option<String> {
    if !error.is_io() {
        return None;
    }
    let connect = find_source::<reqwest::Error>(error).is_some_and(|e| e.is_connect());
    let refused = matches!(
        io_error_kind(error),
        Some(std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionAborted)
    );
    (connect || refused).then(|| "marked as temporary".to_string())
}

/// Network timeouts.
pub fn is_network_timeout_error(error: &Error) -> Option<String> {
    let timeout = error.is_timeout()
        || find_source::<reqwest::Error>(error).is_some_and(|e| e.is_timeout())
        || io_error_kind(error) == Some(std::io::ErrorKind::TimedOut);
    timeout.then(|| "marked as timeout".to_string())
}

/// The connection closed in the middle of the response.
pub fn is_io_eof_error(error: &Error) -> Option<String> {
    (io_error_kind(error) == Some(std::io::ErrorKind::UnexpectedEof))
        .then(|| "got unexpected EOF".to_string())
}

/// The peer reset the connection.
pub fn is_connection_reset_network_error(error: &Error) -> Option<String> {
    let reset = io_error_kind(error) == Some(std::io::ErrorKind::ConnectionReset)
        || error.to_string().ends_with("connection reset by peer");
    reset.then(|| format!("reset connection error: {error}"))
}

/// HTTP status codes that are retryable for all Google APIs.
pub fn is_common_retryable_error_code(error: &Error) -> Option<String> {
    match error.http_status_code() {
        Some(code @ (429 | 500 | 502 | 503)) => Some(format!("retryable error code {code}")),
        _ => None,
    }
}

/// Some APIs, notably Cloud SQL, reject concurrent calls with a 409.
pub fn is_409_operation_in_progress_error(error: &Error) -> Option<String> {
    http_match(error, 409, "operationInProgress").then(|| "operation still in progress".to_string())
}

/// Compute Engine subnetworks are briefly unready after some operations.
pub fn is_subnetwork_unready_error(error: &Error) -> Option<String> {
    (http_match(error, 400, "resourceNotReady") && http_match(error, 400, "subnetworks"))
        .then(|| "subnetwork not ready".to_string())
}

static QUOTA_PER_MINUTE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"Quota exceeded for quota metric '(?P<Metric>.*)' and limit '(?P<Limit>.* per minute)' of service",
    )
    .expect("hard-coded regex is valid")
});

/// Some APIs report rate limits as 403 instead of 429.
pub fn is_403_quota_exceeded_per_minute_error(error: &Error) -> Option<String> {
    if error.http_status_code() != Some(403) {
        return None;
    }
    let body = error.http_body()?;
    let captures = QUOTA_PER_MINUTE.captures(&body)?;
    let metric = captures.name("Metric").map_or("", |m| m.as_str());
    let limit = captures.name("Limit").map_or("", |m| m.as_str());
    tracing::debug!("quota exceeded for quota metric `{metric}`");
    Some(format!("waiting for quota limit {limit} to refresh"))
}

const FINGERPRINT_FAIL_ERRORS: [&str; 2] = [
    "Invalid fingerprint.",
    "Supplied fingerprint does not match current metadata fingerprint.",
];

/// The update used a stale fingerprint, re-reading and retrying may succeed.
pub fn is_fingerprint_error(error: &Error) -> Option<String> {
    FINGERPRINT_FAIL_ERRORS
        .iter()
        .any(|msg| http_match(error, 412, msg))
        .then(|| "fingerprint mismatch".to_string())
}

/// A permission created in the same configuration has not propagated yet.
pub fn iam_member_missing(error: &Error) -> Option<String> {
    http_match(error, 400, "permission")
        .then(|| "waiting for IAM member permissions to propagate".to_string())
}

/// The organization policy of a new project has not propagated to Pub/Sub.
pub fn pubsub_topic_project_not_ready(error: &Error) -> Option<String> {
    http_match(error, 400, "retry this operation").then(|| {
        "waiting for Pub/Sub topic's project to initialize with organization policy".to_string()
    })
}

/// A Cloud SQL operation completed with an internal error.
pub fn is_sql_internal_error(error: &Error) -> Option<String> {
    let op = error.operation_error()?;
    op.errors.first().filter(|e| e.code == "INTERNAL_ERROR").map(|_| {
        "received an internal error, which is sometimes retryable for some SQL resources"
            .to_string()
    })
}

/// Cloud SQL rejects concurrent operations on the same instance with a 409.
pub fn is_sql_operation_in_progress_error(error: &Error) -> Option<String> {
    if error.http_status_code() != Some(409) || http_match(error, 409, "instanceAlreadyExists") {
        return None;
    }
    Some("waiting for other concurrent Cloud SQL operations to finish".to_string())
}

/// Service Usage is still activating a service, possibly a dependency.
pub fn service_usage_service_being_activated(error: &Error) -> Option<String> {
    http_match(error, 400, "Another activation or deactivation is in progress")
        .then(|| "waiting for same service activation/deactivation to finish".to_string())
}

/// BigQuery reports concurrent IAM edits as exceeding the edit quota.
pub fn is_bigquery_iam_quota_error(error: &Error) -> Option<String> {
    http_match_lowercase(error, 403, "exceeded rate limits")
        .then(|| "waiting for BigQuery edit quota to refresh".to_string())
}

/// Cloud Monitoring rejects concurrent edits.
pub fn is_monitoring_concurrent_edit_error(error: &Error) -> Option<String> {
    (http_match_lowercase(error, 409, "too many concurrent edits")
        || http_match_lowercase(error, 409, "could not fulfill the request"))
    .then(|| "waiting for other Monitoring changes to finish".to_string())
}

/// Like [is_common_retryable_error_code], except Filestore quota errors (429)
/// are not retried.
pub fn is_not_filestore_quota_error(error: &Error) -> Option<String> {
    if error.http_status_code() == Some(429) {
        return None;
    }
    is_common_retryable_error_code(error)
}

/// App Engine rejects concurrent operations, and its service agent (P4SA)
/// may not have propagated after the application is created.
pub fn is_app_engine_retryable_error(error: &Error) -> Option<String> {
    if http_match_lowercase(error, 409, "operation is already in progress") {
        return Some("waiting for other concurrent App Engine changes to finish".to_string());
    }
    if http_match_lowercase(error, 404, "unable to retrieve p4sa") {
        return Some("waiting for P4SA propagation to GAIA".to_string());
    }
    None
}

/// Cloud KMS crypto key versions in the `PENDING_GENERATION` state.
pub fn is_crypto_key_versions_pending_generation(error: &Error) -> Option<String> {
    http_match(error, 400, "PENDING_GENERATION")
        .then(|| "waiting for pending key generation".to_string())
}

/// Returns a predicate retrying any 404. `op_type` names the operation in the
/// log message.
pub fn is_not_found_retryable_error<T: Into<String>>(op_type: T) -> RetryPredicate {
    let op_type = op_type.into();
    Arc::new(move |error: &Error| {
        (error.http_status_code() == Some(404)).then(|| format!("retry 404s for {op_type}"))
    })
}

/// Dataflow jobs can only be updated while running or draining.
pub fn is_dataflow_job_update_retryable_error(error: &Error) -> Option<String> {
    http_match(error, 404, "in RUNNING OR DRAINING state")
        .then(|| "waiting for job to be in a valid state".to_string())
}

/// Only one peering operation can run on a network at a time.
pub fn is_peering_operation_in_progress(error: &Error) -> Option<String> {
    http_match(error, 400, "There is a peering operation in progress")
        .then(|| "waiting for peering operation to complete".to_string())
}

/// Cloud Functions may fail to pull freshly uploaded source code.
pub fn is_cloud_functions_source_code_error(error: &Error) -> Option<String> {
    let op = error.operation_error()?;
    (op.code == Some(3) && op.message.as_deref() == Some("Failed to retrieve function source code"))
        .then(|| "retry on function failing to pull code from GCS".to_string())
}

/// Datastore index operations contend with each other.
pub fn datastore_index_409_contention(error: &Error) -> Option<String> {
    http_match(error, 409, "too much contention")
        .then(|| "too much contention, waiting for less activity".to_string())
}

/// IAP clients abort concurrent operations.
pub fn iap_client_409_operation(error: &Error) -> Option<String> {
    http_match_lowercase(error, 409, "operation was aborted")
        .then(|| "operation was aborted possibly due to concurrency issue".to_string())
}

/// Cloud Healthcare datasets are briefly unavailable after creation.
pub fn healthcare_dataset_not_initialized(error: &Error) -> Option<String> {
    http_match_lowercase(error, 404, "dataset not initialized")
        .then(|| "dataset not initialized".to_string())
}

/// Cloud Run may still be deleting a resource with the same name.
pub fn is_cloud_run_creation_conflict(error: &Error) -> Option<String> {
    (error.http_status_code() == Some(409))
        .then(|| "saw a 409, waiting until background deletion completes".to_string())
}

/// A service account referenced by an IAM policy was deleted concurrently.
pub fn iam_service_account_not_found(error: &Error) -> Option<String> {
    (http_match(error, 400, "Service account") && http_match(error, 400, "does not exist"))
        .then(|| "service account not found in IAM".to_string())
}

/// Apigee locks resources during concurrent operations.
pub fn is_apigee_retryable_error(error: &Error) -> Option<String> {
    http_match_lowercase(error, 400, "the resource is locked by another operation")
        .then(|| "waiting for other concurrent operations to finish".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OperationError, OperationErrorEntry};
    use bytes::Bytes;
    use http::HeaderMap;
    use test_case::test_case;

    fn http_error(code: u16, body: &'static str) -> Error {
        Error::http(code, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn app_engine_operation_in_progress() {
        let error = http_error(409, "Operation is already in progress");
        assert!(is_app_engine_retryable_error(&error).is_some());
    }

    #[test]
    fn app_engine_p4sa_propagation() {
        let error = http_error(
            404,
            "Unable to retrieve P4SA: [service-111111111111@gcp-gae-service.iam.gserviceaccount.com] from GAIA. Could be GAIA propagation delay or request from deleted apps.",
        );
        assert!(is_app_engine_retryable_error(&error).is_some());
    }

    #[test]
    fn app_engine_missing_page() {
        let error = http_error(404, "Missing page");
        assert!(is_app_engine_retryable_error(&error).is_none());
    }

    #[test]
    fn app_engine_unrelated_error() {
        let error = http_error(500, "Internal server error");
        assert!(is_app_engine_retryable_error(&error).is_none());
    }

    #[test_case(429, true)]
    #[test_case(500, true)]
    #[test_case(502, true)]
    #[test_case(503, true)]
    #[test_case(400, false)]
    #[test_case(404, false)]
    #[test_case(504, false)]
    fn common_codes(code: u16, want: bool) {
        let error = http_error(code, "");
        assert_eq!(is_common_retryable_error_code(&error).is_some(), want);
        assert_eq!(is_retryable_error(&error, &[]), want);
    }

    #[test]
    fn not_filestore_quota() {
        assert!(is_not_filestore_quota_error(&http_error(429, "")).is_none());
        assert!(is_not_filestore_quota_error(&http_error(503, "")).is_some());
        assert!(is_not_filestore_quota_error(&http_error(400, "")).is_none());
    }

    #[test]
    fn default_predicates() {
        let error = http_error(409, r#"{"error": {"errors": [{"reason": "operationInProgress"}]}}"#);
        assert!(is_409_operation_in_progress_error(&error).is_some());
        assert!(is_retryable_error(&error, &[]));

        let error = http_error(
            400,
            "The resource 'projects/p/regions/r/subnetworks/s' is not ready, resourceNotReady",
        );
        assert!(is_subnetwork_unready_error(&error).is_some());
        let error = http_error(400, "resourceNotReady");
        assert!(is_subnetwork_unready_error(&error).is_none());
    }

    #[test]
    fn quota_per_minute() {
        let error = http_error(
            403,
            "Quota exceeded for quota metric 'Queries' and limit 'Queries per minute' of service 'compute.googleapis.com' for consumer 'project_number:123'.",
        );
        let reason = is_403_quota_exceeded_per_minute_error(&error);
        assert_eq!(
            reason.as_deref(),
            Some("waiting for quota limit Queries per minute to refresh")
        );

        let error = http_error(
            403,
            "Quota exceeded for quota metric 'Queries' and limit 'Queries per day' of service 'compute.googleapis.com'",
        );
        assert!(is_403_quota_exceeded_per_minute_error(&error).is_none());
        let error = http_error(403, "The caller does not have permission");
        assert!(is_403_quota_exceeded_per_minute_error(&error).is_none());
    }

    #[test]
    fn io_errors() {
        let error = Error::io(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(is_io_eof_error(&error).is_some());
        assert!(is_retryable_error(&error, &[]));

        let error = Error::io(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(is_connection_reset_network_error(&error).is_some());

        let error = Error::io(std::io::Error::other(
            "read tcp 10.0.0.1:443: connection reset by peer",
        ));
        assert!(is_connection_reset_network_error(&error).is_some());

        let error = Error::io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(is_network_temporary_error(&error).is_some());

        let error = Error::io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(!is_retryable_error(&error, &[]));

        let error = Error::timeout("deadline exceeded");
        assert!(is_network_timeout_error(&error).is_some());
    }

    #[test]
    fn walks_source_chain() {
        let inner = http_error(412, "Invalid fingerprint.");
        let error = Error::other(inner);
        assert!(is_fingerprint_error(&error).is_none());
        assert!(!is_retryable_error(&error, &[]));
        let custom: RetryPredicate = Arc::new(is_fingerprint_error);
        assert!(is_retryable_error(&error, &[custom]));
    }

    #[test]
    fn not_found_retryable() {
        let predicate = is_not_found_retryable_error("GET operation");
        let reason = predicate(&http_error(404, ""));
        assert_eq!(reason.as_deref(), Some("retry 404s for GET operation"));
        assert!(predicate(&http_error(403, "")).is_none());
    }

    #[test]
    fn sql_errors() {
        let error = Error::operation(OperationError::new().set_errors([
            OperationErrorEntry::new()
                .set_code("INTERNAL_ERROR")
                .set_message("An internal error occurred"),
        ]));
        assert!(is_sql_internal_error(&error).is_some());
        let error = Error::operation(
            OperationError::new().set_errors([OperationErrorEntry::new().set_code("QUOTA")]),
        );
        assert!(is_sql_internal_error(&error).is_none());
        assert!(is_sql_internal_error(&http_error(500, "INTERNAL_ERROR")).is_none());

        assert!(is_sql_operation_in_progress_error(&http_error(409, "busy")).is_some());
        assert!(
            is_sql_operation_in_progress_error(&http_error(409, "instanceAlreadyExists")).is_none()
        );
    }

    #[test]
    fn cloud_functions_source_code() {
        let error = Error::operation(
            OperationError::new()
                .set_code(3)
                .set_message("Failed to retrieve function source code"),
        );
        assert!(is_cloud_functions_source_code_error(&error).is_some());
        let error = Error::operation(OperationError::new().set_code(3).set_message("other"));
        assert!(is_cloud_functions_source_code_error(&error).is_none());
    }

    #[test_case(is_fingerprint_error, 412, "Supplied fingerprint does not match current metadata fingerprint.")]
    #[test_case(iam_member_missing, 400, "missing permission on the resource")]
    #[test_case(pubsub_topic_project_not_ready, 400, "please retry this operation")]
    #[test_case(service_usage_service_being_activated, 400, "Another activation or deactivation is in progress")]
    #[test_case(is_bigquery_iam_quota_error, 403, "Exceeded rate limits: too many IAM edits")]
    #[test_case(is_monitoring_concurrent_edit_error, 409, "Too many concurrent edits to the project")]
    #[test_case(is_monitoring_concurrent_edit_error, 409, "Could not fulfill the request")]
    #[test_case(is_crypto_key_versions_pending_generation, 400, "version is PENDING_GENERATION")]
    #[test_case(is_dataflow_job_update_retryable_error, 404, "job must be in RUNNING OR DRAINING state")]
    #[test_case(is_peering_operation_in_progress, 400, "There is a peering operation in progress")]
    #[test_case(datastore_index_409_contention, 409, "too much contention on these datastore entities")]
    #[test_case(iap_client_409_operation, 409, "Operation was aborted")]
    #[test_case(healthcare_dataset_not_initialized, 404, "Dataset not initialized")]
    #[test_case(is_cloud_run_creation_conflict, 409, "resource already exists")]
    #[test_case(iam_service_account_not_found, 400, "Service account foo@bar does not exist.")]
    #[test_case(is_apigee_retryable_error, 400, "The resource is locked by another operation")]
    fn catalog_matches(predicate: fn(&Error) -> Option<String>, code: u16, body: &'static str) {
        let error = http_error(code, body);
        assert!(predicate(&error).is_some(), "{error}");
        let other = if code == 400 { 418 } else { 400 };
        let error = http_error(other, body);
        assert!(predicate(&error).is_none(), "{error}");
    }

    #[test]
    fn custom_predicates_extend_defaults() {
        let error = http_error(400, "There is a peering operation in progress");
        assert!(!is_retryable_error(&error, &[]));
        let custom: RetryPredicate = Arc::new(is_peering_operation_in_progress);
        assert!(is_retryable_error(&error, &[custom]));
        assert_eq!(any_matches(&error, &[]), None);
    }
}
