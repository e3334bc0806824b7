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

//! Waits for Compute Engine operations.
//!
//! Compute operations are zonal, regional, global, or scoped to an
//! organization. The waiter picks the endpoint from the fields of the
//! operation itself.

use crate::Result;
use crate::waiter::{
    Waiter, get_operation, operation_wait_with_config, resource_name_from_self_link, to_operation,
};
use serde::Deserialize;
use std::time::Duration;
use transport::ClientConfig;
use transport::error::{OperationError, OperationErrorEntry};

const NOT_READY: &str = "RESOURCE_NOT_READY";

/// A Compute Engine operation.
///
/// Only the fields needed to poll the operation are kept.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Operation {
    pub name: String,
    pub status: String,
    pub zone: String,
    pub region: String,
    pub self_link: String,
    pub target_link: String,
    pub operation_type: String,
    pub status_message: String,
    pub http_error_status_code: Option<u16>,
    pub http_error_message: String,
    pub error: Option<OperationErrors>,
}

/// The errors reported by a failed operation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct OperationErrors {
    pub errors: Vec<ErrorEntry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ErrorEntry {
    pub code: String,
    pub message: String,
    pub location: Option<String>,
    pub error_details: Vec<ErrorDetail>,
}

/// Structured details attached to an error entry.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ErrorDetail {
    pub localized_message: Option<LocalizedMessage>,
    pub help: Option<Help>,
    pub error_info: Option<ErrorInfo>,
    pub quota_info: Option<QuotaInfo>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct LocalizedMessage {
    pub locale: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Help {
    pub links: Vec<HelpLink>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct HelpLink {
    pub description: String,
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ErrorInfo {
    pub reason: String,
    pub domain: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct QuotaInfo {
    pub metric_name: String,
    pub limit_name: String,
    pub limit: Option<f64>,
}

impl ErrorDetail {
    fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(m) = self.localized_message.as_ref().filter(|m| !m.message.is_empty()) {
            lines.push(m.message.clone());
        }
        if let Some(help) = &self.help {
            lines.extend(
                help.links
                    .iter()
                    .map(|l| format!("{}: {}", l.description, l.url)),
            );
        }
        if let Some(info) = &self.error_info {
            lines.push(format!("reason: {}, domain: {}", info.reason, info.domain));
        }
        if let Some(q) = &self.quota_info {
            let limit = q.limit.map(|l| format!(", limit: {l}")).unwrap_or_default();
            lines.push(format!(
                "quota metric: {}, limit name: {}{limit}",
                q.metric_name, q.limit_name
            ));
        }
        lines
    }
}

impl From<&OperationErrors> for OperationError {
    fn from(value: &OperationErrors) -> Self {
        OperationError::new().set_errors(value.errors.iter().map(|e| {
            let entry = OperationErrorEntry::new()
                .set_code(&e.code)
                .set_message(&e.message)
                .set_details(e.error_details.iter().flat_map(ErrorDetail::lines));
            match &e.location {
                Some(l) => entry.set_location(l),
                None => entry,
            }
        }))
    }
}

/// Polls a Compute Engine operation.
#[derive(Debug)]
pub struct ComputeOperationWaiter {
    config: ClientConfig,
    project: String,
    parent: Option<String>,
    user_agent: Option<String>,
    op: Operation,
}

impl ComputeOperationWaiter {
    /// Creates a waiter for an operation in `project`.
    pub fn new<P: Into<String>>(config: ClientConfig, project: P, op: Operation) -> Self {
        Self {
            config,
            project: project.into(),
            parent: None,
            user_agent: None,
            op,
        }
    }

    /// Sets the organization of a global organization operation, in the
    /// `organizations/{id}` format.
    pub fn with_parent<V: Into<String>>(mut self, v: V) -> Self {
        self.parent = Some(v.into());
        self
    }

    /// Overrides the `User-Agent` header when querying the operation.
    pub fn with_user_agent<V: Into<String>>(mut self, v: V) -> Self {
        self.user_agent = Some(v.into());
        self
    }

    /// The latest snapshot of the operation.
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    fn query_url(&self) -> String {
        let base = self.config.compute_base_path();
        let name = &self.op.name;
        if !self.op.zone.is_empty() {
            let zone = resource_name_from_self_link(&self.op.zone);
            return format!("{base}projects/{}/zones/{zone}/operations/{name}", self.project);
        }
        if !self.op.region.is_empty() {
            let region = resource_name_from_self_link(&self.op.region);
            return format!(
                "{base}projects/{}/regions/{region}/operations/{name}",
                self.project
            );
        }
        if let Some(parent) = &self.parent {
            return format!("{base}locations/global/operations/{name}?parentId={parent}");
        }
        format!("{base}projects/{}/global/operations/{name}", self.project)
    }
}

impl Waiter for ComputeOperationWaiter {
    type Operation = Operation;

    fn state(&self) -> String {
        self.op.status.clone()
    }

    fn error(&self) -> Option<transport::Error> {
        self.op
            .error
            .as_ref()
            .map(|e| transport::Error::operation(e.into()))
    }

    fn is_retryable(&self, error: &transport::Error) -> bool {
        error
            .operation_error()
            .is_some_and(|e| e.errors.iter().any(|e| e.code == NOT_READY))
    }

    fn set_op(&mut self, op: Operation) {
        self.op = op;
    }

    async fn query_op(&self) -> transport::Result<Operation> {
        let project = (!self.project.is_empty()).then_some(self.project.as_str());
        get_operation(
            &self.config,
            self.query_url(),
            project,
            self.user_agent.as_deref(),
        )
        .await
    }

    fn op_name(&self) -> String {
        self.op.name.clone()
    }

    fn pending_states(&self) -> &[&str] {
        &["PENDING", "RUNNING"]
    }

    fn target_states(&self) -> &[&str] {
        &["DONE"]
    }
}

/// Waits for the Compute Engine operation `op`, as returned by a mutating
/// call, to complete.
pub async fn compute_operation_wait_time(
    config: &ClientConfig,
    op: serde_json::Value,
    project: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<()> {
    let op = to_operation(activity, op)?;
    let mut waiter =
        ComputeOperationWaiter::new(config.clone(), project, op).with_user_agent(user_agent);
    operation_wait_with_config(&mut waiter, config, activity, timeout).await
}

/// Waits for a global organization operation, such as a change to an
/// organization security policy, and returns its final snapshot.
///
/// `parent` is the organization, in `organizations/{id}` format.
pub async fn compute_org_operation_wait_time_with_response(
    config: &ClientConfig,
    op: serde_json::Value,
    parent: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<Operation> {
    let op = to_operation(activity, op)?;
    let mut waiter = ComputeOperationWaiter::new(config.clone(), "", op)
        .with_parent(parent)
        .with_user_agent(user_agent);
    operation_wait_with_config(&mut waiter, config, activity, timeout).await?;
    Ok(waiter.op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn waiter(op: serde_json::Value) -> ComputeOperationWaiter {
        let config = ClientConfig::new().with_compute_base_path("https://compute.test/v1/");
        let op = serde_json::from_value(op).expect("test operations are valid");
        ComputeOperationWaiter::new(config, "my-project", op)
    }

    #[test]
    fn query_url() {
        let w = waiter(json!({
            "name": "op-1",
            "zone": "https://www.googleapis.com/compute/v1/projects/my-project/zones/us-central1-a",
        }));
        assert_eq!(
            w.query_url(),
            "https://compute.test/v1/projects/my-project/zones/us-central1-a/operations/op-1"
        );

        let w = waiter(json!({
            "name": "op-2",
            "region": "https://www.googleapis.com/compute/v1/projects/my-project/regions/us-east1",
        }));
        assert_eq!(
            w.query_url(),
            "https://compute.test/v1/projects/my-project/regions/us-east1/operations/op-2"
        );

        let w = waiter(json!({"name": "op-3"}));
        assert_eq!(
            w.query_url(),
            "https://compute.test/v1/projects/my-project/global/operations/op-3"
        );

        let w = waiter(json!({"name": "op-4"})).with_parent("organizations/123");
        assert_eq!(
            w.query_url(),
            "https://compute.test/v1/locations/global/operations/op-4?parentId=organizations/123"
        );
    }

    #[test]
    fn states() {
        let w = waiter(json!({"name": "op-1", "status": "RUNNING"}));
        assert_eq!(w.state(), "RUNNING");
        assert_eq!(w.op_name(), "op-1");
        assert!(w.error().is_none());
        assert!(w.pending_states().contains(&"PENDING"));
        assert!(w.target_states().contains(&"DONE"));
    }

    #[test]
    fn error_details() {
        let w = waiter(json!({
            "name": "op-1",
            "status": "DONE",
            "error": {"errors": [{
                "code": "QUOTA_EXCEEDED",
                "message": "Quota 'CPUS' exceeded.  Limit: 24.0 in region us-central1.",
                "errorDetails": [
                    {"localizedMessage": {"locale": "en-US", "message": "Quota exceeded"}},
                    {"help": {"links": [{"description": "Request more quota", "url": "https://cloud.google.com/quotas"}]}},
                    {"quotaInfo": {"metricName": "compute.googleapis.com/cpus", "limitName": "CPUS-per-project-region", "limit": 24.0}},
                ],
            }]},
        }));
        let err = w.error().expect("operation has an error");
        assert!(!w.is_retryable(&err), "{err:?}");
        let op = err.operation_error().expect("operation error");
        assert_eq!(op.errors.len(), 1);
        let entry = &op.errors[0];
        assert_eq!(entry.code, "QUOTA_EXCEEDED");
        assert_eq!(
            entry.details,
            vec![
                "Quota exceeded".to_string(),
                "Request more quota: https://cloud.google.com/quotas".to_string(),
                "quota metric: compute.googleapis.com/cpus, limit name: CPUS-per-project-region, limit: 24".to_string(),
            ]
        );
        let msg = err.to_string();
        assert!(msg.contains("Quota 'CPUS' exceeded."), "{msg}");
        assert!(msg.contains("https://cloud.google.com/quotas"), "{msg}");
    }

    #[test]
    fn not_ready_is_retryable() {
        let w = waiter(json!({
            "name": "op-1",
            "status": "DONE",
            "error": {"errors": [{"code": "RESOURCE_NOT_READY", "message": "not ready"}]},
        }));
        let err = w.error().expect("operation has an error");
        assert!(w.is_retryable(&err), "{err:?}");
        assert!(!w.is_retryable(&transport::Error::other("RESOURCE_NOT_READY")));
    }
}
