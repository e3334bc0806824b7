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

//! Waits for Google Kubernetes Engine operations.

use crate::Result;
use crate::waiter::{Waiter, get_operation, operation_wait_with_config, to_operation};
use serde::Deserialize;
use std::time::Duration;
use transport::ClientConfig;
use transport::error::OperationError;

const PENDING_STATES: [&str; 2] = ["PENDING", "RUNNING"];

/// A GKE operation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Operation {
    pub name: String,
    pub status: String,
    pub status_message: String,
    pub operation_type: String,
    pub target_link: String,
    pub self_link: String,
    pub error: Option<Status>,
}

/// A `google.rpc.Status`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Status {
    pub code: i32,
    pub message: String,
}

/// Polls a GKE operation.
#[derive(Debug)]
pub struct ContainerOperationWaiter {
    config: ClientConfig,
    project: String,
    location: String,
    user_agent: Option<String>,
    op: Operation,
}

impl ContainerOperationWaiter {
    pub fn new<P, L>(config: ClientConfig, project: P, location: L, op: Operation) -> Self
    where
        P: Into<String>,
        L: Into<String>,
    {
        Self {
            config,
            project: project.into(),
            location: location.into(),
            user_agent: None,
            op,
        }
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
        format!(
            "{}projects/{}/locations/{}/operations/{}",
            self.config.container_base_path(),
            self.project,
            self.location,
            self.op.name
        )
    }
}

impl Waiter for ContainerOperationWaiter {
    type Operation = Operation;

    fn state(&self) -> String {
        self.op.status.clone()
    }

    // Older API versions report failures only in `statusMessage`, which is
    // also used for progress while the operation runs.
    fn error(&self) -> Option<transport::Error> {
        if PENDING_STATES.contains(&self.op.status.as_str()) {
            return None;
        }
        if let Some(status) = self.op.error.as_ref().filter(|s| !s.message.is_empty()) {
            let error = OperationError::new()
                .set_code(status.code)
                .set_message(&status.message);
            return Some(transport::Error::operation(error));
        }
        if !self.op.status_message.is_empty() {
            let error = OperationError::new().set_message(&self.op.status_message);
            return Some(transport::Error::operation(error));
        }
        None
    }

    fn set_op(&mut self, op: Operation) {
        self.op = op;
    }

    async fn query_op(&self) -> transport::Result<Operation> {
        get_operation(
            &self.config,
            self.query_url(),
            Some(self.project.as_str()),
            self.user_agent.as_deref(),
        )
        .await
    }

    fn op_name(&self) -> String {
        self.op.name.clone()
    }

    fn pending_states(&self) -> &[&str] {
        &PENDING_STATES
    }

    fn target_states(&self) -> &[&str] {
        &["DONE"]
    }
}

/// Waits for the GKE operation `op`, as returned by a mutating call, to
/// complete.
pub async fn container_operation_wait(
    config: &ClientConfig,
    op: serde_json::Value,
    project: &str,
    location: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<()> {
    let op = to_operation(activity, op)?;
    let mut waiter = ContainerOperationWaiter::new(config.clone(), project, location, op)
        .with_user_agent(user_agent);
    operation_wait_with_config(&mut waiter, config, activity, timeout).await
}
