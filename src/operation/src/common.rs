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

//! Waits for operations in the `google.longrunning.Operation` format.
//!
//! These operations have no status string, only a `done` flag. The waiter
//! reports the flag as the `done: false` and `done: true` states.

use crate::Result;
use crate::waiter::{Waiter, get_operation, operation_wait_with_config, to_operation};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use transport::ClientConfig;
use transport::error::OperationError;

const NOT_DONE: &str = "done: false";
const DONE: &str = "done: true";

/// A `google.longrunning.Operation`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub error: Option<Status>,
    pub response: Option<Value>,
    pub metadata: Option<Value>,
    pub self_link: String,
}

/// A `google.rpc.Status`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Status {
    pub code: i32,
    pub message: String,
    pub details: Vec<Value>,
}

/// Polls a `google.longrunning.Operation`.
///
/// The operation is queried at its `selfLink` if it has one, otherwise at the
/// base path followed by the operation name.
#[derive(Debug)]
pub struct CommonOperationWaiter {
    config: ClientConfig,
    base_path: String,
    project: Option<String>,
    user_agent: Option<String>,
    op: Operation,
}

impl CommonOperationWaiter {
    pub fn new<B: Into<String>>(config: ClientConfig, base_path: B, op: Operation) -> Self {
        Self {
            config,
            base_path: base_path.into(),
            project: None,
            user_agent: None,
            op,
        }
    }

    /// Sets the project used for quota and billing, see
    /// [ClientConfig::user_project].
    pub fn with_project<V: Into<String>>(mut self, v: V) -> Self {
        self.project = Some(v.into());
        self
    }

    pub fn with_user_agent<V: Into<String>>(mut self, v: V) -> Self {
        self.user_agent = Some(v.into());
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.op
    }

    /// Consumes the waiter, returning the `response` field of the operation.
    pub fn into_response(self) -> Option<Value> {
        self.op.response
    }

    fn query_url(&self) -> String {
        if !self.op.self_link.is_empty() {
            return self.op.self_link.clone();
        }
        format!("{}{}", self.base_path, self.op.name)
    }
}

impl Waiter for CommonOperationWaiter {
    type Operation = Operation;

    fn state(&self) -> String {
        let state = if self.op.done { DONE } else { NOT_DONE };
        state.to_string()
    }

    fn error(&self) -> Option<transport::Error> {
        let status = self.op.error.as_ref()?;
        let mut error = OperationError::new().set_code(status.code);
        if !status.message.is_empty() {
            error = error.set_message(&status.message);
        }
        Some(transport::Error::operation(error))
    }

    fn set_op(&mut self, op: Operation) {
        self.op = op;
    }

    async fn query_op(&self) -> transport::Result<Operation> {
        get_operation(
            &self.config,
            self.query_url(),
            self.project.as_deref(),
            self.user_agent.as_deref(),
        )
        .await
    }

    fn op_name(&self) -> String {
        self.op.name.clone()
    }

    fn pending_states(&self) -> &[&str] {
        &[NOT_DONE]
    }

    fn target_states(&self) -> &[&str] {
        &[DONE]
    }
}

async fn wait(
    config: &ClientConfig,
    base_path: &str,
    op: Value,
    project: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<CommonOperationWaiter> {
    let op = to_operation(activity, op)?;
    let mut waiter = CommonOperationWaiter::new(config.clone(), base_path, op)
        .with_project(project)
        .with_user_agent(user_agent);
    operation_wait_with_config(&mut waiter, config, activity, timeout).await?;
    Ok(waiter)
}

/// Waits for a Cloud Logging operation, such as a bucket or link creation.
pub async fn logging_operation_wait_time(
    config: &ClientConfig,
    op: Value,
    project: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<()> {
    let base_path = config.logging_base_path();
    wait(config, base_path, op, project, activity, user_agent, timeout).await?;
    Ok(())
}

/// Like [logging_operation_wait_time], returning the `response` field of the
/// completed operation.
pub async fn logging_operation_wait_time_with_response(
    config: &ClientConfig,
    op: Value,
    project: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<Option<Value>> {
    let base_path = config.logging_base_path();
    let waiter = wait(config, base_path, op, project, activity, user_agent, timeout).await?;
    Ok(waiter.into_response())
}

/// Waits for an operation of any service using the `google.longrunning`
/// format.
///
/// `base_path` is the service endpoint, e.g. `https://run.googleapis.com/v2/`,
/// it is only used if the operation has no `selfLink`.
pub async fn dcl_operation_wait_time(
    config: &ClientConfig,
    op: Value,
    base_path: &str,
    project: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<()> {
    wait(config, base_path, op, project, activity, user_agent, timeout).await?;
    Ok(())
}
