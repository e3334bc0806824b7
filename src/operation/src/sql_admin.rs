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

//! Waits for Cloud SQL Admin operations.

use crate::Result;
use crate::waiter::{Waiter, get_operation, operation_wait_with_config, to_operation};
use serde::Deserialize;
use std::time::Duration;
use transport::ClientConfig;
use transport::error::{OperationError, OperationErrorEntry};

/// A Cloud SQL Admin operation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Operation {
    pub name: String,
    pub status: String,
    pub operation_type: String,
    pub target_id: String,
    pub target_link: String,
    pub target_project: String,
    pub self_link: String,
    pub error: Option<OperationErrors>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct OperationErrors {
    pub errors: Vec<ErrorEntry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ErrorEntry {
    pub code: String,
    pub message: String,
}

/// Polls a Cloud SQL Admin operation.
#[derive(Debug)]
pub struct SqlAdminOperationWaiter {
    config: ClientConfig,
    project: String,
    user_agent: Option<String>,
    op: Operation,
}

impl SqlAdminOperationWaiter {
    pub fn new<P: Into<String>>(config: ClientConfig, project: P, op: Operation) -> Self {
        Self {
            config,
            project: project.into(),
            user_agent: None,
            op,
        }
    }

    pub fn with_user_agent<V: Into<String>>(mut self, v: V) -> Self {
        self.user_agent = Some(v.into());
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.op
    }

    fn query_url(&self) -> String {
        format!(
            "{}projects/{}/operations/{}",
            self.config.sql_base_path(),
            self.project,
            self.op.name
        )
    }
}

impl Waiter for SqlAdminOperationWaiter {
    type Operation = Operation;

    fn state(&self) -> String {
        self.op.status.clone()
    }

    fn error(&self) -> Option<transport::Error> {
        let errors = self.op.error.as_ref()?;
        let error = OperationError::new().set_errors(
            errors
                .errors
                .iter()
                .map(|e| OperationErrorEntry::new().set_code(&e.code).set_message(&e.message)),
        );
        Some(transport::Error::operation(error))
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
        &["PENDING", "RUNNING"]
    }

    fn target_states(&self) -> &[&str] {
        &["DONE"]
    }
}

/// Waits for the Cloud SQL operation `op`, as returned by a mutating call, to
/// complete.
pub async fn sql_admin_operation_wait_time(
    config: &ClientConfig,
    op: serde_json::Value,
    project: &str,
    activity: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<()> {
    let op = to_operation(activity, op)?;
    let mut waiter =
        SqlAdminOperationWaiter::new(config.clone(), project, op).with_user_agent(user_agent);
    operation_wait_with_config(&mut waiter, config, activity, timeout).await
}
