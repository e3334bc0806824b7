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

/// The error reported by a long-running operation that completed with errors.
///
/// Compute Engine reports a list of errors, each with a code, a message, and
/// optional structured details. Other services report a single message, and
/// some include a numeric code.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct OperationError {
    /// The numeric code, if the service reports one.
    pub code: Option<i32>,
    /// The top-level message, if the service reports one.
    pub message: Option<String>,
    /// The individual errors, if the service reports a list.
    pub errors: Vec<OperationErrorEntry>,
}

impl OperationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the [code][OperationError::code] field.
    pub fn set_code(mut self, v: i32) -> Self {
        self.code = Some(v);
        self
    }

    /// Sets the [message][OperationError::message] field.
    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = Some(v.into());
        self
    }

    /// Sets the [errors][OperationError::errors] field.
    pub fn set_errors<T, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<OperationErrorEntry>,
    {
        self.errors = v.into_iter().map(|e| e.into()).collect();
        self
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() {
            return match (&self.message, self.code) {
                (Some(m), _) => write!(f, "{m}"),
                (None, Some(c)) => write!(f, "operation failed with code {c}"),
                (None, None) => write!(f, "operation failed"),
            };
        }
        let mut first = true;
        for e in &self.errors {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{}", e.message)?;
            for d in &e.details {
                write!(f, "\n{d}")?;
            }
        }
        Ok(())
    }
}

/// One entry in the error list of a completed operation.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct OperationErrorEntry {
    /// The error type identifier, e.g. `QUOTA_EXCEEDED` or `RESOURCE_NOT_READY`.
    pub code: String,
    pub message: String,
    /// The field or resource associated with the error, if any.
    pub location: Option<String>,
    /// Human-readable renderings of any structured details.
    pub details: Vec<String>,
}

impl OperationErrorEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the [code][OperationErrorEntry::code] field.
    pub fn set_code<T: Into<String>>(mut self, v: T) -> Self {
        self.code = v.into();
        self
    }

    /// Sets the [message][OperationErrorEntry::message] field.
    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = v.into();
        self
    }

    /// Sets the [location][OperationErrorEntry::location] field.
    pub fn set_location<T: Into<String>>(mut self, v: T) -> Self {
        self.location = Some(v.into());
        self
    }

    /// Sets the [details][OperationErrorEntry::details] field.
    pub fn set_details<T, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.details = v.into_iter().map(|d| d.into()).collect();
        self
    }
}
