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

/// The classification of one poll.
///
/// Classifiers are plain functions of the last read, they never block. All
/// waiting happens in the polling loop.
#[derive(Debug)]
pub enum PollResult {
    /// The expected state was observed.
    Success,
    /// Not there yet, poll again. The string describes the observed state and
    /// is reported if the wait times out.
    Pending(String),
    /// Stop polling and report the error.
    Fatal(transport::Error),
}

impl PollResult {
    pub(crate) fn pending<T: Into<String>>(state: T) -> Self {
        Self::Pending(state.into())
    }

    /// A fatal result with a message and no underlying error.
    pub(crate) fn fatal<T: Into<String>>(message: T) -> Self {
        Self::Fatal(transport::Error::other(message.into()))
    }
}
