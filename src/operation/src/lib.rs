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

//! Waits for Google Cloud long-running operations and eventually consistent
//! resources.
//!
//! Many Google Cloud mutations return an *operation*, a handle that must be
//! polled until the work completes. Other mutations complete immediately, but
//! the new state is only visible after some delay. This crate turns both
//! patterns into a single bounded wait:
//!
//! * [polling_wait_time][polling::polling_wait_time] reads a resource until a
//!   [check][checks] reports the expected state.
//! * [operation_wait][waiter::operation_wait] polls an operation until it
//!   reaches a terminal state, using a [Waiter][waiter::Waiter] to interpret
//!   the service-specific operation type.
//!
//! Waiters for Compute Engine, GKE, Cloud SQL, Cloud Logging, and services
//! using the `google.longrunning` operation shape are provided.
//!
//! Both loops are bounded by wall-clock time. Transient failures are retried
//! until the time runs out, and the caller gets an [Error::Timeout] naming the
//! activity and the last observed state. Permanent failures, including
//! operations that complete with an error, are reported at once as
//! [Error::Failed].

/// An alias of [std::result::Result] where the error is always [crate::Error].
pub type Result<T> = std::result::Result<T, crate::Error>;

mod error;
pub use error::Error;

mod poll_result;
pub use poll_result::PollResult;

pub mod checks;
pub mod common;
pub mod compute;
pub mod container;
pub mod polling;
pub mod sql_admin;
pub mod waiter;

pub use polling::polling_wait_time;
pub use waiter::{Waiter, operation_wait};
