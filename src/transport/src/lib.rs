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

//! HTTP transport and retry helpers for the Google Cloud provider.
//!
//! This crate contains the pieces every resource uses to talk to Google Cloud
//! REST APIs: a single error type, a catalog of retry predicates, backoff
//! policies, a time-bounded retry loop, and [send_request][client::send_request],
//! which issues one logical HTTP call and retries it while any retry predicate
//! matches the failure.
//!
//! The crate knows nothing about long-running operations. Those are handled by
//! the `google-provider-operation` crate, which uses this crate to query them.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types.
pub mod error;

pub mod backoff_policy;
pub mod client;
pub mod credentials;
pub mod exponential_backoff;
pub mod options;
pub mod polling_backoff_policy;
pub mod retry_loop;
pub mod retry_predicate;

pub use client::{SendRequestOptions, send_request};
pub use error::Error;
pub use options::ClientConfig;
pub use retry_predicate::RetryPredicate;
