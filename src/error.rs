/*
 * ‌
 * Fedlink Rust SDK
 * ​
 * Copyright (C) 2023 - 2026 Fedlink Labs
 * ​
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * ‍
 */

use std::borrow::Cow;
use std::error::Error as StdError;
use std::result::Result as StdResult;

/// `Result<T, Error>`
pub type Result<T> = StdResult<T, Error>;

pub(crate) type BoxStdError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents any possible error from a fallible function in the Fedlink SDK.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The retry invoker gave up; the most recent attempt failed with the boxed error.
    #[error("failed to complete request within the maximum time allowed; most recent attempt failed with: {0}")]
    TimedOut(#[source] Box<Error>),

    /// GRPC status code was an error.
    #[error("grpc: {0:?}")]
    GrpcStatus(#[from] tonic::Status),

    /// An HTTP round-trip against the broker's REST endpoints failed.
    #[error("http: {0}")]
    Http(#[source] BoxStdError),

    /// Invalid user-supplied configuration (bad address, conflicting TLS flags, bad transport).
    #[error("invalid configuration: {0}")]
    Config(Cow<'static, str>),

    /// Failed to parse a basic type from string (ex. [`Address`](crate::Address)).
    #[error("failed to parse: {0}")]
    BasicParse(#[source] BoxStdError),

    /// The remote endpoint violated the transport protocol. Not recoverable by reconnecting.
    #[error("transport protocol violation: {0}")]
    Protocol(Cow<'static, str>),

    /// The user-supplied client app failed while handling a message.
    #[error("client app failed: {0}")]
    App(#[source] BoxStdError),

    /// Failed to create an SDK type from a wire-format response.
    #[error("failed to create a SDK type from a wire response: {0}")]
    FromProtobuf(#[source] BoxStdError),

    /// The node id is not present in the broker's registry.
    #[error("node `{0}` was not found in the registry")]
    NodeNotFound(i64),

    /// A shutdown signal aborted the operation.
    #[error("interrupted by shutdown signal")]
    Interrupted,
}

impl Error {
    pub(crate) fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn basic_parse<E: Into<BoxStdError>>(error: E) -> Self {
        Self::BasicParse(error.into())
    }

    pub(crate) fn from_protobuf<E: Into<BoxStdError>>(error: E) -> Self {
        Self::FromProtobuf(error.into())
    }

    pub(crate) fn http<E: Into<BoxStdError>>(error: E) -> Self {
        Self::Http(error.into())
    }

    pub(crate) fn protocol(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Protocol(message.into())
    }

    /// Short kind name, used when a failure has to be flattened into a reply's `reason`.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::TimedOut(_) => "TimedOut",
            Self::GrpcStatus(_) => "GrpcStatus",
            Self::Http(_) => "Http",
            Self::Config(_) => "Config",
            Self::BasicParse(_) => "BasicParse",
            Self::Protocol(_) => "Protocol",
            Self::App(_) => "App",
            Self::FromProtobuf(_) => "FromProtobuf",
            Self::NodeNotFound(_) => "NodeNotFound",
            Self::Interrupted => "Interrupted",
        }
    }
}
