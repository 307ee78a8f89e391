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

pub(super) mod grpc_bidi;
pub(super) mod grpc_rere;
pub(super) mod rest;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{
    Certificate,
    Channel,
    ClientTlsConfig,
    Endpoint,
};

use crate::client::ClientConfig;
use crate::{
    retry,
    Address,
    Error,
    Message,
    RetryInvoker,
    Shutdown,
};

/// Default cap on a single encoded message, in bytes (512 MiB). Must match
/// the broker's configured maximum.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 536_870_912;

/// How long a freshly announced node stays alive without a heartbeat.
pub(crate) const PING_DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Which wire encoding connects the node to the broker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportType {
    /// One long-lived duplex stream; session identity is the stream itself.
    GrpcBidi,

    /// Separate request/response round-trips against the broker's pull/push
    /// endpoints.
    GrpcRere,

    /// The same four operations mapped to HTTP POST endpoints.
    Rest,
}

impl TransportType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::GrpcBidi => "grpc-bidi",
            Self::GrpcRere => "grpc-rere",
            Self::Rest => "rest",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grpc-bidi" => Ok(Self::GrpcBidi),
            "grpc-rere" => Ok(Self::GrpcRere),
            "rest" => Ok(Self::Rest),
            _ => Err(Error::config(format!("unknown transport: `{s}`"))),
        }
    }
}

/// The four endpoint operations a transport scope exposes while it is held.
///
/// `close` must be called on every exit path; it releases all I/O resources
/// deterministically. `create_node`/`delete_node` default to no-ops for
/// transports whose session identity is the connection itself.
#[async_trait]
pub(crate) trait Connection: Send {
    /// Next available message, or `None` if nothing is ready yet. Never
    /// blocks indefinitely.
    async fn receive(&mut self) -> crate::Result<Option<Message>>;

    /// Deliver a reply to the broker.
    async fn send(&mut self, message: Message) -> crate::Result<()>;

    /// Announce this node to the broker. Invoked exactly once after the scope
    /// is entered.
    async fn create_node(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Withdraw this node. Invoked exactly once before the scope exits.
    async fn delete_node(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Release all I/O resources held by the scope.
    async fn close(&mut self) -> crate::Result<()>;
}

/// Open the transport scope described by `config`.
pub(crate) async fn connect(
    config: &ClientConfig,
    shutdown: Shutdown,
) -> crate::Result<Box<dyn Connection>> {
    let insecure = config.resolve_insecure()?;
    let retry = retry_invoker(config);

    match config.transport {
        TransportType::GrpcRere => {
            let address = config.server_address.parse::<Address>()?;
            let channel =
                grpc_channel(&address, insecure, config.root_certificates.as_deref())?;

            Ok(Box::new(grpc_rere::RereConnection::new(
                channel,
                config.max_message_bytes,
                retry,
                shutdown,
            )))
        }
        TransportType::GrpcBidi => {
            let address = config.server_address.parse::<Address>()?;
            let channel =
                grpc_channel(&address, insecure, config.root_certificates.as_deref())?;

            Ok(Box::new(
                grpc_bidi::BidiConnection::open(channel, config.max_message_bytes, retry, shutdown)
                    .await?,
            ))
        }
        TransportType::Rest => Ok(Box::new(rest::RestConnection::new(
            &config.server_address,
            insecure,
            config.root_certificates.as_deref(),
            config.max_message_bytes,
            retry,
            shutdown,
        )?)),
    }
}

fn retry_invoker(config: &ClientConfig) -> RetryInvoker {
    RetryInvoker::new(config.max_retries, config.max_wait_time)
        .on_backoff(|event| {
            log::debug!(
                "request to the broker failed on attempt {}; backing off for {:?}",
                event.attempt,
                event.wait
            );
        })
        .on_giveup(|event| {
            log::warn!(
                "giving up on the broker after {} attempts over {:?}; last error: {:?}",
                event.attempt,
                event.elapsed,
                event.error,
            );
        })
        .on_success(|event| {
            log::info!("connection with the broker re-established after {} attempts", event.attempt);
        })
}

/// Lazily connected gRPC channel for `address`, with or without TLS.
fn grpc_channel(
    address: &Address,
    insecure: bool,
    root_certificates: Option<&[u8]>,
) -> crate::Result<Channel> {
    let scheme = if insecure { "http" } else { "https" };

    let mut endpoint = Endpoint::from_shared(format!("{scheme}://{address}"))
        .map_err(Error::basic_parse)?
        .connect_timeout(Duration::from_secs(10))
        .keep_alive_timeout(Duration::from_secs(10))
        .keep_alive_while_idle(true)
        .tcp_keepalive(Some(Duration::from_secs(10)));

    if !insecure {
        let mut tls = ClientTlsConfig::new();

        if let Some(pem) = root_certificates {
            tls = tls.ca_certificate(Certificate::from_pem(pem));
        }

        endpoint = endpoint
            .tls_config(tls)
            .map_err(|e| Error::config(format!("invalid TLS configuration: {e}")))?;
    }

    Ok(endpoint.connect_lazy())
}

/// Split gRPC statuses into the recoverable and fatal halves of the retry
/// contract.
pub(crate) fn classify_status(status: tonic::Status) -> retry::Error {
    match status.code() {
        tonic::Code::Unavailable
        | tonic::Code::DeadlineExceeded
        | tonic::Code::ResourceExhausted
        | tonic::Code::Aborted => retry::Error::Transient(status.into()),
        _ => retry::Error::Permanent(status.into()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::TransportType;
    use crate::Error;

    #[test]
    fn transport_round_trips_through_str() {
        for transport in [TransportType::GrpcBidi, TransportType::GrpcRere, TransportType::Rest] {
            assert_eq!(transport.to_string().parse::<TransportType>().unwrap(), transport);
        }
    }

    #[test]
    fn unknown_transport_is_fatal() {
        assert_matches!("carrier-pigeon".parse::<TransportType>(), Err(Error::Config(_)));
    }
}
