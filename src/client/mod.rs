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

mod app;
mod control;
mod transport;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use app::{
    AppError,
    AppRegistry,
    ClientApp,
};
pub use transport::{
    TransportType,
    DEFAULT_MAX_MESSAGE_BYTES,
};
use transport::Connection;

use self::control::handle_control_message;
use crate::{
    Error,
    NodeState,
    Shutdown,
};

/// How long the session loop sleeps when the broker has nothing for us.
const IDLE_POLL: Duration = Duration::from_secs(3);

/// Everything needed to run a client session against one broker.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker address: `host:port` for the gRPC transports, a full
    /// `http(s)://` URL for [`TransportType::Rest`].
    pub server_address: String,

    /// Which wire encoding to use.
    pub transport: TransportType,

    /// Disable TLS. Unset defaults to "insecure iff no root certificates were
    /// supplied"; `Some(true)` combined with root certificates is rejected.
    pub insecure: Option<bool>,

    /// PEM bundle used to verify the broker's certificate.
    pub root_certificates: Option<Vec<u8>>,

    /// Cap on a single encoded message. Must match the broker's maximum.
    pub max_message_bytes: usize,

    /// Retry ceiling on broker round-trips; unbounded when `None`.
    pub max_retries: Option<usize>,

    /// Elapsed-time ceiling on broker round-trips; unbounded when `None`.
    pub max_wait_time: Option<Duration>,
}

impl ClientConfig {
    /// A configuration with the programmatic defaults: bidi-stream transport,
    /// TLS decided by certificate material, unbounded retries.
    #[must_use]
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            transport: TransportType::GrpcBidi,
            insecure: None,
            root_certificates: None,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_retries: None,
            max_wait_time: None,
        }
    }

    /// Resolve the effective TLS mode, rejecting contradictory settings.
    pub(crate) fn resolve_insecure(&self) -> crate::Result<bool> {
        let insecure = self.insecure.unwrap_or(self.root_certificates.is_none());

        if insecure && self.root_certificates.is_some() {
            return Err(Error::config(
                "`insecure` cannot be combined with root certificates; drop one of the two",
            ));
        }

        Ok(insecure)
    }
}

/// Run the client session loop until the broker orders a shutdown or
/// `shutdown` triggers.
///
/// Maintains an automatically recovering connection to the broker: registers
/// the node, pumps receive-execute-reply, honors reconnect directives, and
/// deregisters on every exit path.
pub async fn start_client(
    config: ClientConfig,
    app: Arc<dyn ClientApp>,
    shutdown: Shutdown,
) -> crate::Result<()> {
    // surface configuration errors before the first connection attempt
    config.resolve_insecure()?;

    run_session(
        || transport::connect(&config, shutdown.clone()),
        config.transport,
        app,
        shutdown.clone(),
    )
    .await
}

/// The outer reconnect loop, generic over how a transport scope is opened.
async fn run_session<F, Fut>(
    mut connect: F,
    transport: TransportType,
    app: Arc<dyn ClientApp>,
    mut shutdown: Shutdown,
) -> crate::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<Box<dyn Connection>>>,
{
    let mut node_state = NodeState::new();

    loop {
        let mut connection = connect().await?;

        let outcome = match connection.create_node().await {
            Ok(()) => {
                pump(connection.as_mut(), &mut node_state, app.as_ref(), transport, &mut shutdown)
                    .await
            }
            Err(error) => Err(error),
        };

        // deregister and release on every exit path, errors included
        if let Err(error) = connection.delete_node().await {
            log::warn!("failed to deregister the node: {error}");
        }

        if let Err(error) = connection.close().await {
            log::warn!("failed to release the transport: {error}");
        }

        let sleep_duration = match outcome {
            Ok(it) => it,
            Err(Error::Interrupted) => return Ok(()),
            Err(error) => return Err(error),
        };

        if sleep_duration.is_zero() {
            log::info!("Disconnect and shut down");
            return Ok(());
        }

        log::info!(
            "Disconnect, then re-establish connection after {}s",
            sleep_duration.as_secs()
        );

        match shutdown.sleep(sleep_duration).await {
            Ok(()) => {}
            Err(Error::Interrupted) => return Ok(()),
            Err(error) => return Err(error),
        }
    }
}

/// The inner receive-execute-reply loop.
///
/// Returns the reconnect sleep hint: zero means terminate. Replies are sent
/// strictly before the next receive; there is no pipelining.
async fn pump(
    connection: &mut dyn Connection,
    node_state: &mut NodeState,
    app: &dyn ClientApp,
    transport: TransportType,
    shutdown: &mut Shutdown,
) -> crate::Result<Duration> {
    loop {
        shutdown.check()?;

        let Some(message) = connection.receive().await? else {
            shutdown.sleep(IDLE_POLL).await?;
            continue;
        };

        let run_id = message.metadata.run_id;

        log::info!(
            "Received `{}` message {} for run {run_id} (group `{}`)",
            message.metadata.message_type,
            message.metadata.message_id,
            message.metadata.group_id,
        );

        if let Some((reply, sleep_duration)) = handle_control_message(&message) {
            connection.send(reply).await?;
            return Ok(sleep_duration);
        }

        node_state.register_context(run_id);
        let mut context = node_state.retrieve_context(run_id);

        let reply = match app.handle(&message, &mut context) {
            Ok(reply) => {
                node_state.update_context(run_id, context);
                reply
            }
            Err(cause) => {
                let error = Error::App(cause);

                // the legacy stream transport has no failure channel the
                // broker side understands; terminate instead
                if transport == TransportType::GrpcBidi {
                    return Err(error);
                }

                log::error!(
                    "client app failed while handling message {}: {error}",
                    message.metadata.message_id,
                );

                // node state stays untouched on this path
                let reason = match &error {
                    Error::App(cause) => format!("{}:{cause}", error.kind_name()),
                    _ => "Unknown".to_owned(),
                };

                message.error_reply(0, reason)
            }
        };

        connection.send(reply).await?;
    }
}
