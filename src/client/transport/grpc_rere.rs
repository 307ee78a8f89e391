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

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tonic::transport::Channel;

use super::{
    classify_status,
    Connection,
    PING_DEFAULT_INTERVAL,
};
use crate::proto::fleet_client::FleetClient;
use crate::protobuf::{
    FromProtobuf,
    ToProtobuf,
};
use crate::{
    proto,
    Error,
    Message,
    RetryInvoker,
    Shutdown,
    TaskIns,
    TaskRes,
};

/// Request/response transport: each endpoint operation is one unary call
/// against the broker, with node identity carried in the request body.
pub(crate) struct RereConnection {
    client: FleetClient<Channel>,
    node: Option<proto::Node>,
    retry: RetryInvoker,
    shutdown: Shutdown,
    heartbeat: Option<tokio::task::JoinHandle<()>>,
}

impl RereConnection {
    pub(crate) fn new(
        channel: Channel,
        max_message_bytes: usize,
        retry: RetryInvoker,
        shutdown: Shutdown,
    ) -> Self {
        let client = FleetClient::new(channel)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes);

        Self { client, node: None, retry, shutdown, heartbeat: None }
    }

    fn node(&self) -> crate::Result<proto::Node> {
        self.node.ok_or_else(|| Error::protocol("`create_node` must succeed before this operation"))
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

#[async_trait]
impl Connection for RereConnection {
    async fn receive(&mut self) -> crate::Result<Option<Message>> {
        let node = self.node()?;
        let mut shutdown = self.shutdown.clone();

        let response = self
            .retry
            .invoke(&mut shutdown, || {
                let mut client = self.client.clone();
                async move {
                    client
                        .pull_task_ins(proto::PullTaskInsRequest {
                            node: Some(node),
                            task_ids: Vec::new(),
                        })
                        .await
                        .map_err(classify_status)
                }
            })
            .await?;

        let Some(task_ins) = response.into_inner().task_ins_list.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(TaskIns::from_protobuf(task_ins)?.into_message()))
    }

    async fn send(&mut self, message: Message) -> crate::Result<()> {
        let task_res = TaskRes::from_message(message).to_protobuf();
        let mut shutdown = self.shutdown.clone();

        self.retry
            .invoke(&mut shutdown, || {
                let mut client = self.client.clone();
                let task_res = task_res.clone();
                async move {
                    client
                        .push_task_res(proto::PushTaskResRequest { task_res_list: vec![task_res] })
                        .await
                        .map_err(classify_status)
                }
            })
            .await?;

        Ok(())
    }

    async fn create_node(&mut self) -> crate::Result<()> {
        let mut shutdown = self.shutdown.clone();

        let response = self
            .retry
            .invoke(&mut shutdown, || {
                let mut client = self.client.clone();
                async move {
                    client.create_node(proto::CreateNodeRequest {}).await.map_err(classify_status)
                }
            })
            .await?;

        let node = pb_getf!(response.into_inner(), node)?;
        self.node = Some(node);

        self.heartbeat = Some(tokio::spawn(heartbeat(
            self.client.clone(),
            node,
            PING_DEFAULT_INTERVAL,
            self.shutdown.clone(),
        )));

        Ok(())
    }

    async fn delete_node(&mut self) -> crate::Result<()> {
        self.stop_heartbeat();

        let Some(node) = self.node.take() else {
            return Ok(());
        };

        let mut shutdown = self.shutdown.clone();

        self.retry
            .invoke(&mut shutdown, || {
                let mut client = self.client.clone();
                async move {
                    client
                        .delete_node(proto::DeleteNodeRequest { node: Some(node) })
                        .await
                        .map_err(classify_status)
                }
            })
            .await?;

        Ok(())
    }

    async fn close(&mut self) -> crate::Result<()> {
        // dropping the channel releases the socket; only the helper task needs
        // explicit teardown
        self.stop_heartbeat();

        Ok(())
    }
}

/// Announce liveness every `interval * U(0.5, 0.9)` until shutdown; the random
/// fraction keeps a fleet of nodes from pinging in lockstep.
async fn heartbeat(
    mut client: FleetClient<Channel>,
    node: proto::Node,
    interval: Duration,
    mut shutdown: Shutdown,
) {
    loop {
        let fraction = rand::thread_rng().gen_range(0.5..0.9);

        if shutdown.sleep(interval.mul_f64(fraction)).await.is_err() {
            return;
        }

        let request =
            proto::PingRequest { node: Some(node), ping_interval: interval.as_secs_f64() };

        match client.ping(request).await {
            Ok(response) => {
                if !response.into_inner().success {
                    log::warn!("broker refused the heartbeat; node {} is unknown", node.node_id)
                }
            }
            Err(status) => log::warn!("heartbeat to the broker failed: {status}"),
        }
    }
}
