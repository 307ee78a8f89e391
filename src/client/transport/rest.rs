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
use reqwest::header::CONTENT_TYPE;

use super::{
    Connection,
    PING_DEFAULT_INTERVAL,
};
use crate::protobuf::{
    FromProtobuf,
    ToProtobuf,
};
use crate::{
    proto,
    retry,
    Error,
    Message,
    RetryInvoker,
    Shutdown,
    TaskIns,
    TaskRes,
};

const PATH_CREATE_NODE: &str = "api/v0/fleet/create-node";
const PATH_DELETE_NODE: &str = "api/v0/fleet/delete-node";
const PATH_PULL_TASK_INS: &str = "api/v0/fleet/pull-task-ins";
const PATH_PUSH_TASK_RES: &str = "api/v0/fleet/push-task-res";
const PATH_PING: &str = "api/v0/fleet/ping";

const PROTOBUF_CONTENT_TYPE: &str = "application/protobuf";

/// HTTP transport: the four endpoint operations map to POSTs carrying
/// length-delimited binary bodies.
pub(crate) struct RestConnection {
    http: reqwest::Client,
    base: String,
    node: Option<proto::Node>,
    max_message_bytes: usize,
    retry: RetryInvoker,
    shutdown: Shutdown,
    heartbeat: Option<tokio::task::JoinHandle<()>>,
}

impl RestConnection {
    pub(crate) fn new(
        server_address: &str,
        insecure: bool,
        root_certificates: Option<&[u8]>,
        max_message_bytes: usize,
        retry: RetryInvoker,
        shutdown: Shutdown,
    ) -> crate::Result<Self> {
        if !server_address.starts_with("http://") && !server_address.starts_with("https://") {
            return Err(Error::config(
                "the REST server address must carry an explicit `http://` or `https://` scheme",
            ));
        }

        if !insecure && !server_address.starts_with("https://") {
            return Err(Error::config(
                "TLS is enabled but the REST server address is not `https://`",
            ));
        }

        let mut builder = reqwest::Client::builder();

        if let Some(pem) = root_certificates {
            builder = builder
                .add_root_certificate(reqwest::Certificate::from_pem(pem).map_err(Error::http)?);
        }

        Ok(Self {
            http: builder.build().map_err(Error::http)?,
            base: server_address.trim_end_matches('/').to_owned(),
            node: None,
            max_message_bytes,
            retry,
            shutdown,
            heartbeat: None,
        })
    }

    fn node(&self) -> crate::Result<proto::Node> {
        self.node.ok_or_else(|| Error::protocol("`create_node` must succeed before this operation"))
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }

    /// One POST round-trip through the retry invoker. 5xx responses are
    /// recoverable; anything else non-OK is a protocol violation.
    async fn post<Req, Resp>(&self, path: &'static str, request: &Req) -> crate::Result<Resp>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let url = format!("{}/{path}", self.base);
        let body = request.encode_length_delimited_to_vec();
        let max_message_bytes = self.max_message_bytes;
        let mut shutdown = self.shutdown.clone();

        self.retry
            .invoke(&mut shutdown, || {
                let http = self.http.clone();
                let url = url.clone();
                let body = body.clone();

                async move {
                    let response = http
                        .post(&url)
                        .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
                        .body(body)
                        .send()
                        .await
                        .map_err(classify_reqwest)?;

                    let status = response.status();

                    if status.is_server_error() {
                        return Err(retry::Error::Transient(Error::http(format!(
                            "broker returned {status}"
                        ))));
                    }

                    if !status.is_success() {
                        return Err(retry::Error::Permanent(Error::protocol(format!(
                            "broker returned {status}"
                        ))));
                    }

                    let payload = response.bytes().await.map_err(classify_reqwest)?;

                    if payload.len() > max_message_bytes {
                        return Err(retry::Error::Permanent(Error::protocol(format!(
                            "response of {} bytes exceeds the configured maximum",
                            payload.len()
                        ))));
                    }

                    Resp::decode_length_delimited(payload)
                        .map_err(|e| retry::Error::Permanent(Error::from_protobuf(e)))
                }
            })
            .await
    }
}

#[async_trait]
impl Connection for RestConnection {
    async fn receive(&mut self) -> crate::Result<Option<Message>> {
        let node = self.node()?;

        let response: proto::PullTaskInsResponse = self
            .post(PATH_PULL_TASK_INS, &proto::PullTaskInsRequest {
                node: Some(node),
                task_ids: Vec::new(),
            })
            .await?;

        let Some(task_ins) = response.task_ins_list.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(TaskIns::from_protobuf(task_ins)?.into_message()))
    }

    async fn send(&mut self, message: Message) -> crate::Result<()> {
        let task_res = TaskRes::from_message(message).to_protobuf();

        let _: proto::PushTaskResResponse = self
            .post(PATH_PUSH_TASK_RES, &proto::PushTaskResRequest { task_res_list: vec![task_res] })
            .await?;

        Ok(())
    }

    async fn create_node(&mut self) -> crate::Result<()> {
        let response: proto::CreateNodeResponse =
            self.post(PATH_CREATE_NODE, &proto::CreateNodeRequest {}).await?;

        let node = pb_getf!(response, node)?;
        self.node = Some(node);

        self.heartbeat = Some(tokio::spawn(heartbeat(
            self.http.clone(),
            self.base.clone(),
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

        let _: proto::DeleteNodeResponse =
            self.post(PATH_DELETE_NODE, &proto::DeleteNodeRequest { node: Some(node) }).await?;

        Ok(())
    }

    async fn close(&mut self) -> crate::Result<()> {
        self.stop_heartbeat();

        Ok(())
    }
}

fn classify_reqwest(error: reqwest::Error) -> retry::Error {
    if error.is_connect() || error.is_timeout() {
        retry::Error::Transient(Error::http(error))
    } else {
        retry::Error::Permanent(Error::http(error))
    }
}

/// Announce liveness every `interval * U(0.5, 0.9)` until shutdown.
async fn heartbeat(
    http: reqwest::Client,
    base: String,
    node: proto::Node,
    interval: Duration,
    mut shutdown: Shutdown,
) {
    use prost::Message as _;

    let url = format!("{base}/{PATH_PING}");

    loop {
        let fraction = rand::thread_rng().gen_range(0.5..0.9);

        if shutdown.sleep(interval.mul_f64(fraction)).await.is_err() {
            return;
        }

        let request =
            proto::PingRequest { node: Some(node), ping_interval: interval.as_secs_f64() };

        let sent = http
            .post(&url)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .body(request.encode_length_delimited_to_vec())
            .send()
            .await;

        match sent {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                log::warn!("heartbeat to the broker failed with {}", response.status());
            }
            Err(error) => log::warn!("heartbeat to the broker failed: {error}"),
        }
    }
}
