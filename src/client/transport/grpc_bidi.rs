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

use async_stream::stream;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tonic::codec::Streaming;
use tonic::transport::Channel;

use super::{
    classify_status,
    Connection,
};
use crate::proto::duplex_client::DuplexClient;
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

/// How long one `receive` poll waits on the stream before reporting "nothing
/// ready yet".
const RECEIVE_POLL: Duration = Duration::from_secs(1);

/// The legacy transport: one long-lived duplex stream per session.
///
/// The stream itself is the node's identity, so announcing and withdrawing the
/// node are the trait's no-ops.
pub(crate) struct BidiConnection {
    outbound: Option<mpsc::Sender<proto::TaskRes>>,
    inbound: Streaming<proto::TaskIns>,
}

impl BidiConnection {
    pub(crate) async fn open(
        channel: Channel,
        max_message_bytes: usize,
        retry: RetryInvoker,
        mut shutdown: Shutdown,
    ) -> crate::Result<Self> {
        let client = DuplexClient::new(channel)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes);

        let (outbound, inbound) = retry
            .invoke(&mut shutdown, || {
                let mut client = client.clone();
                async move {
                    // a fresh reply queue per attempt; the previous one died
                    // with its failed stream
                    let (tx, mut rx) = mpsc::channel::<proto::TaskRes>(1);

                    let replies = stream! {
                        while let Some(task_res) = rx.recv().await {
                            yield task_res;
                        }
                    };

                    let response = client.join(replies).await.map_err(classify_status)?;

                    Ok((tx, response.into_inner()))
                }
            })
            .await?;

        Ok(Self { outbound: Some(outbound), inbound })
    }
}

#[async_trait]
impl Connection for BidiConnection {
    async fn receive(&mut self) -> crate::Result<Option<Message>> {
        match tokio::time::timeout(RECEIVE_POLL, self.inbound.message()).await {
            // nothing ready within the poll window
            Err(_) => Ok(None),
            Ok(Ok(Some(task_ins))) => Ok(Some(TaskIns::from_protobuf(task_ins)?.into_message())),
            Ok(Ok(None)) => Err(Error::protocol("broker closed the instruction stream")),
            Ok(Err(status)) => Err(status.into()),
        }
    }

    async fn send(&mut self, message: Message) -> crate::Result<()> {
        let task_res = TaskRes::from_message(message).to_protobuf();

        self.outbound
            .as_ref()
            .ok_or_else(|| Error::protocol("transport scope already closed"))?
            .send(task_res)
            .await
            .map_err(|_| Error::protocol("the reply stream is closed"))
    }

    async fn close(&mut self) -> crate::Result<()> {
        // dropping the sender half-closes the stream; the broker sees a clean
        // end of replies
        self.outbound = None;

        Ok(())
    }
}
