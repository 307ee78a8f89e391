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

use std::str::FromStr;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::protobuf::{
    FromProtobuf,
    ToProtobuf,
};
use crate::{
    proto,
    Error,
    Message,
    MessageType,
    Metadata,
    Payload,
};

/// One side of a task: either a specific node or "any worker".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NodeRef {
    /// The node's id; 0 for the anonymous form.
    pub node_id: i64,

    /// Whether this side matches any worker. Holds exactly when `node_id` is 0.
    pub anonymous: bool,
}

impl NodeRef {
    /// Matches any worker.
    pub const ANONYMOUS: Self = Self { node_id: 0, anonymous: true };

    /// Matches exactly one node.
    #[must_use]
    pub fn node(node_id: i64) -> Self {
        Self { node_id, anonymous: false }
    }

    /// 0 is the broker side and maps to the anonymous form.
    #[must_use]
    pub fn from_id(node_id: i64) -> Self {
        if node_id == 0 {
            Self::ANONYMOUS
        } else {
            Self::node(node_id)
        }
    }
}

/// The inner task record shared by [`TaskIns`] and [`TaskRes`].
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// The side that created this task.
    pub producer: NodeRef,

    /// The side this task is addressed to.
    pub consumer: NodeRef,

    /// ISO-8601 UTC timestamp of first delivery; empty string means undelivered.
    pub delivered_at: String,

    /// Parent task ids; `ancestry[0]` of a reply names the instruction it answers.
    pub ancestry: Vec<String>,

    /// What the consumer is expected to do.
    pub message_type: MessageType,

    /// The typed payload.
    pub payload: Payload,
}

/// An instruction task as stored and dispatched by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskIns {
    /// Assigned by the store on admission; empty before.
    pub task_id: String,

    /// Groups tasks of one round.
    pub group_id: String,

    /// The run this task belongs to.
    pub run_id: i64,

    /// The inner task record.
    pub task: Task,
}

/// A reply task, paired to its instruction through `task.ancestry[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRes {
    /// Assigned by the store on admission; empty before.
    pub task_id: String,

    /// Groups tasks of one round.
    pub group_id: String,

    /// The run this task belongs to.
    pub run_id: i64,

    /// The inner task record.
    pub task: Task,
}

impl TaskIns {
    /// Build an instruction task from a broker-side message.
    #[must_use]
    pub fn from_message(message: Message) -> Self {
        Self {
            task_id: String::new(),
            group_id: message.metadata.group_id,
            run_id: message.metadata.run_id,
            task: Task {
                producer: NodeRef::from_id(message.metadata.src_node_id),
                consumer: NodeRef::from_id(message.metadata.dst_node_id),
                delivered_at: String::new(),
                ancestry: Vec::new(),
                message_type: message.metadata.message_type,
                payload: message.payload,
            },
        }
    }

    /// View this instruction as the message the session loop pumps.
    ///
    /// The store-assigned `task_id` becomes the message id, which replies
    /// reference through their `reply_to` field.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message {
            metadata: Metadata {
                message_id: self.task_id,
                run_id: self.run_id,
                group_id: self.group_id,
                message_type: self.task.message_type,
                src_node_id: self.task.producer.node_id,
                dst_node_id: self.task.consumer.node_id,
                reply_to: String::new(),
                created_at: OffsetDateTime::now_utc(),
            },
            payload: self.task.payload,
        }
    }
}

impl TaskRes {
    /// Build a reply task from a node-side reply message.
    ///
    /// The message's `reply_to` becomes `ancestry[0]`, pairing the reply to
    /// the instruction it answers.
    #[must_use]
    pub fn from_message(message: Message) -> Self {
        Self {
            task_id: String::new(),
            group_id: message.metadata.group_id,
            run_id: message.metadata.run_id,
            task: Task {
                producer: NodeRef::from_id(message.metadata.src_node_id),
                consumer: NodeRef::from_id(message.metadata.dst_node_id),
                delivered_at: String::new(),
                ancestry: vec![message.metadata.reply_to],
                message_type: message.metadata.message_type,
                payload: message.payload,
            },
        }
    }

    /// View this reply as a message for the broker-side consumer.
    #[must_use]
    pub fn into_message(self) -> Message {
        let reply_to = self.task.ancestry.first().cloned().unwrap_or_default();

        Message {
            metadata: Metadata {
                message_id: self.task_id,
                run_id: self.run_id,
                group_id: self.group_id,
                message_type: self.task.message_type,
                src_node_id: self.task.producer.node_id,
                dst_node_id: self.task.consumer.node_id,
                reply_to,
                created_at: OffsetDateTime::now_utc(),
            },
            payload: self.task.payload,
        }
    }
}

/// Mint a fresh task id in its on-wire form.
pub(crate) fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

impl FromProtobuf<proto::Node> for NodeRef {
    fn from_protobuf(pb: proto::Node) -> crate::Result<Self> {
        Ok(Self { node_id: pb.node_id, anonymous: pb.anonymous })
    }
}

impl ToProtobuf for NodeRef {
    type Protobuf = proto::Node;

    fn to_protobuf(&self) -> Self::Protobuf {
        proto::Node { node_id: self.node_id, anonymous: self.anonymous }
    }
}

impl FromProtobuf<proto::Task> for Task {
    fn from_protobuf(pb: proto::Task) -> crate::Result<Self> {
        let producer = NodeRef::from_protobuf(pb_getf!(pb, producer)?)?;
        let consumer = NodeRef::from_protobuf(pb_getf!(pb, consumer)?)?;
        let payload = Payload::from_protobuf(pb_getf!(pb, payload)?)?;

        Ok(Self {
            producer,
            consumer,
            delivered_at: pb.delivered_at,
            ancestry: pb.ancestry,
            message_type: MessageType::from_str(&pb.task_type)
                .map_err(|_| Error::from_protobuf(format!("unknown task type `{}`", pb.task_type)))?,
            payload,
        })
    }
}

impl ToProtobuf for Task {
    type Protobuf = proto::Task;

    fn to_protobuf(&self) -> Self::Protobuf {
        proto::Task {
            producer: Some(self.producer.to_protobuf()),
            consumer: Some(self.consumer.to_protobuf()),
            delivered_at: self.delivered_at.clone(),
            ancestry: self.ancestry.clone(),
            task_type: self.message_type.to_string(),
            payload: Some(self.payload.to_protobuf()),
        }
    }
}

impl FromProtobuf<proto::TaskIns> for TaskIns {
    fn from_protobuf(pb: proto::TaskIns) -> crate::Result<Self> {
        Ok(Self {
            task_id: pb.task_id,
            group_id: pb.group_id,
            run_id: pb.run_id,
            task: Task::from_protobuf(pb_getf!(pb, task)?)?,
        })
    }
}

impl ToProtobuf for TaskIns {
    type Protobuf = proto::TaskIns;

    fn to_protobuf(&self) -> Self::Protobuf {
        proto::TaskIns {
            task_id: self.task_id.clone(),
            group_id: self.group_id.clone(),
            run_id: self.run_id,
            task: Some(self.task.to_protobuf()),
        }
    }
}

impl FromProtobuf<proto::TaskRes> for TaskRes {
    fn from_protobuf(pb: proto::TaskRes) -> crate::Result<Self> {
        Ok(Self {
            task_id: pb.task_id,
            group_id: pb.group_id,
            run_id: pb.run_id,
            task: Task::from_protobuf(pb_getf!(pb, task)?)?,
        })
    }
}

impl ToProtobuf for TaskRes {
    type Protobuf = proto::TaskRes;

    fn to_protobuf(&self) -> Self::Protobuf {
        proto::TaskRes {
            task_id: self.task_id.clone(),
            group_id: self.group_id.clone(),
            run_id: self.run_id,
            task: Some(self.task.to_protobuf()),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use time::OffsetDateTime;

    use crate::protobuf::{
        FromProtobuf,
        ToProtobuf,
    };
    use crate::{
        Message,
        MessageType,
        Metadata,
        NodeRef,
        Payload,
        TaskIns,
        TaskRes,
    };

    fn instruction_for(node_id: i64) -> TaskIns {
        TaskIns::from_message(Message {
            metadata: Metadata {
                message_id: String::new(),
                run_id: 7,
                group_id: "round-1".to_owned(),
                message_type: MessageType::Evaluate,
                src_node_id: 0,
                dst_node_id: node_id,
                reply_to: String::new(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            payload: Payload::Content(Bytes::from_static(b"params")),
        })
    }

    #[test]
    fn from_message_routes_consumer() {
        let ins = instruction_for(42);

        assert_eq!(ins.task.producer, NodeRef::ANONYMOUS);
        assert_eq!(ins.task.consumer, NodeRef::node(42));
        assert!(ins.task.ancestry.is_empty());
        assert!(ins.task_id.is_empty());
        assert!(ins.task.delivered_at.is_empty());
    }

    #[test]
    fn reply_carries_ancestry() {
        let mut ins = instruction_for(42);
        ins.task_id = "e21bc8a0-4625-43b0-9f27-9177e30e6620".to_owned();

        let message = ins.clone().into_message();
        let reply = message.reply(Payload::Content(Bytes::from_static(b"update")));
        let res = TaskRes::from_message(reply);

        assert_eq!(res.task.ancestry, vec![ins.task_id]);
        assert_eq!(res.task.producer, NodeRef::node(42));
        assert_eq!(res.task.consumer, NodeRef::ANONYMOUS);
        assert_eq!(res.run_id, 7);
    }

    #[test]
    fn task_ins_to_from_pb() {
        let mut ins = instruction_for(42);
        ins.task_id = "0ee45bd6-a662-42d8-81b9-13fcaf44f389".to_owned();

        let round_tripped = TaskIns::from_protobuf(ins.to_protobuf()).unwrap();

        assert_eq!(ins, round_tripped);
    }

    #[test]
    fn task_missing_consumer_is_rejected() {
        let mut pb = instruction_for(42).to_protobuf();
        pb.task.as_mut().unwrap().consumer = None;

        assert!(TaskIns::from_protobuf(pb).is_err());
    }
}
