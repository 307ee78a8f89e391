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

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::protobuf::{
    FromProtobuf,
    ToProtobuf,
};
use crate::{
    proto,
    Error,
};

/// What a message instructs the receiving side to do.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Fit the model on local data.
    Train,

    /// Evaluate the model on local data.
    Evaluate,

    /// Run an arbitrary user query.
    Query,

    /// Report client properties.
    GetProperties,

    /// Report current model parameters.
    GetParameters,

    /// Control: drop the connection and possibly come back later.
    Reconnect,

    /// Control reply: the node acknowledges it is going away.
    Disconnect,
}

impl MessageType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Evaluate => "evaluate",
            Self::Query => "query",
            Self::GetProperties => "get_properties",
            Self::GetParameters => "get_parameters",
            Self::Reconnect => "reconnect",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Self::Train),
            "evaluate" => Ok(Self::Evaluate),
            "query" => Ok(Self::Query),
            "get_properties" => Ok(Self::GetProperties),
            "get_parameters" => Ok(Self::GetParameters),
            "reconnect" => Ok(Self::Reconnect),
            "disconnect" => Ok(Self::Disconnect),
            _ => Err(Error::basic_parse(format!("unknown message type: `{s}`"))),
        }
    }
}

/// Why a node is disconnecting, carried in the [`Payload::Disconnect`] reply.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No reason was given.
    Unknown,

    /// The node intends to come back after the announced sleep.
    Reconnect,

    /// Plain acknowledgement; the node is going away for good.
    Ack,
}

/// The failure channel of a reply: a non-empty reason plus a numeric code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageError {
    /// Numeric error code; 0 is the catch-all.
    pub code: u64,

    /// Human-readable failure description.
    pub reason: String,
}

/// Typed payload of a [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Opaque application content, interpreted only by the client app and the
    /// upstream planner.
    Content(Bytes),

    /// Control: disconnect now, reconnect after `seconds` (0 means terminate).
    Reconnect { seconds: u64 },

    /// Control reply to [`Payload::Reconnect`].
    Disconnect { reason: DisconnectReason },

    /// The reply failed; see [`MessageError`].
    Error(MessageError),
}

/// Identity and routing data carried by every [`Message`].
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// UUID of this message, unique within a run.
    pub message_id: String,

    /// The run this message belongs to.
    pub run_id: i64,

    /// Groups messages of one round; opaque to the node.
    pub group_id: String,

    /// What the receiving side is expected to do.
    pub message_type: MessageType,

    /// Node that produced this message; 0 for the broker side.
    pub src_node_id: i64,

    /// Node this message is addressed to; 0 for the broker side.
    pub dst_node_id: i64,

    /// `message_id` of the message this one answers; empty for instructions.
    pub reply_to: String,

    /// When this message was fabricated.
    pub created_at: OffsetDateTime,
}

/// What the session loop pumps: one instruction or one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Identity and routing data.
    pub metadata: Metadata,

    /// The typed payload.
    pub payload: Payload,
}

impl Message {
    /// Fabricate a reply to this message: fresh id, identity mirrored,
    /// producer and consumer inverted.
    #[must_use]
    pub fn reply(&self, payload: Payload) -> Self {
        Self {
            metadata: Metadata {
                message_id: Uuid::new_v4().to_string(),
                run_id: self.metadata.run_id,
                group_id: self.metadata.group_id.clone(),
                message_type: self.metadata.message_type,
                src_node_id: self.metadata.dst_node_id,
                dst_node_id: self.metadata.src_node_id,
                reply_to: self.metadata.message_id.clone(),
                created_at: OffsetDateTime::now_utc(),
            },
            payload,
        }
    }

    /// Fabricate a reply carrying the failure channel.
    #[must_use]
    pub fn error_reply(&self, code: u64, reason: impl Into<String>) -> Self {
        self.reply(Payload::Error(MessageError { code, reason: reason.into() }))
    }
}

impl FromProtobuf<proto::Reason> for DisconnectReason {
    fn from_protobuf(pb: proto::Reason) -> crate::Result<Self> {
        Ok(match pb {
            proto::Reason::Unknown => Self::Unknown,
            proto::Reason::Reconnect => Self::Reconnect,
            proto::Reason::Ack => Self::Ack,
        })
    }
}

impl ToProtobuf for DisconnectReason {
    type Protobuf = proto::Reason;

    fn to_protobuf(&self) -> Self::Protobuf {
        match self {
            Self::Unknown => proto::Reason::Unknown,
            Self::Reconnect => proto::Reason::Reconnect,
            Self::Ack => proto::Reason::Ack,
        }
    }
}

impl FromProtobuf<proto::Payload> for Payload {
    fn from_protobuf(pb: proto::Payload) -> crate::Result<Self> {
        let kind = pb_getf!(pb, kind)?;

        Ok(match kind {
            proto::payload::Kind::Content(content) => Self::Content(Bytes::from(content)),
            proto::payload::Kind::Reconnect(it) => Self::Reconnect { seconds: it.seconds },
            proto::payload::Kind::Disconnect(it) => Self::Disconnect {
                reason: DisconnectReason::from_protobuf(
                    proto::Reason::try_from(it.reason).map_err(Error::from_protobuf)?,
                )?,
            },
            proto::payload::Kind::Error(it) => {
                Self::Error(MessageError { code: it.code, reason: it.reason })
            }
        })
    }
}

impl ToProtobuf for Payload {
    type Protobuf = proto::Payload;

    fn to_protobuf(&self) -> Self::Protobuf {
        let kind = match self {
            Self::Content(content) => proto::payload::Kind::Content(content.to_vec()),
            Self::Reconnect { seconds } => {
                proto::payload::Kind::Reconnect(proto::Reconnect { seconds: *seconds })
            }
            Self::Disconnect { reason } => proto::payload::Kind::Disconnect(proto::Disconnect {
                reason: reason.to_protobuf() as i32,
            }),
            Self::Error(error) => proto::payload::Kind::Error(proto::MessageError {
                code: error.code,
                reason: error.reason.clone(),
            }),
        };

        proto::Payload { kind: Some(kind) }
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
        Payload,
    };

    fn instruction() -> Message {
        Message {
            metadata: Metadata {
                message_id: "5cbb66a6-6b67-4096-bbe5-ec8b26a18bb5".to_owned(),
                run_id: 616,
                group_id: "round-3".to_owned(),
                message_type: MessageType::Train,
                src_node_id: 0,
                dst_node_id: 42,
                reply_to: String::new(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            payload: Payload::Content(Bytes::from_static(b"weights")),
        }
    }

    #[test]
    fn reply_mirrors_identity() {
        let message = instruction();
        let reply = message.reply(Payload::Content(Bytes::from_static(b"update")));

        assert_eq!(reply.metadata.run_id, 616);
        assert_eq!(reply.metadata.group_id, "round-3");
        assert_eq!(reply.metadata.message_type, MessageType::Train);
        assert_eq!(reply.metadata.reply_to, message.metadata.message_id);
        assert_ne!(reply.metadata.message_id, message.metadata.message_id);
    }

    #[test]
    fn reply_inverts_producer_and_consumer() {
        let reply = instruction().reply(Payload::Content(Bytes::new()));

        assert_eq!(reply.metadata.src_node_id, 42);
        assert_eq!(reply.metadata.dst_node_id, 0);
    }

    #[test]
    fn error_reply_is_failure_channel() {
        let reply = instruction().error_reply(0, "App:division by zero");

        let Payload::Error(error) = &reply.payload else {
            panic!("expected an error payload, got {:?}", reply.payload)
        };

        assert_eq!(error.code, 0);
        assert_eq!(error.reason, "App:division by zero");
    }

    #[test]
    fn message_type_round_trips_through_str() {
        for ty in [
            MessageType::Train,
            MessageType::Evaluate,
            MessageType::Query,
            MessageType::GetProperties,
            MessageType::GetParameters,
            MessageType::Reconnect,
            MessageType::Disconnect,
        ] {
            assert_eq!(ty.to_string().parse::<MessageType>().unwrap(), ty);
        }

        assert!("gossip".parse::<MessageType>().is_err());
    }

    #[test]
    fn payload_to_from_pb() {
        let payload = Payload::Reconnect { seconds: 5 };
        let pb = payload.to_protobuf();

        assert_eq!(Payload::from_protobuf(pb).unwrap(), payload);
    }

    #[test]
    fn empty_payload_kind_is_rejected() {
        assert!(Payload::from_protobuf(crate::proto::Payload { kind: None }).is_err());
    }
}
