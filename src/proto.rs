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

//! On-wire records for the `fedlink.Fleet` and `fedlink.Duplex` services.
//!
//! Hand-maintained in the shape `tonic-build` emits so the wire layer stays a
//! plain Rust module; keep field tags stable.

/// One side of a task on the wire; `node_id = 0` with `anonymous = true`
/// matches any worker.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Node {
    #[prost(int64, tag = "1")]
    pub node_id: i64,
    #[prost(bool, tag = "2")]
    pub anonymous: bool,
}

/// The failure channel of a reply.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageError {
    #[prost(uint64, tag = "1")]
    pub code: u64,
    #[prost(string, tag = "2")]
    pub reason: ::prost::alloc::string::String,
}

/// Control payload: drop the connection, come back after `seconds` (0 = stop).
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Reconnect {
    #[prost(uint64, tag = "1")]
    pub seconds: u64,
}

/// Control reply payload acknowledging a [`Reconnect`].
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Disconnect {
    #[prost(enumeration = "Reason", tag = "1")]
    pub reason: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Reason {
    Unknown = 0,
    Reconnect = 1,
    Ack = 2,
}

impl Reason {
    /// String value of the enum field names used in the ProtoBuf definition.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Reason::Unknown => "UNKNOWN",
            Reason::Reconnect => "RECONNECT",
            Reason::Ack => "ACK",
        }
    }
}

/// Typed payload of a task or message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Payload {
    #[prost(oneof = "payload::Kind", tags = "1, 2, 3, 4")]
    pub kind: ::core::option::Option<payload::Kind>,
}

/// Nested message and enum types in `Payload`.
pub mod payload {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        /// Opaque application content.
        #[prost(bytes = "vec", tag = "1")]
        Content(::prost::alloc::vec::Vec<u8>),
        #[prost(message, tag = "2")]
        Reconnect(super::Reconnect),
        #[prost(message, tag = "3")]
        Disconnect(super::Disconnect),
        #[prost(message, tag = "4")]
        Error(super::MessageError),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Task {
    #[prost(message, optional, tag = "1")]
    pub producer: ::core::option::Option<Node>,
    #[prost(message, optional, tag = "2")]
    pub consumer: ::core::option::Option<Node>,
    /// ISO-8601 UTC; empty means undelivered.
    #[prost(string, tag = "3")]
    pub delivered_at: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "4")]
    pub ancestry: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "5")]
    pub task_type: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "6")]
    pub payload: ::core::option::Option<Payload>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskIns {
    #[prost(string, tag = "1")]
    pub task_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub group_id: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub run_id: i64,
    #[prost(message, optional, tag = "4")]
    pub task: ::core::option::Option<Task>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskRes {
    #[prost(string, tag = "1")]
    pub task_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub group_id: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub run_id: i64,
    #[prost(message, optional, tag = "4")]
    pub task: ::core::option::Option<Task>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CreateNodeRequest {}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CreateNodeResponse {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<Node>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeleteNodeRequest {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<Node>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeleteNodeResponse {}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PingRequest {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<Node>,
    /// Seconds until the node should be considered offline without another ping.
    #[prost(double, tag = "2")]
    pub ping_interval: f64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PingResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PullTaskInsRequest {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<Node>,
    #[prost(string, repeated, tag = "2")]
    pub task_ids: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PullTaskInsResponse {
    #[prost(message, repeated, tag = "1")]
    pub task_ins_list: ::prost::alloc::vec::Vec<TaskIns>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushTaskResRequest {
    #[prost(message, repeated, tag = "1")]
    pub task_res_list: ::prost::alloc::vec::Vec<TaskRes>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PushTaskResResponse {}

/// Generated client implementations.
pub mod fleet_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]

    use tonic::codegen::http::Uri;
    use tonic::codegen::*;

    /// Unary request/response endpoints the broker exposes to worker nodes.
    #[derive(Debug, Clone)]
    pub struct FleetClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl FleetClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> FleetClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        /// Limits the maximum size of a decoded message.
        ///
        /// Default: `4MB`
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_decoding_message_size(limit);
            self
        }

        /// Limits the maximum size of an encoded message.
        ///
        /// Default: `usize::MAX`
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_encoding_message_size(limit);
            self
        }

        pub async fn create_node(
            &mut self,
            request: impl tonic::IntoRequest<super::CreateNodeRequest>,
        ) -> std::result::Result<tonic::Response<super::CreateNodeResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/fedlink.Fleet/CreateNode");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new("fedlink.Fleet", "CreateNode"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn delete_node(
            &mut self,
            request: impl tonic::IntoRequest<super::DeleteNodeRequest>,
        ) -> std::result::Result<tonic::Response<super::DeleteNodeResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/fedlink.Fleet/DeleteNode");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new("fedlink.Fleet", "DeleteNode"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn ping(
            &mut self,
            request: impl tonic::IntoRequest<super::PingRequest>,
        ) -> std::result::Result<tonic::Response<super::PingResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/fedlink.Fleet/Ping");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new("fedlink.Fleet", "Ping"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn pull_task_ins(
            &mut self,
            request: impl tonic::IntoRequest<super::PullTaskInsRequest>,
        ) -> std::result::Result<tonic::Response<super::PullTaskInsResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/fedlink.Fleet/PullTaskIns");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new("fedlink.Fleet", "PullTaskIns"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn push_task_res(
            &mut self,
            request: impl tonic::IntoRequest<super::PushTaskResRequest>,
        ) -> std::result::Result<tonic::Response<super::PushTaskResResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/fedlink.Fleet/PushTaskRes");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new("fedlink.Fleet", "PushTaskRes"));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Generated client implementations.
pub mod duplex_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]

    use tonic::codegen::http::Uri;
    use tonic::codegen::*;

    /// The legacy long-lived duplex stream; session identity is the stream.
    #[derive(Debug, Clone)]
    pub struct DuplexClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl DuplexClient<tonic::transport::Channel> {
        /// Attempt to create a new client by connecting to a given endpoint.
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> DuplexClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        /// Limits the maximum size of a decoded message.
        ///
        /// Default: `4MB`
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_decoding_message_size(limit);
            self
        }

        /// Limits the maximum size of an encoded message.
        ///
        /// Default: `usize::MAX`
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_encoding_message_size(limit);
            self
        }

        pub async fn join(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = super::TaskRes>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<super::TaskIns>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/fedlink.Duplex/Join");
            let mut req = request.into_streaming_request();
            req.extensions_mut().insert(GrpcMethod::new("fedlink.Duplex", "Join"));
            self.inner.streaming(req, path, codec).await
        }
    }
}
