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

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    Context,
    Message,
};

/// Error type a [`ClientApp`] may fail with.
pub type AppError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The user-supplied computation invoked once per inbound work message.
///
/// Receives the message plus the run's [`Context`], which it may mutate in
/// place, and returns the reply to send back. The session loop fabricates an
/// error reply (and discards the context changes) if this fails.
pub trait ClientApp: Send + Sync {
    /// Execute the computation `message` asks for and produce the reply.
    fn handle(&self, message: &Message, context: &mut Context) -> Result<Message, AppError>;
}

impl<F> ClientApp for F
where
    F: Fn(&Message, &mut Context) -> Result<Message, AppError> + Send + Sync,
{
    fn handle(&self, message: &Message, context: &mut Context) -> Result<Message, AppError> {
        self(message, context)
    }
}

/// Link-time table resolving a `module:attribute` style app reference to the
/// [`ClientApp`] registered under it.
#[derive(Default)]
pub struct AppRegistry {
    apps: HashMap<String, Arc<dyn ClientApp>>,
}

impl AppRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `app` under `reference`, replacing any previous registration.
    pub fn register(&mut self, reference: impl Into<String>, app: Arc<dyn ClientApp>) {
        self.apps.insert(reference.into(), app);
    }

    /// Look up the app registered under `reference`.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<Arc<dyn ClientApp>> {
        self.apps.get(reference).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use time::OffsetDateTime;

    use super::{
        AppError,
        AppRegistry,
        ClientApp,
    };
    use crate::{
        Context,
        Message,
        MessageType,
        Metadata,
        Payload,
    };

    fn echo(message: &Message, _context: &mut Context) -> Result<Message, AppError> {
        Ok(message.reply(message.payload.clone()))
    }

    #[test]
    fn closures_are_client_apps() {
        let message = Message {
            metadata: Metadata {
                message_id: "m-1".to_owned(),
                run_id: 1,
                group_id: String::new(),
                message_type: MessageType::Query,
                src_node_id: 0,
                dst_node_id: 5,
                reply_to: String::new(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            payload: Payload::Content(Bytes::from_static(b"ping")),
        };

        let mut context = Context { run_id: 1, records: Default::default() };

        let reply = echo.handle(&message, &mut context).unwrap();
        assert_eq!(reply.payload, message.payload);
    }

    #[test]
    fn registry_resolves_by_reference() {
        let mut registry = AppRegistry::new();
        registry.register("demo:echo", Arc::new(echo));

        assert!(registry.resolve("demo:echo").is_some());
        assert!(registry.resolve("demo:missing").is_none());
    }
}
