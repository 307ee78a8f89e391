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

use crate::{
    DisconnectReason,
    Message,
    Payload,
};

/// Classify an inbound message as control vs. normal work.
///
/// A reconnect directive yields the canonical disconnect reply and the sleep
/// hint (zero means terminate); anything else yields `None` and the caller
/// proceeds to application handling.
pub(crate) fn handle_control_message(message: &Message) -> Option<(Message, Duration)> {
    match message.payload {
        Payload::Reconnect { seconds } => {
            let reason =
                if seconds > 0 { DisconnectReason::Reconnect } else { DisconnectReason::Ack };

            let reply = message.reply(Payload::Disconnect { reason });

            Some((reply, Duration::from_secs(seconds)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use time::OffsetDateTime;

    use super::handle_control_message;
    use crate::{
        DisconnectReason,
        Message,
        MessageType,
        Metadata,
        Payload,
    };

    fn message(message_type: MessageType, payload: Payload) -> Message {
        Message {
            metadata: Metadata {
                message_id: "d79f1fa8-283b-44e7-8966-6f366f0a8a9a".to_owned(),
                run_id: 3,
                group_id: String::new(),
                message_type,
                src_node_id: 0,
                dst_node_id: 42,
                reply_to: String::new(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            payload,
        }
    }

    #[test]
    fn reconnect_yields_disconnect_reply() {
        let control = message(MessageType::Reconnect, Payload::Reconnect { seconds: 5 });

        let (reply, sleep) = handle_control_message(&control).unwrap();

        assert_eq!(sleep, Duration::from_secs(5));
        assert_eq!(reply.payload, Payload::Disconnect { reason: DisconnectReason::Reconnect });
        assert_eq!(reply.metadata.reply_to, control.metadata.message_id);
    }

    #[test]
    fn terminate_is_acknowledged() {
        let control = message(MessageType::Reconnect, Payload::Reconnect { seconds: 0 });

        let (reply, sleep) = handle_control_message(&control).unwrap();

        assert_eq!(sleep, Duration::ZERO);
        assert_eq!(reply.payload, Payload::Disconnect { reason: DisconnectReason::Ack });
    }

    #[test]
    fn work_messages_pass_through() {
        let work = message(MessageType::Train, Payload::Content(Bytes::from_static(b"params")));

        assert!(handle_control_message(&work).is_none());
    }
}
