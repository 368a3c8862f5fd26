/*
 * interrupt_reply.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// Acknowledges an interrupt. Sent as soon as the flag is raised, before the
/// remote command has actually been canceled.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterruptReply {
    pub status: Status,
}

impl MessageType for InterruptReply {
    fn message_type() -> String {
        String::from("interrupt_reply")
    }
}
