/*
 * shutdown_reply.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShutdownReply {
    pub status: Status,

    /// Echoes the `restart` flag of the request
    pub restart: bool,
}

impl MessageType for ShutdownReply {
    fn message_type() -> String {
        String::from("shutdown_reply")
    }
}
