/*
 * execute_reply.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// Reply to `execute_request` when the command ran (`ok`) or was skipped or
/// canceled (`abort`). Failures use `ExecuteReplyException` instead.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteReply {
    pub status: Status,

    /// The kernel's execution counter after this request
    pub execution_count: u32,

    /// Always empty; user expressions aren't evaluated remotely
    pub user_expressions: Value,
}

impl MessageType for ExecuteReply {
    fn message_type() -> String {
        String::from("execute_reply")
    }
}
