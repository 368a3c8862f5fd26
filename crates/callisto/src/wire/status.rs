/*
 * status.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Published on IOPub around every shell request, and once at startup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KernelStatus {
    pub execution_state: ExecutionState,
}

impl MessageType for KernelStatus {
    fn message_type() -> String {
        String::from("status")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Busy,
    Idle,

    /// Sent once, after the frontend has subscribed to IOPub
    Starting,
}
