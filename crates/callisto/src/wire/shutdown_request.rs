/*
 * shutdown_request.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Asks the kernel to release its remote resources and exit.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShutdownRequest {
    /// Set when the frontend intends to start a fresh kernel right after
    #[serde(default)]
    pub restart: bool,
}

impl MessageType for ShutdownRequest {
    fn message_type() -> String {
        String::from("shutdown_request")
    }
}
