/*
 * interrupt_request.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Sent on the control channel to cancel the command in flight, if any.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterruptRequest {}

impl MessageType for InterruptRequest {
    fn message_type() -> String {
        String::from("interrupt_request")
    }
}
