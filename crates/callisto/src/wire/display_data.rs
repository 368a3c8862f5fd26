/*
 * display_data.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;

/// Rich output published on IOPub. Tabular results go out as one of these,
/// with a JSON and a plain text rendering side by side.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DisplayData {
    /// MIME type to rendering
    pub data: Value,

    pub metadata: Value,

    pub transient: Value,
}

impl MessageType for DisplayData {
    fn message_type() -> String {
        String::from("display_data")
    }
}
