/*
 * comm_msg.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// A `comm_msg`, in either direction. The payload is whatever the comm's
/// target agreed on with the frontend.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CommWireMsg {
    pub comm_id: String,

    /// Missing data is read as `null`
    #[serde(default)]
    pub data: serde_json::Value,
}

impl MessageType for CommWireMsg {
    fn message_type() -> String {
        String::from("comm_msg")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_missing_data_is_null() {
        let msg: CommWireMsg = serde_json::from_value(json!({"comm_id": "abc"})).unwrap();
        assert_eq!(msg.comm_id, "abc");
        assert!(msg.data.is_null());
    }
}
