/*
 * comm_info_reply.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// The kernel's answer to `comm_info_request`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommInfoReply {
    pub status: Status,

    /// Comm id to `{"target_name": ...}`
    pub comms: Map<String, Value>,
}

/// Value stored under each comm id in [CommInfoReply::comms]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommInfoTargetName {
    pub target_name: String,
}

impl MessageType for CommInfoReply {
    fn message_type() -> String {
        String::from("comm_info_reply")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_comms_keyed_by_id() {
        let mut comms = Map::new();
        let target = CommInfoTargetName {
            target_name: String::from("databricks.config"),
        };
        comms.insert(String::from("abc"), serde_json::to_value(target).unwrap());

        let reply = CommInfoReply {
            status: Status::Ok,
            comms,
        };
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            json!({"status": "ok", "comms": {"abc": {"target_name": "databricks.config"}}})
        );
    }
}
