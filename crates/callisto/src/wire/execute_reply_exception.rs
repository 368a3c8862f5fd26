/*
 * execute_reply_exception.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::exception::Exception;
use crate::wire::jupyter_message::MessageType;
use crate::wire::jupyter_message::Status;

/// The `execute_reply` sent when a command fails. `status` is always
/// [Status::Error].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteReplyException {
    pub status: Status,

    /// Failed commands still consume an execution count
    pub execution_count: u32,

    #[serde(flatten)]
    pub exception: Exception,
}

impl MessageType for ExecuteReplyException {
    fn message_type() -> String {
        String::from("execute_reply")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_exception_fields_are_flattened() {
        let reply = ExecuteReplyException {
            status: Status::Error,
            execution_count: 3,
            exception: Exception {
                ename: String::from("ClusterNotOnline"),
                evalue: String::from("Cluster is not online."),
                traceback: vec![],
            },
        };
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            json!({
                "status": "error",
                "execution_count": 3,
                "ename": "ClusterNotOnline",
                "evalue": "Cluster is not online.",
                "traceback": [],
            })
        );
    }
}
