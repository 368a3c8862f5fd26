/*
 * execute_request.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::wire::jupyter_message::MessageType;

/// A cell to run on the remote cluster. Only `code` is required; frontends
/// routinely leave the flags out.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteRequest {
    /// Cell source, possibly starting with a `%magic` line
    pub code: String,

    #[serde(default)]
    pub silent: bool,

    #[serde(default = "enabled")]
    pub store_history: bool,

    /// Accepted for compatibility and ignored
    #[serde(default)]
    pub user_expressions: Value,

    /// The remote backend never prompts, so this is ignored as well
    #[serde(default)]
    pub allow_stdin: bool,

    #[serde(default = "enabled")]
    pub stop_on_error: bool,
}

fn enabled() -> bool {
    true
}

impl MessageType for ExecuteRequest {
    fn message_type() -> String {
        String::from("execute_request")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults_for_missing_flags() {
        let req: ExecuteRequest = serde_json::from_value(json!({"code": "1 + 1"})).unwrap();
        assert_eq!(req.code, "1 + 1");
        assert!(!req.silent);
        assert!(req.store_history);
        assert!(!req.allow_stdin);
        assert!(req.stop_on_error);
        assert!(req.user_expressions.is_null());
    }

    #[test]
    fn test_code_is_required() {
        let req = serde_json::from_value::<ExecuteRequest>(json!({"silent": true}));
        assert!(req.is_err());
    }
}
