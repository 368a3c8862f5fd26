/*
 * stream.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::MessageType;

/// Text output published on IOPub. Plain results go to stdout, error
/// summaries and cancellation notices to stderr.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StreamOutput {
    pub name: Stream,
    pub text: String,
}

impl MessageType for StreamOutput {
    fn message_type() -> String {
        String::from("stream")
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_stream_names() {
        let output = StreamOutput {
            name: Stream::Stderr,
            text: String::from("Command canceled."),
        };
        assert_eq!(
            serde_json::to_value(output).unwrap(),
            json!({"name": "stderr", "text": "Command canceled."})
        );
        assert_eq!(
            serde_json::from_value::<Stream>(json!("stdout")).unwrap(),
            Stream::Stdout
        );
    }
}
