/*
 * header.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Version of the messaging protocol stamped on outbound headers
pub const PROTOCOL_VERSION: &str = "5.3";

/// Represents the header of a Jupyter message
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JupyterHeader {
    /// The message identifier; must be unique per message
    pub msg_id: String,

    /// Session ID; must be unique per session
    #[serde(rename = "session")]
    pub session_id: String,

    /// Username; must be unique per user
    pub username: String,

    /// Date/time when message was created (ISO 8601)
    pub date: String,

    /// Message type
    pub msg_type: String,

    /// Message protocol version
    pub version: String,
}

impl JupyterHeader {
    /// Create a new header with a fresh message id, stamped with the current
    /// UTC time.
    pub fn create(msg_type: String, session_id: String, username: String) -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            session_id,
            username,
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            msg_type,
            version: String::from(PROTOCOL_VERSION),
        }
    }

    /// The creation time of the message, if the `date` field can be parsed.
    ///
    /// Frontends send RFC 3339 dates; a date without an offset is taken to be
    /// in UTC.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Ok(date) = DateTime::parse_from_rfc3339(&self.date) {
            return Some(date.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.date, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|date| date.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn header(date: &str) -> JupyterHeader {
        let mut header = JupyterHeader::create(
            String::from("execute_request"),
            String::from("session"),
            String::from("user"),
        );
        header.date = String::from(date);
        header
    }

    #[test]
    fn test_create_stamps_fresh_ids() {
        let a = header("");
        let b = header("");
        assert_ne!(a.msg_id, b.msg_id);
        assert_eq!(a.version, "5.3");
    }

    #[test]
    fn test_created_date_round_trips() {
        let created = JupyterHeader::create(
            String::from("status"),
            String::from("session"),
            String::from("kernel"),
        );
        assert!(created.date.ends_with('Z'));
        assert!(created.timestamp().is_some());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 15)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(250))
            .unwrap();

        assert_eq!(
            header("2024-03-01T12:30:15.000250Z").timestamp(),
            Some(expected)
        );
        assert_eq!(
            header("2024-03-01T13:30:15.000250+01:00").timestamp(),
            Some(expected)
        );
        assert_eq!(
            header("2024-03-01T12:30:15.000250").timestamp(),
            Some(expected)
        );
        assert_eq!(header("yesterday").timestamp(), None);
    }

    #[test]
    fn test_session_field_name() {
        let value = serde_json::to_value(header("2024-03-01T12:30:15Z")).unwrap();
        assert_eq!(value["session"], "session");
        assert!(value.get("session_id").is_none());
    }
}
