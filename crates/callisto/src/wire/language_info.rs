/*
 * language_info.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

/// Describes the language cells are written in. The kernel doesn't interpret
/// code itself; this is forwarded to the remote execution context.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LanguageInfo {
    /// Also used as the language of remote commands, e.g. `python` or `sql`
    pub name: String,

    pub version: String,

    pub mimetype: String,

    /// Including the leading dot
    pub file_extension: String,

    // Editor hints; left out of the reply when unset
    pub pygments_lexer: Option<String>,
    pub codemirror_mode: Option<String>,
    pub nbconvert_exporter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_hints_are_omitted() {
        let info = LanguageInfo {
            name: String::from("sql"),
            version: String::from("1.0"),
            mimetype: String::from("text/x-sql"),
            file_extension: String::from(".sql"),
            pygments_lexer: None,
            codemirror_mode: Some(String::from("sql")),
            nbconvert_exporter: None,
        };

        let value = serde_json::to_value(info).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["codemirror_mode"], "sql");
        assert!(!object.contains_key("pygments_lexer"));
        assert!(!object.contains_key("nbconvert_exporter"));
    }
}
