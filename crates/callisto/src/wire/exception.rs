/*
 * exception.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

/// Error details carried by a failed reply. Flattened into the reply content
/// on the wire, so these keys sit next to `status`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Exception {
    /// Short error class, e.g. `ClusterNotOnline`
    pub ename: String,

    /// Human readable message
    pub evalue: String,

    /// One entry per line of remote traceback or error cause
    pub traceback: Vec<String>,
}

impl Exception {
    /// An error raised by the kernel itself rather than by user code.
    pub fn internal_error(evalue: String) -> Self {
        Self {
            ename: String::from("InternalError"),
            evalue,
            traceback: Vec::new(),
        }
    }
}
