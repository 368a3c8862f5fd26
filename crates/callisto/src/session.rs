/*
 * session.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use uuid::Uuid;

use crate::error::Error;
use crate::wire::signature::Signer;

/// How signatures on inbound messages are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Messages whose signature does not match are dropped
    #[default]
    Enforce,

    /// Signatures are computed on outbound messages but never checked on
    /// inbound ones
    Ignore,
}

/// The kernel's side of a Jupyter session: the signing key and the identity
/// stamped on every outbound header.
#[derive(Clone)]
pub struct Session {
    /// The message signer; `None` when the connection key is empty
    pub signer: Option<Signer>,

    /// Whether inbound signatures are checked
    pub policy: SignaturePolicy,

    /// The username placed in outbound headers
    pub username: String,

    /// The kernel session id placed in outbound headers
    pub session_id: String,
}

impl Session {
    /// Create a new session from the connection key and signature scheme.
    pub fn create(key: &str, scheme: &str, policy: SignaturePolicy) -> Result<Self, Error> {
        let signer = match key.len() {
            0 => None,
            _ => Some(Signer::new(key, scheme)?),
        };
        Ok(Self {
            signer,
            policy,
            session_id: Uuid::new_v4().to_string(),
            username: String::from("kernel"),
        })
    }
}
