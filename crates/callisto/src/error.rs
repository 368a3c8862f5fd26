/*
 * error.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;
use std::path::PathBuf;

use crate::wire::jupyter_message::Message;

/// Type representing all errors that can occur inside the Callisto implementation.
#[derive(Debug)]
pub enum Error {
    MissingDelimiter,
    InsufficientParts(usize, usize),
    InvalidHmac(Vec<u8>, hex::FromHexError),
    BadSignature(Vec<u8>),
    Utf8Error(String, Vec<u8>, std::str::Utf8Error),
    JsonParseError(String, String, serde_json::Error),
    InvalidPart(String, serde_json::Value, serde_json::Error),
    InvalidMessage(String, serde_json::Value, serde_json::Error),
    CannotSerialize(serde_json::Error),
    UnknownMessageType(String),
    UnsupportedMessage(Message, String),
    HmacKeyInvalid(String, hmac::digest::InvalidLength),
    UnsupportedSignatureScheme(String),
    CreateSocketFailed(String, zmq::Error),
    SocketBindError(String, String, zmq::Error),
    SocketConnectError(String, String, zmq::Error),
    UnsupportedSocketType(zmq::SocketType),
    ZmqError(String, zmq::Error),
    SendError(String),
    ReadConfigFailed(PathBuf, std::io::Error),
    WriteConfigFailed(PathBuf, std::io::Error),
    InvalidConfig(PathBuf, serde_json::Error),
    Anyhow(anyhow::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingDelimiter => {
                write!(
                    f,
                    "ZeroMQ message did not include expected <IDS|MSG> delimiter"
                )
            },
            Error::InsufficientParts(found, expected) => {
                write!(
                    f,
                    "ZeroMQ message did not contain sufficient parts (found {found}, expected {expected})"
                )
            },
            Error::InvalidHmac(data, err) => {
                write!(
                    f,
                    "ZeroMQ message HMAC signature {data:?} is not a valid hexadecimal value: {err}"
                )
            },
            Error::BadSignature(sig) => {
                write!(f, "ZeroMQ message HMAC signature {sig:?} is incorrect")
            },
            Error::Utf8Error(part, data, err) => {
                write!(
                    f,
                    "Message part '{part}' was not valid UTF-8: {err} (raw: {data:?})"
                )
            },
            Error::JsonParseError(part, str, err) => {
                write!(f, "Message part '{part}' is invalid JSON: {err} (raw: {str})")
            },
            Error::InvalidPart(part, json, err) => {
                write!(
                    f,
                    "Message part '{part}' does not match schema: {err} (raw: {json})"
                )
            },
            Error::InvalidMessage(kind, json, err) => {
                write!(f, "Invalid '{kind}' message: {err} (raw: {json})")
            },
            Error::CannotSerialize(err) => {
                write!(f, "Cannot serialize message: {err}")
            },
            Error::UnknownMessageType(kind) => {
                write!(f, "Unknown message type '{kind}'")
            },
            Error::UnsupportedMessage(msg, socket) => {
                write!(f, "Unsupported message received on '{socket}': {msg:?}")
            },
            Error::HmacKeyInvalid(str, err) => {
                write!(
                    f,
                    "The HMAC supplied signing key '{str}' ({} bytes) cannot be used: {err}",
                    str.len(),
                )
            },
            Error::UnsupportedSignatureScheme(scheme) => {
                write!(f, "Unsupported message signature scheme '{scheme}'")
            },
            Error::CreateSocketFailed(name, err) => {
                write!(f, "Could not create ZeroMQ socket '{name}': {err}")
            },
            Error::SocketBindError(name, endpoint, err) => {
                write!(
                    f,
                    "Could not bind to ZeroMQ socket '{name}' at '{endpoint}': {err}"
                )
            },
            Error::SocketConnectError(name, endpoint, err) => {
                write!(
                    f,
                    "Could not connect to ZeroMQ socket '{name}' at '{endpoint}': {err}"
                )
            },
            Error::UnsupportedSocketType(kind) => {
                write!(f, "Unsupported ZeroMQ socket type: {kind:?}")
            },
            Error::ZmqError(name, err) => {
                write!(f, "ZeroMQ protocol error on {name} socket: {err}")
            },
            Error::SendError(err) => {
                write!(f, "{err}")
            },
            Error::ReadConfigFailed(path, err) => {
                write!(f, "Could not read config file '{}': {err}", path.display())
            },
            Error::WriteConfigFailed(path, err) => {
                write!(f, "Could not write config file '{}': {err}", path.display())
            },
            Error::InvalidConfig(path, err) => {
                write!(f, "Config file '{}' is invalid: {err}", path.display())
            },
            Error::Anyhow(err) => {
                write!(f, "{err:?}")
            },
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

#[macro_export]
macro_rules! anyhow {
    ($($rest: expr),*) => {{
        let message = anyhow::anyhow!($($rest, )*);
        $crate::error::Error::Anyhow(message)
    }}
}
