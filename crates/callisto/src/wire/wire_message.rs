/*
 * wire_message.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use log::trace;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::value::Value;

use crate::error::Error;
use crate::session::SignaturePolicy;
use crate::socket::socket::Socket;
use crate::wire::header::JupyterHeader;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::signature::Signer;

/// This delimiter separates the ZeroMQ socket identities (IDS) from the message
/// body payload (MSG).
pub const MSG_DELIM: &[u8] = b"<IDS|MSG>";

/// Number of frames after the delimiter: the signature plus header, parent
/// header, metadata and content.
const MSG_PARTS: usize = 5;

/// Represents an untyped Jupyter message delivered over the wire. A WireMessage
/// can represent any kind of Jupyter message; typically its header will be
/// examined and it will be converted into a typed JupyterMessage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// The ZeroMQ identities. These store the peer identity for messages
    /// delivered request-reply style over ROUTER sockets (like the shell)
    pub zmq_identities: Vec<Vec<u8>>,

    /// The header for this message
    pub header: JupyterHeader,

    /// The header of the message from which this message originated, if any.
    /// If none, it's serialized as an empty dict as required by the Jupyter
    /// protocol.
    pub parent_header: Option<JupyterHeader>,

    /// Additional metadata, if any
    pub metadata: Value,

    /// The body (payload) of the message
    pub content: Value,
}

impl WireMessage {
    /// Read a WireMessage from a ZeroMQ socket, checking its signature if the
    /// session asks for it.
    pub fn read_from_socket(socket: &Socket) -> Result<WireMessage, Error> {
        let bufs = socket.recv_multipart()?;
        if socket.session.policy == SignaturePolicy::Enforce {
            if let Some(signer) = &socket.session.signer {
                Self::verify(&bufs, signer)?;
            }
        }
        Self::decode(bufs)
    }

    /// Return the Jupyter type of the message.
    pub fn message_type(&self) -> String {
        self.header.msg_type.clone()
    }

    /// Split the frames of a ZeroMQ message into the routing identities and
    /// the frames following the delimiter.
    fn split(mut bufs: Vec<Vec<u8>>) -> Result<(Vec<Vec<u8>>, Vec<Vec<u8>>), Error> {
        let pos = match bufs.iter().position(|buf| &buf[..] == MSG_DELIM) {
            Some(p) => p,
            None => return Err(Error::MissingDelimiter),
        };

        // Form a collection of the remaining parts, and remove the delimiter.
        let parts: Vec<_> = bufs.drain(pos + 1..).collect();
        bufs.pop();

        if parts.len() < MSG_PARTS {
            return Err(Error::InsufficientParts(parts.len(), MSG_PARTS));
        }

        Ok((bufs, parts))
    }

    /// Check the signature frame of a raw ZeroMQ message against its payload
    /// frames.
    pub fn verify(bufs: &[Vec<u8>], signer: &Signer) -> Result<(), Error> {
        let pos = match bufs.iter().position(|buf| &buf[..] == MSG_DELIM) {
            Some(p) => p,
            None => return Err(Error::MissingDelimiter),
        };
        let parts = &bufs[pos + 1..];
        if parts.len() < MSG_PARTS {
            return Err(Error::InsufficientParts(parts.len(), MSG_PARTS));
        }
        signer.verify(&parts[0], &parts[1..MSG_PARTS])
    }

    /// Parse a Jupyter message from the frames of a ZeroMQ message. The
    /// signature frame is skipped, not checked.
    pub fn decode(bufs: Vec<Vec<u8>>) -> Result<WireMessage, Error> {
        let (identities, parts) = Self::split(bufs)?;

        // Parse the message header
        let header_val = WireMessage::parse_buffer(String::from("header"), &parts[1])?;
        let header: JupyterHeader = match serde_json::from_value(header_val.clone()) {
            Ok(h) => h,
            Err(err) => return Err(Error::InvalidPart(String::from("header"), header_val, err)),
        };

        // An empty dict in the parent slot means the message has no parent
        let parent_val = WireMessage::parse_buffer(String::from("parent header"), &parts[2])?;
        let parent = match &parent_val {
            Value::Object(map) if map.is_empty() => None,
            Value::Null => None,
            _ => match serde_json::from_value(parent_val.clone()) {
                Ok(h) => Some(h),
                Err(err) => {
                    return Err(Error::InvalidPart(
                        String::from("parent header"),
                        parent_val,
                        err,
                    ))
                },
            },
        };

        Ok(Self {
            zmq_identities: identities,
            header,
            parent_header: parent,
            metadata: WireMessage::parse_buffer(String::from("metadata"), &parts[3])?,
            content: WireMessage::parse_buffer(String::from("content"), &parts[4])?,
        })
    }

    /// Parse raw buffer data from a single part of a multipart ZeroMQ message
    /// into a JSON value.
    fn parse_buffer(desc: String, buf: &[u8]) -> Result<serde_json::Value, Error> {
        // Convert the raw byte sequence from the ZeroMQ message into UTF-8
        let str = match std::str::from_utf8(buf) {
            Ok(s) => s,
            Err(err) => return Err(Error::Utf8Error(desc, buf.to_vec(), err)),
        };

        // Parse the UTF-8 string as JSON
        let val: serde_json::Value = match serde_json::from_str(str) {
            Ok(v) => v,
            Err(err) => return Err(Error::JsonParseError(desc, String::from(str), err)),
        };

        Ok(val)
    }

    /// Produce the frames of this message, ready for delivery: identities,
    /// delimiter, signature, then the four payload frames.
    pub fn encode(&self, signer: Option<&Signer>) -> Result<Vec<Vec<u8>>, Error> {
        // Serialize JSON values into byte parts in preparation for transmission
        let mut parts: Vec<Vec<u8>> = match self.to_raw_parts() {
            Ok(v) => v,
            Err(err) => return Err(Error::CannotSerialize(err)),
        };

        let signature = match signer {
            Some(signer) => signer.sign(&parts),
            None => String::new(),
        };

        let mut msg: Vec<Vec<u8>> = self.zmq_identities.clone();
        msg.push(MSG_DELIM.to_vec());
        msg.push(signature.into_bytes());
        msg.append(&mut parts);
        Ok(msg)
    }

    /// Send this message to the given ZeroMQ socket.
    pub fn send(&self, socket: &Socket) -> Result<(), Error> {
        match &self.parent_header {
            Some(parent) => {
                trace!(
                    "Sending '{}' message (reply to '{}') via {} socket",
                    self.msg_type(),
                    parent.msg_type,
                    socket.name
                );
            },
            None => {
                trace!(
                    "Sending '{}' message via {} socket",
                    self.msg_type(),
                    socket.name
                );
            },
        }

        let msg = self.encode(socket.session.signer.as_ref())?;
        socket.send_multipart(&msg)
    }

    /// Returns a vector containing the raw parts of the message
    fn to_raw_parts(&self) -> Result<Vec<Vec<u8>>, serde_json::Error> {
        let mut parts: Vec<Vec<u8>> = Vec::new();
        parts.push(serde_json::to_vec(&self.header)?);

        // The Jupyter protocol states that orphan messages should have an empty
        // dict as parent.
        match &self.parent_header {
            Some(parent) => parts.push(serde_json::to_vec(parent)?),
            None => parts.push(serde_json::to_vec(&serde_json::Map::new())?),
        }

        parts.push(serde_json::to_vec(&self.metadata)?);
        parts.push(serde_json::to_vec(&self.content)?);
        Ok(parts)
    }

    /// A more descriptive message type for tracing.
    fn msg_type(&self) -> String {
        match self.header.msg_type.as_str() {
            "comm_msg" => {
                if let Some(Value::String(comm_id)) = self.content.get("comm_id") {
                    return format!("comm_msg/{comm_id}");
                }
            },
            "status" => {
                if let Some(Value::String(state)) = self.content.get("execution_state") {
                    return format!("status/{state}");
                }
            },
            _ => {},
        }
        self.header.msg_type.clone()
    }
}

// Conversion: WireMessage (untyped) -> JupyterMessage (typed); used on
// messages we receive over the wire to parse into the correct type.
impl<T: ProtocolMessage + DeserializeOwned> TryFrom<&WireMessage> for JupyterMessage<T> {
    type Error = crate::error::Error;
    fn try_from(msg: &WireMessage) -> Result<JupyterMessage<T>, Error> {
        let content = match serde_json::from_value(msg.content.clone()) {
            Ok(val) => val,
            Err(err) => {
                return Err(Error::InvalidMessage(
                    T::message_type(),
                    msg.content.clone(),
                    err,
                ))
            },
        };
        Ok(JupyterMessage {
            zmq_identities: msg.zmq_identities.clone(),
            header: msg.header.clone(),
            parent_header: msg.parent_header.clone(),
            content,
        })
    }
}

// Conversion: JupyterMessage (typed) -> WireMessage (untyped); used prior to
// sending messages to get them ready for dispatch.
impl<T: ProtocolMessage> TryFrom<&JupyterMessage<T>> for WireMessage {
    type Error = crate::error::Error;

    /// Convert a typed JupyterMessage into a WireMessage, preserving ZeroMQ
    /// socket identities.
    fn try_from(msg: &JupyterMessage<T>) -> Result<Self, Error> {
        let content = match serde_json::to_value(&msg.content) {
            Ok(val) => val,
            Err(err) => return Err(Error::CannotSerialize(err)),
        };
        Ok(Self {
            zmq_identities: msg.zmq_identities.clone(),
            header: msg.header.clone(),
            parent_header: msg.parent_header.clone(),
            metadata: json!({}),
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn message(parent: Option<JupyterHeader>) -> WireMessage {
        WireMessage {
            zmq_identities: vec![b"client-a".to_vec(), b"client-b".to_vec()],
            header: JupyterHeader::create(
                String::from("execute_request"),
                String::from("session"),
                String::from("user"),
            ),
            parent_header: parent,
            metadata: json!({}),
            content: json!({"code": "1 + 1", "silent": false}),
        }
    }

    #[test]
    fn test_encode_layout() {
        let signer = Signer::new("secret", "hmac-sha256").unwrap();
        let frames = message(None).encode(Some(&signer)).unwrap();

        assert_eq!(frames.len(), 2 + 1 + MSG_PARTS);
        assert_eq!(frames[0], b"client-a");
        assert_eq!(frames[1], b"client-b");
        assert_eq!(frames[2], MSG_DELIM);
        assert_eq!(frames[3], signer.sign(&frames[4..]).into_bytes());
        assert_eq!(frames[5], b"{}");
    }

    #[test]
    fn test_unsigned_encode_has_empty_signature() {
        let frames = message(None).encode(None).unwrap();
        assert!(frames[3].is_empty());
    }

    #[test]
    fn test_decode_restores_message() {
        let parent = message(None).header;
        let original = message(Some(parent));
        let signer = Signer::new("secret", "hmac-sha256").unwrap();

        let frames = original.encode(Some(&signer)).unwrap();
        WireMessage::verify(&frames, &signer).unwrap();
        let decoded = WireMessage::decode(frames).unwrap();
        assert_eq!(decoded, original);

        let orphan = message(None);
        let decoded = WireMessage::decode(orphan.encode(None).unwrap()).unwrap();
        assert_eq!(decoded.parent_header, None);
    }

    #[test]
    fn test_decode_does_not_check_signature() {
        let mut frames = message(None).encode(None).unwrap();
        frames[3] = b"deadbeef".to_vec();
        assert!(WireMessage::decode(frames.clone()).is_ok());

        let signer = Signer::new("secret", "hmac-sha256").unwrap();
        assert_matches!(
            WireMessage::verify(&frames, &signer),
            Err(Error::BadSignature(_))
        );
    }

    #[test]
    fn test_decode_errors() {
        let frames = message(None).encode(None).unwrap();

        let no_delim: Vec<Vec<u8>> = frames
            .iter()
            .filter(|frame| &frame[..] != MSG_DELIM)
            .cloned()
            .collect();
        assert_matches!(WireMessage::decode(no_delim), Err(Error::MissingDelimiter));

        let short = frames[..frames.len() - 1].to_vec();
        assert_matches!(
            WireMessage::decode(short),
            Err(Error::InsufficientParts(4, 5))
        );

        let mut bad_json = frames.clone();
        bad_json[7] = b"{not json".to_vec();
        assert_matches!(
            WireMessage::decode(bad_json),
            Err(Error::JsonParseError(part, _, _)) => {
                assert_eq!(part, "content");
            }
        );

        let mut bad_utf8 = frames.clone();
        bad_utf8[6] = vec![0xff, 0xfe];
        assert_matches!(WireMessage::decode(bad_utf8), Err(Error::Utf8Error(..)));

        let mut bad_header = frames;
        bad_header[4] = br#"{"msg_id": 42}"#.to_vec();
        assert_matches!(
            WireMessage::decode(bad_header),
            Err(Error::InvalidPart(..))
        );
    }
}
