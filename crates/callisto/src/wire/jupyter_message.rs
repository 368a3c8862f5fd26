/*
 * jupyter_message.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::session::Session;
use crate::socket::socket::Socket;
use crate::wire::comm_info_reply::CommInfoReply;
use crate::wire::comm_info_request::CommInfoRequest;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::display_data::DisplayData;
use crate::wire::execute_reply::ExecuteReply;
use crate::wire::execute_reply_exception::ExecuteReplyException;
use crate::wire::execute_request::ExecuteRequest;
use crate::wire::header::JupyterHeader;
use crate::wire::interrupt_reply::InterruptReply;
use crate::wire::interrupt_request::InterruptRequest;
use crate::wire::kernel_info_reply::KernelInfoReply;
use crate::wire::kernel_info_request::KernelInfoRequest;
use crate::wire::shutdown_reply::ShutdownReply;
use crate::wire::shutdown_request::ShutdownRequest;
use crate::wire::status::KernelStatus;
use crate::wire::stream::StreamOutput;
use crate::wire::wire_message::WireMessage;

/// Represents a Jupyter message
#[derive(Debug, Clone)]
pub struct JupyterMessage<T> {
    /// The ZeroMQ identities (for ROUTER sockets)
    pub zmq_identities: Vec<Vec<u8>>,

    /// The header for this message
    pub header: JupyterHeader,

    /// The header of the message from which this message originated. Optional;
    /// not all messages have a parent.
    pub parent_header: Option<JupyterHeader>,

    /// The body (payload) of the message
    pub content: T,
}

/// Trait used to extract the wire message type from a Jupyter message
pub trait MessageType {
    fn message_type() -> String;
}

/// Convenience trait for grouping traits that must be present on all Jupyter
/// protocol messages
pub trait ProtocolMessage: MessageType + Serialize + std::fmt::Debug + Clone {}
impl<T> ProtocolMessage for T where T: MessageType + Serialize + std::fmt::Debug + Clone {}

/// List of all known/implemented messages
#[derive(Debug)]
pub enum Message {
    // Shell
    KernelInfoReply(JupyterMessage<KernelInfoReply>),
    KernelInfoRequest(JupyterMessage<KernelInfoRequest>),
    ExecuteReply(JupyterMessage<ExecuteReply>),
    ExecuteReplyException(JupyterMessage<ExecuteReplyException>),
    ExecuteRequest(JupyterMessage<ExecuteRequest>),
    CommInfoReply(JupyterMessage<CommInfoReply>),
    CommInfoRequest(JupyterMessage<CommInfoRequest>),
    // Control
    InterruptReply(JupyterMessage<InterruptReply>),
    InterruptRequest(JupyterMessage<InterruptRequest>),
    ShutdownReply(JupyterMessage<ShutdownReply>),
    ShutdownRequest(JupyterMessage<ShutdownRequest>),
    // IOPub
    Status(JupyterMessage<KernelStatus>),
    Stream(JupyterMessage<StreamOutput>),
    DisplayData(JupyterMessage<DisplayData>),
    // IOPub/Shell
    CommMsg(JupyterMessage<CommWireMsg>),
}

/// Represents status returned from kernel inside messages.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
    Abort,
}

impl TryFrom<&WireMessage> for Message {
    type Error = crate::error::Error;

    /// Decode the content of a wire message according to its `msg_type`.
    fn try_from(msg: &WireMessage) -> Result<Self, Error> {
        let message = match msg.header.msg_type.as_str() {
            "kernel_info_request" => Message::KernelInfoRequest(msg.try_into()?),
            "kernel_info_reply" => Message::KernelInfoReply(msg.try_into()?),
            "execute_request" => Message::ExecuteRequest(msg.try_into()?),
            // Both reply shapes share a type; the error shape has the
            // stricter set of required fields
            "execute_reply" => match JupyterMessage::<ExecuteReplyException>::try_from(msg) {
                Ok(exception) => Message::ExecuteReplyException(exception),
                Err(_) => Message::ExecuteReply(msg.try_into()?),
            },
            "comm_info_request" => Message::CommInfoRequest(msg.try_into()?),
            "comm_info_reply" => Message::CommInfoReply(msg.try_into()?),
            "comm_msg" => Message::CommMsg(msg.try_into()?),
            "interrupt_request" => Message::InterruptRequest(msg.try_into()?),
            "interrupt_reply" => Message::InterruptReply(msg.try_into()?),
            "shutdown_request" => Message::ShutdownRequest(msg.try_into()?),
            "shutdown_reply" => Message::ShutdownReply(msg.try_into()?),
            "status" => Message::Status(msg.try_into()?),
            "stream" => Message::Stream(msg.try_into()?),
            "display_data" => Message::DisplayData(msg.try_into()?),
            other => return Err(Error::UnknownMessageType(String::from(other))),
        };
        Ok(message)
    }
}

impl Message {
    pub fn read_from_socket(socket: &Socket) -> Result<Self, Error> {
        let msg = WireMessage::read_from_socket(socket)?;
        Message::try_from(&msg)
    }
}

impl<T> JupyterMessage<T>
where
    T: ProtocolMessage,
{
    /// Sends this Jupyter message to the designated ZeroMQ socket.
    pub fn send(self, socket: &Socket) -> Result<(), Error> {
        let msg = WireMessage::try_from(&self)?;
        msg.send(socket)
    }

    /// Create a new Jupyter message, optionally as a child (reply) to an
    /// existing message.
    pub fn create(
        content: T,
        parent: Option<JupyterHeader>,
        session: &Session,
    ) -> JupyterMessage<T> {
        JupyterMessage::<T> {
            zmq_identities: Vec::new(),
            header: JupyterHeader::create(
                T::message_type(),
                session.session_id.clone(),
                session.username.clone(),
            ),
            parent_header: parent,
            content,
        }
    }

    /// Sends a reply to the message; convenience method combining creating the
    /// reply and sending it.
    pub fn send_reply<R: ProtocolMessage>(&self, content: R, socket: &Socket) -> crate::Result<()> {
        let reply = self.create_reply(content, &socket.session);
        reply.send(socket)
    }

    /// Create a reply to this message with the given content.
    pub fn create_reply<R: ProtocolMessage>(
        &self,
        content: R,
        session: &Session,
    ) -> JupyterMessage<R> {
        // Note that the message we are creating needs to use the kernel session
        // (given as an argument), not the client session (which we could
        // otherwise copy from the message itself)
        JupyterMessage::<R> {
            zmq_identities: self.zmq_identities.clone(),
            header: JupyterHeader::create(
                R::message_type(),
                session.session_id.clone(),
                session.username.clone(),
            ),
            parent_header: Some(self.header.clone()),
            content,
        }
    }
}
