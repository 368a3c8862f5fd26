/*
 * dummy_frontend.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use assert_matches::assert_matches;
use serde_json::Value;
use uuid::Uuid;

use crate::connection_file::ConnectionFile;
use crate::session::Session;
use crate::session::SignaturePolicy;
use crate::socket::socket::Socket;
use crate::wire::comm_info_request::CommInfoRequest;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::execute_request::ExecuteRequest;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::jupyter_message::Status;
use crate::wire::status::ExecutionState;
use crate::wire::stream::Stream;
use crate::wire::wire_message::WireMessage;

/// How long `recv()` waits before declaring the kernel unresponsive
const RECV_TIMEOUT_MS: i64 = 5000;

/// A frontend that drives a kernel over real zmq sockets, for tests.
pub struct DummyFrontend {
    pub control_socket: Socket,
    pub shell_socket: Socket,
    pub iopub_socket: Socket,
    pub stdin_socket: Socket,
    pub heartbeat_socket: Socket,
    session: Session,
    connection_file: ConnectionFile,
}

/// Connect a frontend-side socket to a fresh local port. The kernel binds
/// the other end later, from the connection file.
fn connect_channel(
    ctx: &zmq::Context,
    session: &Session,
    name: &str,
    kind: zmq::SocketType,
    identity: Option<&[u8]>,
) -> (Socket, u16) {
    let port = portpicker::pick_unused_port().unwrap();
    let socket = Socket::new(
        session.clone(),
        ctx.clone(),
        String::from(name),
        kind,
        identity,
        format!("tcp://127.0.0.1:{port}"),
    )
    .unwrap();
    (socket, port)
}

impl DummyFrontend {
    pub fn new() -> Self {
        let key = Uuid::new_v4().simple().to_string();
        let session = Session::create(&key, "hmac-sha256", SignaturePolicy::Enforce).unwrap();
        let ctx = zmq::Context::new();

        // Jupyter requires shell and stdin to share a zmq identity
        let identity = Uuid::new_v4().as_bytes().to_vec();

        let (control_socket, control_port) =
            connect_channel(&ctx, &session, "Control", zmq::DEALER, None);
        let (shell_socket, shell_port) =
            connect_channel(&ctx, &session, "Shell", zmq::DEALER, Some(&identity));
        let (iopub_socket, iopub_port) = connect_channel(&ctx, &session, "IOPub", zmq::SUB, None);
        let (stdin_socket, stdin_port) =
            connect_channel(&ctx, &session, "Stdin", zmq::DEALER, Some(&identity));
        let (heartbeat_socket, hb_port) =
            connect_channel(&ctx, &session, "Heartbeat", zmq::REQ, None);

        let connection_file = ConnectionFile {
            control_port,
            shell_port,
            stdin_port,
            iopub_port,
            hb_port,
            transport: String::from("tcp"),
            signature_scheme: String::from("hmac-sha256"),
            ip: String::from("127.0.0.1"),
            key,
        };

        Self {
            control_socket,
            shell_socket,
            iopub_socket,
            stdin_socket,
            heartbeat_socket,
            session,
            connection_file,
        }
    }

    /// Subscribes to IOPub, which the kernel waits for before completing its
    /// connection
    pub fn complete_initialization(&self) {
        self.iopub_socket.subscribe().unwrap();
    }

    /// Sends a Jupyter message on the Shell socket; returns the ID of the newly
    /// created message
    pub fn send_shell<T: ProtocolMessage>(&self, msg: T) -> String {
        let message = JupyterMessage::create(msg, None, &self.session);
        let id = message.header.msg_id.clone();
        message.send(&self.shell_socket).unwrap();
        id
    }

    /// Sends a Jupyter message on the Control socket; returns the ID of the
    /// newly created message
    pub fn send_control<T: ProtocolMessage>(&self, msg: T) -> String {
        let message = JupyterMessage::create(msg, None, &self.session);
        let id = message.header.msg_id.clone();
        message.send(&self.control_socket).unwrap();
        id
    }

    pub fn send_execute_request(&self, code: &str) -> String {
        self.send_shell(execute_request(code))
    }

    /// Sends an execute request whose header carries `date` instead of the
    /// current time
    pub fn send_execute_request_dated(&self, code: &str, date: &str) -> String {
        let mut message = JupyterMessage::create(execute_request(code), None, &self.session);
        message.header.date = String::from(date);
        let id = message.header.msg_id.clone();
        message.send(&self.shell_socket).unwrap();
        id
    }

    pub fn send_comm_info_request(&self, target_name: Option<&str>) -> String {
        self.send_shell(CommInfoRequest {
            target_name: target_name.map(String::from),
        })
    }

    pub fn send_comm_msg(&self, comm_id: &str, data: Value) -> String {
        self.send_shell(CommWireMsg {
            comm_id: String::from(comm_id),
            data,
        })
    }

    /// Sends raw frames on the Shell socket, bypassing signing
    pub fn send_shell_frames(&self, frames: &[Vec<u8>]) {
        self.shell_socket.send_multipart(frames).unwrap();
    }

    /// Signs and encodes a message the way the kernel expects it
    pub fn encode<T: ProtocolMessage>(&self, msg: T) -> Vec<Vec<u8>> {
        let message = JupyterMessage::create(msg, None, &self.session);
        let wire = WireMessage::try_from(&message).unwrap();
        wire.encode(self.session.signer.as_ref()).unwrap()
    }

    pub fn recv(&self, socket: &Socket) -> Message {
        // Wait with a timeout because the kernel thread might have panicked,
        // preventing it from sending the expected message. The tests would
        // then hang indefinitely.
        if socket.poll_incoming(RECV_TIMEOUT_MS).unwrap() {
            return Message::read_from_socket(socket).unwrap();
        }

        panic!("Timeout while expecting message on socket {}", socket.name);
    }

    /// Receives a Jupyter message from the Shell socket
    pub fn recv_shell(&self) -> Message {
        self.recv(&self.shell_socket)
    }

    /// Receives a Jupyter message from the Control socket
    pub fn recv_control(&self) -> Message {
        self.recv(&self.control_socket)
    }

    /// Receives a Jupyter message from the IOPub socket
    pub fn recv_iopub(&self) -> Message {
        self.recv(&self.iopub_socket)
    }

    /// Receive from Shell and assert `ExecuteReply` message with the given
    /// status. Returns `execution_count`.
    pub fn recv_shell_execute_reply(&self, status: Status) -> u32 {
        let msg = self.recv_shell();

        assert_matches!(msg, Message::ExecuteReply(data) => {
            assert_eq!(data.content.status, status);
            data.content.execution_count
        })
    }

    /// Receive from Shell and assert `ExecuteReplyException` message.
    /// Returns `execution_count`.
    pub fn recv_shell_execute_reply_exception(&self) -> u32 {
        let msg = self.recv_shell();

        assert_matches!(msg, Message::ExecuteReplyException(data) => {
            assert_eq!(data.content.status, Status::Error);
            data.content.execution_count
        })
    }

    /// Receive from IOPub and assert the `starting` status sent on the first
    /// subscription
    pub fn recv_iopub_starting(&self) {
        let msg = self.recv_iopub();

        assert_matches!(msg, Message::Status(data) => {
            assert_eq!(data.content.execution_state, ExecutionState::Starting);
            assert!(data.parent_header.is_none());
        });
    }

    /// Receive from IOPub and assert Busy message
    pub fn recv_iopub_busy(&self) {
        let msg = self.recv_iopub();

        assert_matches!(msg, Message::Status(data) => {
            assert_eq!(data.content.execution_state, ExecutionState::Busy);
        });
    }

    /// Receive from IOPub and assert Idle message
    pub fn recv_iopub_idle(&self) {
        let msg = self.recv_iopub();

        assert_matches!(msg, Message::Status(data) => {
            assert_eq!(data.content.execution_state, ExecutionState::Idle);
        });
    }

    pub fn recv_iopub_stream_stdout(&self) -> String {
        let msg = self.recv_iopub();

        assert_matches!(msg, Message::Stream(data) => {
            assert_eq!(data.content.name, Stream::Stdout);
            data.content.text
        })
    }

    pub fn recv_iopub_stream_stderr(&self) -> String {
        let msg = self.recv_iopub();

        assert_matches!(msg, Message::Stream(data) => {
            assert_eq!(data.content.name, Stream::Stderr);
            data.content.text
        })
    }

    /// Receive from IOPub and assert a `comm_msg`. Returns the message so
    /// callers can check its parent.
    pub fn recv_iopub_comm_msg(&self) -> JupyterMessage<CommWireMsg> {
        let msg = self.recv_iopub();

        assert_matches!(msg, Message::CommMsg(data) => data)
    }

    /// Receives a (raw) message from the heartbeat socket
    pub fn recv_heartbeat(&self) -> zmq::Message {
        let mut msg = zmq::Message::new();
        self.heartbeat_socket.recv(&mut msg).unwrap();
        msg
    }

    /// Sends a (raw) message to the heartbeat socket
    pub fn send_heartbeat(&self, msg: zmq::Message) {
        self.heartbeat_socket.send(msg).unwrap();
    }

    /// A connection file pointing the kernel at this frontend's ports
    pub fn get_connection_file(&self) -> ConnectionFile {
        self.connection_file.clone()
    }

    /// Panics, after dumping what arrived, if any socket still has unread
    /// messages
    pub fn assert_no_incoming(&self) {
        let sockets = [
            &self.iopub_socket,
            &self.shell_socket,
            &self.control_socket,
            &self.heartbeat_socket,
        ];

        let mut leftovers = 0;
        for socket in sockets {
            while socket.has_incoming_data().unwrap() {
                let msg = WireMessage::read_from_socket(socket).unwrap();
                eprintln!("Unexpected message on {}: {msg:#?}", socket.name);
                leftovers += 1;
            }
        }

        assert_eq!(leftovers, 0, "Sockets must be empty (see details above)");
    }
}

impl Default for DummyFrontend {
    fn default() -> Self {
        Self::new()
    }
}

fn execute_request(code: &str) -> ExecuteRequest {
    ExecuteRequest {
        code: String::from(code),
        silent: false,
        store_history: true,
        user_expressions: serde_json::json!({}),
        allow_stdin: false,
        stop_on_error: true,
    }
}
