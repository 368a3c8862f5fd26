/*
 * shell.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use crossbeam::channel::Sender;
use log::error;
use log::info;
use log::trace;
use log::warn;

use crate::comm::comm_registry::CommRegistry;
use crate::error::Error;
use crate::language::execution::ExecuteResponse;
use crate::language::execution::ExecutionController;
use crate::socket::iopub::IOPubMessage;
use crate::socket::socket::Socket;
use crate::traits::iopub::StatusPublisher;
use crate::wire::comm_info_reply::CommInfoReply;
use crate::wire::comm_info_reply::CommInfoTargetName;
use crate::wire::comm_info_request::CommInfoRequest;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::execute_request::ExecuteRequest;
use crate::wire::header::JupyterHeader;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::jupyter_message::Status;
use crate::wire::kernel_info_reply::KernelInfo;
use crate::wire::kernel_info_reply::KernelInfoReply;
use crate::wire::kernel_info_request::KernelInfoRequest;
use crate::wire::status::ExecutionState;

/// Wrapper for the Shell socket; receives requests for execution, etc. from the
/// frontend and handles them on this thread.
pub struct Shell {
    /// The ZeroMQ Shell socket
    socket: Socket,

    /// Sends messages to the IOPub socket (owned by another thread)
    iopub_tx: Sender<IOPubMessage>,

    /// Reported in every `kernel_info_reply`
    kernel_info: KernelInfo,

    comms: CommRegistry,

    execution: ExecutionController,
}

impl Shell {
    /// Create a new Shell socket.
    ///
    /// * `socket` - The underlying ZeroMQ Shell socket
    /// * `iopub_tx` - A channel that delivers messages to the IOPub socket
    /// * `kernel_info` - What the kernel reports about itself
    /// * `comms` - The open comms
    /// * `execution` - Runs `execute_request`s against the backend
    pub fn new(
        socket: Socket,
        iopub_tx: Sender<IOPubMessage>,
        kernel_info: KernelInfo,
        comms: CommRegistry,
        execution: ExecutionController,
    ) -> Self {
        Self {
            socket,
            iopub_tx,
            kernel_info,
            comms,
            execution,
        }
    }

    /// Main loop for the Shell thread; to be invoked by the kernel.
    pub fn listen(&mut self) {
        loop {
            trace!("Waiting for shell messages");
            // Attempt to read the next message from the ZeroMQ socket
            let message = match Message::read_from_socket(&self.socket) {
                Ok(m) => m,
                Err(err) => {
                    warn!("Could not read message from shell socket: {err}");
                    continue;
                },
            };

            // Failures while handling a request are delivered to the client
            // instead of reported up the stack, so the only errors likely
            // here are "can't deliver to client" and unsupported messages
            if let Err(err) = self.process_message(message) {
                match err {
                    Error::UnsupportedMessage(..) => warn!("{err}"),
                    _ => error!("Could not handle shell message: {err}"),
                }
            }
        }
    }

    /// Process a message received from the front-end
    fn process_message(&mut self, msg: Message) -> crate::Result<()> {
        match msg {
            Message::KernelInfoRequest(req) => {
                self.handle_request(req, Self::handle_kernel_info_request)
            },
            Message::CommInfoRequest(req) => {
                self.handle_request(req, Self::handle_comm_info_request)
            },
            Message::ExecuteRequest(req) => self.handle_request(req, Self::handle_execute_request),
            Message::CommMsg(req) => self.handle_request(req, Self::handle_comm_msg),
            _ => Err(Error::UnsupportedMessage(msg, String::from("shell"))),
        }
    }

    /// Wrapper for all request handlers; emits busy, invokes the handler, then
    /// emits idle. Most frontends expect all shell messages to be wrapped in
    /// this pair of statuses.
    fn handle_request<Req, Handler>(
        &mut self,
        req: JupyterMessage<Req>,
        handler: Handler,
    ) -> crate::Result<()>
    where
        Req: ProtocolMessage,
        Handler: FnOnce(&mut Self, &JupyterMessage<Req>) -> crate::Result<()>,
    {
        self.publish_status(ExecutionState::Busy, &req.header);
        info!("Received shell request: {}", req.header.msg_type);

        let result = handler(self, &req);

        // Return to idle even on failure; many frontends won't submit
        // additional messages until the kernel is marked idle
        self.publish_status(ExecutionState::Idle, &req.header);
        result
    }

    fn publish_status(&self, state: ExecutionState, parent: &JupyterHeader) {
        if let Err(err) = self.iopub_tx.publish_status(state, Some(parent.clone())) {
            error!("Could not publish {state:?} status: {err}");
        }
    }

    fn handle_kernel_info_request(
        &mut self,
        req: &JupyterMessage<KernelInfoRequest>,
    ) -> crate::Result<()> {
        let reply = KernelInfoReply::from(self.kernel_info.clone());
        req.send_reply(reply, &self.socket)
    }

    fn handle_comm_info_request(
        &mut self,
        req: &JupyterMessage<CommInfoRequest>,
    ) -> crate::Result<()> {
        let reply = comm_info_reply(&self.comms, &req.content)?;
        req.send_reply(reply, &self.socket)
    }

    fn handle_execute_request(
        &mut self,
        req: &JupyterMessage<ExecuteRequest>,
    ) -> crate::Result<()> {
        match self
            .execution
            .handle_execute_request(&req.header, &req.content)
        {
            ExecuteResponse::Reply(reply) => req.send_reply(reply, &self.socket),
            ExecuteResponse::Exception(reply) => req.send_reply(reply, &self.socket),
        }
    }

    /// Deliver a message from the frontend to a comm. Replies, if any, go out
    /// on IOPub.
    fn handle_comm_msg(&mut self, req: &JupyterMessage<CommWireMsg>) -> crate::Result<()> {
        self.comms
            .dispatch(&req.content.comm_id, &req.content.data, &req.header)
    }
}

/// List the open comms, restricted to one target when the request names one.
fn comm_info_reply(comms: &CommRegistry, req: &CommInfoRequest) -> crate::Result<CommInfoReply> {
    let listed = match &req.target_name {
        Some(target_name) => comms.comms_for(target_name),
        None => comms.comms(),
    };

    let mut info = serde_json::Map::new();
    for comm in listed {
        let target = CommInfoTargetName {
            target_name: comm.target_name,
        };
        let value = serde_json::to_value(target).map_err(Error::CannotSerialize)?;
        info.insert(comm.id, value);
    }

    Ok(CommInfoReply {
        status: Status::Ok,
        comms: info,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use crossbeam::channel::unbounded;
    use serde_json::json;
    use serde_json::Value;

    use super::*;
    use crate::comm::comm_registry::CommHandler;

    struct Silent;

    impl CommHandler for Silent {
        fn handle_msg(
            &mut self,
            _data: &Value,
            _parent: &JupyterHeader,
        ) -> crate::Result<Option<Value>> {
            Ok(None)
        }
    }

    #[test]
    fn test_comm_info_filters_by_target() {
        let (tx, _rx) = unbounded();
        let comms = CommRegistry::new(tx);
        let config = comms.register("databricks.config", Arc::new(Mutex::new(Silent)));
        let actions = comms.register("databricks.actions", Arc::new(Mutex::new(Silent)));

        let all = comm_info_reply(&comms, &CommInfoRequest { target_name: None }).unwrap();
        assert_eq!(all.comms.len(), 2);
        assert_eq!(
            all.comms[&actions],
            json!({"target_name": "databricks.actions"})
        );

        let filtered = comm_info_reply(&comms, &CommInfoRequest {
            target_name: Some(String::from("databricks.config")),
        })
        .unwrap();
        assert_eq!(filtered.comms.len(), 1);
        assert!(filtered.comms.contains_key(&config));

        let none = comm_info_reply(&comms, &CommInfoRequest {
            target_name: Some(String::from("jupyter.widget")),
        })
        .unwrap();
        assert!(none.comms.is_empty());
    }
}
