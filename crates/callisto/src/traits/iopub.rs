//
// iopub.rs
//
// Copyright (C) 2026 Posit Software, PBC. All rights reserved.
//
//

use crossbeam::channel::SendError;
use crossbeam::channel::Sender;

use crate::socket::iopub::IOPubMessage;
use crate::wire::header::JupyterHeader;
use crate::wire::status::ExecutionState;
use crate::wire::status::KernelStatus;

pub trait StatusPublisher {
    /// Sets the kernel state by sending a `status` message on the IOPub
    /// channel, parented to the request that caused the change.
    fn publish_status(
        &self,
        state: ExecutionState,
        parent: Option<JupyterHeader>,
    ) -> Result<(), SendError<IOPubMessage>>;
}

impl StatusPublisher for Sender<IOPubMessage> {
    fn publish_status(
        &self,
        state: ExecutionState,
        parent: Option<JupyterHeader>,
    ) -> Result<(), SendError<IOPubMessage>> {
        let reply = KernelStatus {
            execution_state: state,
        };
        self.send(IOPubMessage::Status(parent, reply))
    }
}
