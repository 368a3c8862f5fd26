/*
 * control.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::ops::ControlFlow;
use std::sync::Arc;

use crossbeam::channel::Sender;
use log::error;
use log::info;
use log::trace;
use log::warn;

use crate::error::Error;
use crate::language::backend::Backend;
use crate::language::execution::InterruptFlag;
use crate::socket::socket::Socket;
use crate::wire::interrupt_reply::InterruptReply;
use crate::wire::interrupt_request::InterruptRequest;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::jupyter_message::Status;
use crate::wire::shutdown_reply::ShutdownReply;
use crate::wire::shutdown_request::ShutdownRequest;

pub struct Control {
    socket: Socket,

    /// Shared with the shell thread, which polls it while a command runs
    interrupt: InterruptFlag,

    backend: Arc<dyn Backend>,

    /// Tells the kernel handle that a shutdown was requested
    shutdown_tx: Sender<ShutdownRequest>,
}

impl Control {
    pub fn new(
        socket: Socket,
        interrupt: InterruptFlag,
        backend: Arc<dyn Backend>,
        shutdown_tx: Sender<ShutdownRequest>,
    ) -> Self {
        Self {
            socket,
            interrupt,
            backend,
            shutdown_tx,
        }
    }

    /// Serve the control channel until a shutdown request has been answered.
    pub fn listen(&self) {
        loop {
            trace!("Waiting for control messages");
            let message = match Message::read_from_socket(&self.socket) {
                Ok(message) => message,
                Err(err) => {
                    warn!("Dropping unreadable control message: {err}");
                    continue;
                },
            };

            let flow = match message {
                Message::ShutdownRequest(req) => self.handle_shutdown(req),
                Message::InterruptRequest(req) => self.handle_interrupt(req),
                other => {
                    warn!("{}", Error::UnsupportedMessage(other, self.socket.name.clone()));
                    ControlFlow::Continue(())
                },
            };

            if flow.is_break() {
                info!("Control channel closed");
                return;
            }
        }
    }

    fn handle_interrupt(&self, req: JupyterMessage<InterruptRequest>) -> ControlFlow<()> {
        info!("Interrupt requested");

        // The shell thread notices the flag at its next poll and cancels
        // the remote command there
        self.interrupt.request();

        let reply = InterruptReply { status: Status::Ok };
        if let Err(err) = req.send_reply(reply, &self.socket) {
            error!("Can't send interrupt reply: {err}");
        }
        ControlFlow::Continue(())
    }

    fn handle_shutdown(&self, req: JupyterMessage<ShutdownRequest>) -> ControlFlow<()> {
        info!("Shutdown requested (restart: {})", req.content.restart);

        if let Err(err) = self.backend.shutdown() {
            warn!("Backend didn't shut down cleanly: {err:?}");
        }

        let reply = ShutdownReply {
            status: Status::Ok,
            restart: req.content.restart,
        };
        if let Err(err) = req.send_reply(reply, &self.socket) {
            error!("Can't send shutdown reply: {err}");
        }

        if self.shutdown_tx.send(req.content).is_err() {
            trace!("No one is waiting for the shutdown notification");
        }
        ControlFlow::Break(())
    }
}
