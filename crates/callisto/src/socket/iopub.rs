/*
 * iopub.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::time::Duration;

use crossbeam::channel::tick;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;
use crossbeam::select;
use log::info;
use log::trace;
use log::warn;

use crate::error::Error;
use crate::socket::socket::Socket;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::display_data::DisplayData;
use crate::wire::header::JupyterHeader;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::status::ExecutionState;
use crate::wire::status::KernelStatus;
use crate::wire::stream::StreamOutput;
use crate::wire::subscription_message::SubscriptionKind;
use crate::wire::subscription_message::SubscriptionMessage;

/// How often the XPUB socket is checked for subscription frames
const SUBSCRIPTION_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct IOPub {
    /// The underlying IOPub socket
    socket: Socket,

    /// A channel that receives IOPub messages from other threads
    receiver: Receiver<IOPubMessage>,

    /// Notified once, when the first frontend subscribes
    subscription_tx: Sender<()>,

    subscribed: bool,
}

/// Enumeration of all messages that can be delivered from the IOPub XPUB/SUB
/// socket. These messages generally are created on other threads and then sent
/// via a channel to the IOPub thread.
///
/// The header, when present, becomes the parent header of the published
/// message so frontends can pair output with the request that caused it.
#[derive(Debug)]
pub enum IOPubMessage {
    Status(Option<JupyterHeader>, KernelStatus),
    Stream(Option<JupyterHeader>, StreamOutput),
    DisplayData(Option<JupyterHeader>, DisplayData),
    CommMsgReply(JupyterHeader, CommWireMsg),
    CommMsgEvent(CommWireMsg),
}

impl IOPub {
    /// Create a new IOPub socket wrapper.
    ///
    /// * `socket` - The ZeroMQ socket that will deliver IOPub messages to
    ///   subscribed clients.
    /// * `receiver` - The receiver channel that will receive IOPub
    ///   messages from other threads.
    /// * `subscription_tx` - Notified when the first subscriber arrives.
    pub fn new(
        socket: Socket,
        receiver: Receiver<IOPubMessage>,
        subscription_tx: Sender<()>,
    ) -> Self {
        Self {
            socket,
            receiver,
            subscription_tx,
            subscribed: false,
        }
    }

    /// Listen for IOPub messages from other threads. Returns once every
    /// sender has been dropped.
    pub fn listen(&mut self) {
        let poll_subscriptions = tick(SUBSCRIPTION_POLL_INTERVAL);

        loop {
            select! {
                recv(self.receiver) -> message => {
                    match message {
                        Ok(message) => {
                            if let Err(error) = self.process_message(message) {
                                warn!("Error delivering iopub message: {error:?}")
                            }
                        },
                        Err(_) => {
                            info!("IOPub channel closed, stopping");
                            return;
                        },
                    }
                },
                recv(poll_subscriptions) -> _ => self.drain_subscriptions(),
            }
        }
    }

    /// Read every pending subscription frame off the XPUB socket.
    fn drain_subscriptions(&mut self) {
        loop {
            match self.socket.has_incoming_data() {
                Ok(true) => {},
                Ok(false) => return,
                Err(err) => {
                    warn!("Could not poll IOPub socket: {err}");
                    return;
                },
            }

            let message = match SubscriptionMessage::read_from_socket(&self.socket) {
                Ok(message) => message,
                Err(err) => {
                    warn!("Could not read IOPub subscription message: {err}");
                    continue;
                },
            };
            trace!("IOPub subscription message: {message:?}");

            if message.kind == SubscriptionKind::Subscribe && !self.subscribed {
                self.subscribed = true;
                self.emit_state(ExecutionState::Starting);
                // `connect()` may have given up waiting already
                let _ = self.subscription_tx.try_send(());
            }
        }
    }

    /// Process an IOPub message from another thread.
    fn process_message(&mut self, message: IOPubMessage) -> Result<(), Error> {
        match message {
            IOPubMessage::Status(parent, msg) => self.send_message(parent, msg),
            IOPubMessage::Stream(parent, msg) => self.send_message(parent, msg),
            IOPubMessage::DisplayData(parent, msg) => self.send_message(parent, msg),
            IOPubMessage::CommMsgReply(parent, msg) => self.send_message(Some(parent), msg),
            IOPubMessage::CommMsgEvent(msg) => self.send_message(None, msg),
        }
    }

    /// Emits the given kernel state to the client, with no parent.
    fn emit_state(&self, state: ExecutionState) {
        let reply = KernelStatus {
            execution_state: state,
        };
        if let Err(err) = self.send_message(None, reply) {
            warn!("Could not emit kernel's state. {}", err)
        }
    }

    /// Send a message using the underlying socket with the given content and
    /// parent header.
    fn send_message<T: ProtocolMessage>(
        &self,
        parent: Option<JupyterHeader>,
        content: T,
    ) -> Result<(), Error> {
        let msg = JupyterMessage::<T>::create(content, parent, &self.socket.session);
        msg.send(&self.socket)
    }
}
