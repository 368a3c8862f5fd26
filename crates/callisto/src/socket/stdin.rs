/*
 * stdin.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use log::trace;
use log::warn;

use crate::socket::socket::Socket;
use crate::wire::wire_message::WireMessage;

/// The stdin channel is bound so frontends can connect to it, but the kernel
/// never asks for input; anything that arrives is logged and dropped.
pub struct Stdin {
    socket: Socket,
}

impl Stdin {
    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }

    /// Drain the stdin socket; does not return
    pub fn listen(&self) {
        loop {
            trace!("Waiting for stdin messages");
            match WireMessage::read_from_socket(&self.socket) {
                Ok(msg) => {
                    warn!(
                        "Ignoring '{}' message received on stdin socket",
                        msg.message_type()
                    );
                },
                Err(err) => {
                    warn!("Could not read message from stdin socket: {err}");
                },
            }
        }
    }
}
