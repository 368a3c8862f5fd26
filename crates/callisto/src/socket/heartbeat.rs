/*
 * heartbeat.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::time::Duration;

use log::debug;
use log::trace;
use log::warn;

use crate::error::Error;
use crate::socket::socket::Socket;

/// Pause after a failed receive so a broken socket doesn't flood the log
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The REP side of the heartbeat channel: every frame is echoed back as is.
pub struct Heartbeat {
    socket: Socket,
}

impl Heartbeat {
    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }

    /// Echo heartbeats until the zmq context is terminated.
    pub fn listen(&self) {
        debug!("Listening for heartbeats");
        loop {
            let mut msg = zmq::Message::new();
            match self.socket.recv(&mut msg) {
                Ok(()) => trace!("Heartbeat received ({} bytes)", msg.len()),
                Err(Error::ZmqError(_, zmq::Error::ETERM)) => {
                    debug!("Heartbeat context terminated, stopping");
                    return;
                },
                Err(err) => {
                    warn!("Error receiving heartbeat: {err}");
                    std::thread::sleep(RETRY_DELAY);
                    continue;
                },
            }

            if let Err(err) = self.socket.send(msg) {
                warn!("Error replying to heartbeat: {err}");
            }
        }
    }
}
