/*
 * socket.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use log::trace;

use crate::error::Error;
use crate::session::Session;

/// A zmq socket bundled with the session used to sign and verify what goes
/// through it.
pub struct Socket {
    /// Signing key, signature policy, and the identity stamped on outbound
    /// headers
    pub session: Session,

    /// Channel name ("Shell", "IOPub", ...), used in logs and errors
    pub name: String,

    pub socket: zmq::Socket,
}

/// Whether a socket of this kind listens or dials. Kernel-side channels
/// bind; the frontend side (and the test fixture) connects.
fn binds(kind: zmq::SocketType) -> Option<bool> {
    match kind {
        zmq::ROUTER | zmq::PUB | zmq::XPUB | zmq::REP => Some(true),
        zmq::DEALER | zmq::SUB | zmq::REQ => Some(false),
        _ => None,
    }
}

impl Socket {
    /// Create a socket of `kind` on `ctx` and bind or connect it to
    /// `endpoint`, depending on its kind.
    pub fn new(
        session: Session,
        ctx: zmq::Context,
        name: String,
        kind: zmq::SocketType,
        identity: Option<&[u8]>,
        endpoint: String,
    ) -> Result<Self, Error> {
        let Some(bind) = binds(kind) else {
            return Err(Error::UnsupportedSocketType(kind));
        };

        let socket = ctx
            .socket(kind)
            .map_err(|err| Error::CreateSocketFailed(name.clone(), err))?;

        // Options must be set before bind/connect to take effect
        Self::configure(&socket, &name, kind, identity)
            .map_err(|err| Error::CreateSocketFailed(name.clone(), err))?;

        if bind {
            trace!("Binding '{name}' socket to {endpoint}");
            socket
                .bind(&endpoint)
                .map_err(|err| Error::SocketBindError(name.clone(), endpoint.clone(), err))?;
        } else {
            trace!("Connecting '{name}' socket to {endpoint}");
            socket
                .connect(&endpoint)
                .map_err(|err| Error::SocketConnectError(name.clone(), endpoint.clone(), err))?;
        }

        Ok(Self {
            session,
            name,
            socket,
        })
    }

    fn configure(
        socket: &zmq::Socket,
        name: &str,
        kind: zmq::SocketType,
        identity: Option<&[u8]>,
    ) -> zmq::Result<()> {
        // Stream output can arrive in bursts; the default high water mark of
        // 1000 drops messages under load
        if kind == zmq::XPUB || name == "IOPub" {
            socket.set_sndhwm(100_000)?;
        }

        if let Some(identity) = identity {
            socket.set_identity(identity)?;
        }

        // Fail loudly on unroutable replies in debug builds instead of
        // dropping them
        #[cfg(debug_assertions)]
        {
            if kind == zmq::ROUTER {
                socket.set_router_mandatory(true)?;
            }
        }

        Ok(())
    }

    /// Receive a single frame. Blocks until one arrives.
    pub fn recv(&self, msg: &mut zmq::Message) -> Result<(), Error> {
        self.socket
            .recv(msg, 0)
            .map_err(|err| Error::ZmqError(self.name.clone(), err))
    }

    /// Receive every frame of the next message. Blocks until one arrives.
    pub fn recv_multipart(&self) -> Result<Vec<Vec<u8>>, Error> {
        self.socket
            .recv_multipart(0)
            .map_err(|err| Error::ZmqError(self.name.clone(), err))
    }

    pub fn send(&self, msg: zmq::Message) -> Result<(), Error> {
        self.socket
            .send(msg, 0)
            .map_err(|err| Error::ZmqError(self.name.clone(), err))
    }

    pub fn send_multipart(&self, frames: &[Vec<u8>]) -> Result<(), Error> {
        self.socket
            .send_multipart(frames, 0)
            .map_err(|err| Error::ZmqError(self.name.clone(), err))
    }

    /// Wait up to `timeout_ms` for something to read; `-1` waits forever.
    pub fn poll_incoming(&self, timeout_ms: i64) -> zmq::Result<bool> {
        Ok(self.socket.poll(zmq::PollEvents::POLLIN, timeout_ms)? != 0)
    }

    pub fn has_incoming_data(&self) -> zmq::Result<bool> {
        self.poll_incoming(0)
    }

    /// Subscribe a SUB socket to every topic. Call once the connection is
    /// established on both ends.
    pub fn subscribe(&self) -> Result<(), Error> {
        self.socket
            .set_subscribe(b"")
            .map_err(|err| Error::ZmqError(self.name.clone(), err))
    }
}
