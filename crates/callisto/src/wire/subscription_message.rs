/*
 * subscription_message.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use crate::error::Error;
use crate::socket::socket::Socket;

/// The frame an XPUB socket receives when a SUB peer calls
/// `set_subscribe()` or `set_unsubscribe()`.
#[derive(Debug, PartialEq)]
pub struct SubscriptionMessage {
    pub kind: SubscriptionKind,
    pub subscription: String,
}

#[derive(Debug, PartialEq)]
pub enum SubscriptionKind {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionMessage {
    /// Read a SubscriptionMessage from a ZeroMQ socket.
    pub fn read_from_socket(socket: &Socket) -> crate::Result<SubscriptionMessage> {
        let bufs = socket.recv_multipart()?;
        Self::from_buffers(bufs)
    }

    /// Parse a SubscriptionMessage from the frames of a ZeroMQ message.
    ///
    /// Always a single frame: `1{subscription}` to subscribe or
    /// `0{subscription}` to unsubscribe.
    fn from_buffers(bufs: Vec<Vec<u8>>) -> crate::Result<SubscriptionMessage> {
        let [buf] = bufs.as_slice() else {
            let n = bufs.len();
            return Err(crate::anyhow!(
                "Subscription message on XPUB must be a single frame. {n} frames were received."
            ));
        };

        let Some((flag, rest)) = buf.split_first() else {
            return Err(crate::anyhow!(
                "Subscription message on XPUB must be at least length 1 to determine subscribe/unsubscribe."
            ));
        };

        let kind = if *flag == 1 {
            SubscriptionKind::Subscribe
        } else {
            SubscriptionKind::Unsubscribe
        };

        let subscription = match std::str::from_utf8(rest) {
            Ok(subscription) => subscription.to_string(),
            Err(err) => {
                return Err(Error::Utf8Error(
                    String::from("subscription"),
                    rest.to_vec(),
                    err,
                ))
            },
        };

        Ok(Self { kind, subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_frames() {
        let msg = SubscriptionMessage::from_buffers(vec![vec![1]]).unwrap();
        assert_eq!(msg.kind, SubscriptionKind::Subscribe);
        assert_eq!(msg.subscription, "");

        let msg = SubscriptionMessage::from_buffers(vec![b"\x00status".to_vec()]).unwrap();
        assert_eq!(msg.kind, SubscriptionKind::Unsubscribe);
        assert_eq!(msg.subscription, "status");

        assert!(SubscriptionMessage::from_buffers(vec![]).is_err());
        assert!(SubscriptionMessage::from_buffers(vec![vec![]]).is_err());
        assert!(SubscriptionMessage::from_buffers(vec![vec![1], vec![1]]).is_err());
    }
}
