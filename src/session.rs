//! Communication session management
//!
//! This module defines the trait for tunneling messages between the
//! poll engine and connected clients (the teacher and students). The
//! tunnel abstraction keeps the engine independent of the transport;
//! implementations might use WebSockets, Server-Sent Events, or other
//! real-time communication protocols.

use super::UpdateMessage;

/// Trait for sending messages through a communication tunnel
///
/// The engine never holds tunnels itself; it looks them up on demand
/// through a `tunnel_finder` closure keyed by connection id, so a
/// missing tunnel simply means the client is gone.
pub trait Tunnel {
    /// Sends an update message to the client
    fn send_message(&self, message: &UpdateMessage);

    /// Closes the communication tunnel
    ///
    /// Called when the engine forcibly detaches a client, such as when
    /// a student is kicked from a poll.
    fn close(self);
}
