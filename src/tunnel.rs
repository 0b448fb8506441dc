//! Communication with connected watchers
//!
//! This module defines the trait for tunneling messages between the quiz
//! engine and connected clients (the presenter and participants). The
//! engine never talks to sockets directly: every operation that broadcasts
//! takes a `tunnel_finder` closure mapping a watcher [`Id`](crate::watcher::Id)
//! to its tunnel, returning `None` when the watcher is not connected.
//! Delivery is fire-and-forget.

use crate::game::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
///
/// Implementations might use WebSockets, Server-Sent Events, or any other
/// real-time channel.
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Update messages notify clients about changes that affect their
    /// current view.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the client
    ///
    /// Sync messages carry everything a client needs to render the current
    /// session state, typically right after it joins or reconnects.
    fn send_state(&self, state: &SyncMessage);
}
