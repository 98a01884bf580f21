// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The two errors the core ever hands back to a caller, plus a
//! diagnostics-only record of the last absorbed transport failure.
//!
//! Mirrors `hdds`'s hand-written `rpc::error::RpcError` (a manual `Display` +
//! `std::error::Error` impl, no `thiserror`): this crate's error surface is
//! two unit variants, which does not earn a derive macro dependency.

use std::fmt;

use crate::ofp::OfpBuf;

/// Errors returned by [`crate::Rconn::send_with_limit`].
///
/// `send_with_limit` always consumes its buffer, on every path, so unlike
/// [`SendError`] this variant carries no payload back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RconnError {
    /// Not currently in a connected state.
    NotConnected,
    /// The caller-supplied packet counter already reached its queue limit.
    WouldBlock,
}

impl fmt::Display for RconnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RconnError::NotConnected => write!(f, "not connected"),
            RconnError::WouldBlock => write!(f, "send queue limit reached"),
        }
    }
}

impl std::error::Error for RconnError {}

/// Error returned by [`crate::Rconn::send`].
///
/// Unlike `send_with_limit`, plain `send` returns the buffer to the caller
/// on failure so it isn't silently dropped.
#[derive(Debug)]
pub enum SendError {
    NotConnected(OfpBuf),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NotConnected(_) => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for SendError {}

/// The last transport-level failure absorbed into a state transition.
///
/// Purely a diagnostics aid for `last_error()`/logging call sites. It has
/// no bearing on any state transition or timer, the same way `hdds`'s
/// `TcpEvent::Error { conn_id, error }` threads a descriptive string back to
/// the connection manager for logging without altering connection
/// bookkeeping (`transport/tcp/io_thread.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportIssue {
    /// The peer closed the connection in an orderly way.
    Eof,
    /// Any other transport failure.
    Failure(String),
}

impl fmt::Display for TransportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportIssue::Eof => write!(f, "connection closed by peer"),
            TransportIssue::Failure(msg) => write!(f, "connection dropped ({msg})"),
        }
    }
}

impl std::error::Error for TransportIssue {}
