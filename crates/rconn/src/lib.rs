// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `rconn`, a reliable connection manager for a message-oriented
//! control-plane transport.
//!
//! Sits one layer above an unreliable, non-blocking transport ([`vconn`])
//! and gives its owner a persistent logical connection: automatic
//! reconnection with exponential backoff, a bounded send queue, inactivity
//! probing, admission-class tracking, and monitor fan-out. See
//! [`Rconn`] for the state diagram and the full API surface.
//!
//! The core never touches a socket, a thread, or a reactor directly. It is
//! driven entirely through the [`clock::Clock`], [`event_loop::EventLoop`],
//! and [`vconn::Vconn`]/[`vconn::VconnFactory`] traits, so its whole state
//! machine can be exercised in unit tests without any real I/O.

pub mod clock;
pub mod error;
pub mod event_loop;
pub mod ofp;
pub mod packet_counter;
mod rconn;
pub mod state;
#[cfg(feature = "testing")]
pub mod testing;
pub mod vconn;

pub use clock::{Clock, SystemClock};
pub use error::{RconnError, SendError, TransportIssue};
pub use event_loop::{EventLoop, NoopEventLoop};
pub use ofp::OfpBuf;
pub use packet_counter::PacketCounter;
pub use rconn::{Rconn, RconnStats};
pub use state::ConnState;
pub use vconn::{NullVconnFactory, TransportOutcome, Vconn, VconnFactory, WaitDirection};
