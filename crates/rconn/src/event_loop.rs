// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event-loop primitives consumed by the core.
//!
//! `rconn` never owns a reactor; the owner passes one in through these two
//! calls so the core can arm timers and request an immediate re-poll without
//! depending on any particular I/O multiplexer.

/// The event-loop calls `rconn` needs from its owner.
pub trait EventLoop {
    /// Arm a one-shot timer `msecs` milliseconds from now.
    fn poll_timer_wait(&self, msecs: u64);

    /// Ask the loop to return immediately instead of blocking, so the
    /// caller gets another chance to drive `run()`.
    fn poll_immediate_wake(&self);
}

/// An [`EventLoop`] that does nothing; useful when the owner polls `run()`
/// on a fixed tick instead of an edge-triggered reactor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventLoop;

impl EventLoop for NoopEventLoop {
    fn poll_timer_wait(&self, _msecs: u64) {}
    fn poll_immediate_wake(&self) {}
}
