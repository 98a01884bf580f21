// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Test doubles for the transport, clock, and event-loop traits.
//!
//! Grounded directly on `hdds`'s `transport::tcp::byte_stream::mock::MockStream`
//! (a `Vec`-backed byte stream with injectable errors and feed/drain helpers),
//! generalized here to also give tests control over `now()`. Gated behind the
//! `testing` feature so the crate-level `tests/` integration suite can use it
//! without pulling mock types into release builds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::event_loop::EventLoop;
use crate::ofp::OfpBuf;
use crate::vconn::{TransportOutcome, Vconn, VconnFactory, WaitDirection};

/// A [`Clock`] whose `now()` a test can set directly.
#[derive(Clone, Default)]
pub struct MockClock(Arc<AtomicU64>);

impl MockClock {
    pub fn new(start: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    pub fn set(&self, secs: u64) {
        self.0.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// An [`EventLoop`] that just records its calls for assertions.
#[derive(Default)]
pub struct MockEventLoop {
    pub timer_waits: Mutex<Vec<u64>>,
    pub immediate_wakes: Mutex<u32>,
}

impl MockEventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_timer_wait(&self) -> Option<u64> {
        self.timer_waits.lock().unwrap().last().copied()
    }
}

impl EventLoop for MockEventLoop {
    fn poll_timer_wait(&self, msecs: u64) {
        self.timer_waits.lock().unwrap().push(msecs);
    }

    fn poll_immediate_wake(&self) {
        *self.immediate_wakes.lock().unwrap() += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Ok,
    TryAgain,
    Eof,
    Failure,
}

#[derive(Default)]
struct MockVconnState {
    connect_script: Mutex<VecDeque<ScriptedOutcome>>,
    send_script: Mutex<VecDeque<ScriptedOutcome>>,
    inbox: Mutex<VecDeque<OfpBuf>>,
    sent: Mutex<Vec<OfpBuf>>,
    closed: AtomicBool,
}

/// A scriptable [`Vconn`] for driving state-machine scenarios.
///
/// `Arc`-backed and `Clone`, the same way [`MockClock`] is, so a test can
/// hand one clone to an [`Rconn`](crate::Rconn) (which takes ownership of
/// its transport) while keeping another to script outcomes and assert on
/// what was sent.
#[derive(Clone, Default)]
pub struct MockVconn(Arc<MockVconnState>);

impl MockVconn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome(s) `connect()` should report, in order. The last
    /// queued outcome repeats once the queue is drained.
    pub fn script_connect(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        self.0.connect_script.lock().unwrap().extend(outcomes);
    }

    pub fn script_send(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        self.0.send_script.lock().unwrap().extend(outcomes);
    }

    pub fn feed_recv(&self, buf: OfpBuf) {
        self.0.inbox.lock().unwrap().push_back(buf);
    }

    pub fn sent_messages(&self) -> Vec<OfpBuf> {
        self.0.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    fn next_connect_outcome(&self) -> ScriptedOutcome {
        let mut script = self.0.connect_script.lock().unwrap();
        script.pop_front().unwrap_or(ScriptedOutcome::Ok)
    }

    fn next_send_outcome(&self) -> ScriptedOutcome {
        let mut script = self.0.send_script.lock().unwrap();
        script.pop_front().unwrap_or(ScriptedOutcome::Ok)
    }
}

impl Vconn for MockVconn {
    fn connect(&mut self) -> TransportOutcome<()> {
        match self.next_connect_outcome() {
            ScriptedOutcome::Ok => TransportOutcome::Ok(()),
            ScriptedOutcome::TryAgain => TransportOutcome::TryAgain,
            ScriptedOutcome::Eof => TransportOutcome::Eof,
            ScriptedOutcome::Failure => TransportOutcome::Failure("mock connect failure".into()),
        }
    }

    fn send(&mut self, buf: &OfpBuf) -> TransportOutcome<()> {
        match self.next_send_outcome() {
            ScriptedOutcome::Ok => {
                self.0.sent.lock().unwrap().push(buf.clone());
                TransportOutcome::Ok(())
            }
            ScriptedOutcome::TryAgain => TransportOutcome::TryAgain,
            ScriptedOutcome::Eof => TransportOutcome::Eof,
            ScriptedOutcome::Failure => TransportOutcome::Failure("mock send failure".into()),
        }
    }

    fn recv(&mut self) -> TransportOutcome<OfpBuf> {
        match self.0.inbox.lock().unwrap().pop_front() {
            Some(buf) => TransportOutcome::Ok(buf),
            None => TransportOutcome::TryAgain,
        }
    }

    fn close(&mut self) {
        self.0.closed.store(true, Ordering::SeqCst);
    }

    fn wait(&self, _direction: WaitDirection) {}
}

/// A [`VconnFactory`] that always hands out the same pre-built [`MockVconn`]
/// outcomes via a constructor closure, so a test can script the *next*
/// connection attempt before `reconnect()` runs.
pub struct MockVconnFactory<F>(F)
where
    F: Fn(&str) -> Result<Box<dyn Vconn>, String> + Send;

impl<F> MockVconnFactory<F>
where
    F: Fn(&str) -> Result<Box<dyn Vconn>, String> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> VconnFactory for MockVconnFactory<F>
where
    F: Fn(&str) -> Result<Box<dyn Vconn>, String> + Send,
{
    fn open(&self, name: &str) -> Result<Box<dyn Vconn>, String> {
        (self.0)(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances() {
        let clock = MockClock::new(10);
        assert_eq!(clock.now(), 10);
        clock.advance(5);
        assert_eq!(clock.now(), 15);
    }

    #[test]
    fn mock_vconn_scripts_in_order() {
        let mut v = MockVconn::new();
        v.script_connect([ScriptedOutcome::TryAgain, ScriptedOutcome::Ok]);
        assert!(matches!(v.connect(), TransportOutcome::TryAgain));
        assert!(matches!(v.connect(), TransportOutcome::Ok(())));
    }

    #[test]
    fn mock_vconn_records_sent_messages() {
        let mut v = MockVconn::new();
        let msg = OfpBuf::new(vec![1, 2, 3, 4]);
        assert!(matches!(v.send(&msg), TransportOutcome::Ok(())));
        assert_eq!(v.sent_messages(), vec![msg]);
    }
}
