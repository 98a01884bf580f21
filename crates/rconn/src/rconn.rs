// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The reliable connection manager itself.

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use crate::clock::Clock;
use crate::error::{RconnError, SendError, TransportIssue};
use crate::event_loop::EventLoop;
use crate::ofp::{is_admission_class, make_echo_request, msg_type, OfpBuf};
use crate::packet_counter::PacketCounter;
use crate::state::ConnState;
use crate::vconn::{TransportOutcome, Vconn, VconnFactory, WaitDirection};

const MAX_MONITORS: usize = 8;
/// Default `max_backoff` when the caller passes 0.
const DEFAULT_MAX_BACKOFF: u32 = 8;
/// Connectivity-suspicion and admission debounce windows.
const ADMISSION_GRACE_SECS: u64 = 30;
const QUESTION_DEBOUNCE_SECS: u64 = 60;

struct QueuedMsg {
    buf: OfpBuf,
    counter: Option<PacketCounter>,
}

/// A bundle of the counters exposed individually through the `get_*`
/// accessors, grounded on `hdds`'s `TcpConnectionStats`
/// (`transport/tcp/connection.rs`), which bundles equivalent counters next
/// to the same per-field getters elsewhere in that module.
#[derive(Debug, Clone, Copy, Default)]
pub struct RconnStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub n_attempted_connections: u64,
    pub n_successful_connections: u64,
    pub total_time_connected: u64,
    pub seqno: u64,
}

/// A logically persistent connection to a named peer.
///
/// Owns its transport, send queue, and backoff/probe timers; see the crate
/// docs for the state diagram. No method may be called concurrently with
/// any other on the same instance; there is no internal locking.
pub struct Rconn {
    name: String,
    reliable: bool,

    state: ConnState,
    state_entered: u64,

    vconn: Option<Box<dyn Vconn>>,
    opener: Box<dyn VconnFactory>,
    clock: Box<dyn Clock>,
    event_loop: Box<dyn EventLoop>,

    txq: VecDeque<QueuedMsg>,

    backoff: u32,
    max_backoff: u32,
    backoff_deadline: u64,

    last_received: u64,
    last_connected: u64,
    last_admitted: u64,
    last_questioned: u64,
    creation_time: u64,

    probe_interval: u32,
    probably_admitted: bool,

    packets_sent: u64,
    packets_received: u64,
    n_attempted_connections: u64,
    n_successful_connections: u64,
    total_time_connected: u64,
    seqno: u64,

    questionable_connectivity: bool,

    local_ip: Option<Ipv4Addr>,
    remote_ip: Option<Ipv4Addr>,
    remote_port: Option<u16>,

    monitors: Vec<Box<dyn Vconn>>,

    last_error: Option<TransportIssue>,
}

impl Rconn {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Creates a disconnected (`VOID`) rconn.
    ///
    /// `probe_interval` of 0 disables inactivity probing; otherwise it is
    /// clamped up to at least 5 seconds. `max_backoff` of 0 defaults to 8.
    pub fn create(
        probe_interval: u32,
        max_backoff: u32,
        opener: Box<dyn VconnFactory>,
        clock: Box<dyn Clock>,
        event_loop: Box<dyn EventLoop>,
    ) -> Self {
        let now = clock.now();
        let mut rc = Self {
            name: "void".to_string(),
            reliable: false,
            state: ConnState::Void,
            state_entered: now,
            vconn: None,
            opener,
            clock,
            event_loop,
            txq: VecDeque::new(),
            backoff: 0,
            max_backoff: if max_backoff == 0 {
                DEFAULT_MAX_BACKOFF
            } else {
                max_backoff
            },
            backoff_deadline: 0,
            last_received: now,
            last_connected: now,
            last_admitted: now,
            last_questioned: now,
            creation_time: now,
            probe_interval: 0,
            probably_admitted: false,
            packets_sent: 0,
            packets_received: 0,
            n_attempted_connections: 0,
            n_successful_connections: 0,
            total_time_connected: 0,
            seqno: 0,
            questionable_connectivity: false,
            local_ip: None,
            remote_ip: None,
            remote_port: None,
            monitors: Vec::new(),
            last_error: None,
        };
        rc.set_probe_interval(probe_interval);
        rc
    }

    /// Creates a new rconn and immediately connects it (reliably) to `name`.
    pub fn new(
        name: &str,
        probe_interval: u32,
        max_backoff: u32,
        opener: Box<dyn VconnFactory>,
        clock: Box<dyn Clock>,
        event_loop: Box<dyn EventLoop>,
    ) -> Self {
        let mut rc = Self::create(probe_interval, max_backoff, opener, clock, event_loop);
        rc.connect(name);
        rc
    }

    /// Creates a new rconn and adopts an already-open `vconn` unreliably:
    /// any disconnect is terminal (returns to `VOID`) rather than
    /// triggering backoff-and-reconnect. Never reconnects on its own, so it
    /// needs no real [`VconnFactory`]; see [`crate::vconn::NullVconnFactory`].
    pub fn new_from_vconn(
        name: &str,
        vconn: Box<dyn Vconn>,
        clock: Box<dyn Clock>,
        event_loop: Box<dyn EventLoop>,
    ) -> Self {
        let mut rc = Self::create(
            60,
            0,
            Box::new(crate::vconn::NullVconnFactory),
            clock,
            event_loop,
        );
        rc.connect_unreliably(name, vconn);
        rc
    }

    fn set_vconn_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.local_ip = None;
        self.remote_ip = None;
        self.remote_port = None;
    }

    /// Disconnects any current connection and reconnects reliably to `name`.
    pub fn connect(&mut self, name: &str) {
        self.disconnect();
        self.set_vconn_name(name);
        self.reliable = true;
        self.attempt_connect();
    }

    /// Disconnects any current connection and adopts `vconn` unreliably.
    pub fn connect_unreliably(&mut self, name: &str, vconn: Box<dyn Vconn>) {
        self.disconnect();
        self.set_vconn_name(name);
        self.reliable = false;
        self.vconn = Some(vconn);
        let now = self.clock.now();
        self.last_connected = now;
        self.transition(ConnState::Active, now);
    }

    /// Forces a connected rconn to drop and reconnect.
    pub fn reconnect(&mut self) {
        if matches!(self.state, ConnState::Active | ConnState::Idle) {
            log::info!("{}: disconnecting", self.name);
            self.trigger_disconnect(false);
        }
    }

    /// Unconditionally returns to `VOID`. A no-op if already `VOID`.
    pub fn disconnect(&mut self) {
        if self.state != ConnState::Void {
            if let Some(mut v) = self.vconn.take() {
                v.close();
            }
            self.name = "void".to_string();
            self.reliable = false;
            self.backoff = 0;
            self.backoff_deadline = 0;
            let now = self.clock.now();
            self.transition(ConnState::Void, now);
        }
    }

    /// Explicit teardown; equivalent to dropping the rconn.
    pub fn destroy(self) {
        drop(self);
    }

    // ========================================================================
    // Internal: state machine
    // ========================================================================

    fn timeout(&self) -> u64 {
        match self.state {
            ConnState::Void => u64::MAX,
            ConnState::Backoff => self.backoff as u64,
            ConnState::Connecting => (self.backoff as u64).max(1),
            ConnState::Active => {
                if self.probe_interval == 0 {
                    u64::MAX
                } else {
                    let base = self.last_received.max(self.state_entered);
                    (base + self.probe_interval as u64).saturating_sub(self.state_entered)
                }
            }
            ConnState::Idle => self.probe_interval as u64,
        }
    }

    fn elapsed_in_state(&self, now: u64) -> u64 {
        now.saturating_sub(self.state_entered)
    }

    fn timed_out(&self, now: u64) -> bool {
        now >= self.state_entered.saturating_add(self.timeout())
    }

    fn transition(&mut self, new_state: ConnState, now: u64) {
        let was_active = self.state == ConnState::Active;
        let will_be_active = new_state == ConnState::Active;
        if was_active != will_be_active {
            self.seqno = self.seqno.wrapping_add(1);
        }
        if new_state.is_connected() && !self.state.is_connected() {
            self.probably_admitted = false;
        }
        if self.state.is_connected() {
            self.total_time_connected += self.elapsed_in_state(now);
        }
        log::debug!("{}: entering {}", self.name, new_state);
        self.state = new_state;
        self.state_entered = now;
    }

    fn attempt_connect(&mut self) {
        log::info!("{}: connecting...", self.name);
        self.n_attempted_connections += 1;
        match self.opener.open(&self.name) {
            Ok(v) => {
                self.remote_ip = v.remote_ip();
                self.local_ip = v.local_ip();
                self.remote_port = v.remote_port();
                self.vconn = Some(v);
                let now = self.clock.now();
                self.backoff_deadline = now.saturating_add(self.backoff as u64);
                self.transition(ConnState::Connecting, now);
            }
            Err(msg) => {
                log::warn!("{}: connection failed ({msg})", self.name);
                // Forbid the backoff reset: a reconnect that fails before it
                // even opens a transport tells us nothing good about the
                // peer's health.
                self.backoff_deadline = u64::MAX;
                self.trigger_disconnect(true);
            }
        }
    }

    /// `forbid_reset` suppresses the backoff reset that would otherwise
    /// happen once `backoff_deadline` has passed. Used when a disconnect
    /// happens before the transport even finished opening, which tells us
    /// nothing good about the peer and shouldn't restart the backoff at 1.
    fn trigger_disconnect(&mut self, forbid_reset: bool) {
        if self.reliable {
            let now = self.clock.now();
            if matches!(
                self.state,
                ConnState::Connecting | ConnState::Active | ConnState::Idle
            ) {
                if let Some(mut v) = self.vconn.take() {
                    v.close();
                }
                self.flush_queue();
            }

            if !forbid_reset && now >= self.backoff_deadline {
                self.backoff = 1;
            } else {
                self.backoff = self.backoff.saturating_mul(2).max(1).min(self.max_backoff);
            }
            self.backoff_deadline = now.saturating_add(self.backoff as u64);
            self.transition(ConnState::Backoff, now);

            if now.saturating_sub(self.last_connected) > QUESTION_DEBOUNCE_SECS {
                self.question_connectivity(now);
            }
        } else {
            self.disconnect();
        }
    }

    fn flush_queue(&mut self) {
        if self.txq.is_empty() {
            return;
        }
        while let Some(item) = self.txq.pop_front() {
            if let Some(c) = &item.counter {
                c.dec();
            }
        }
        self.event_loop.poll_immediate_wake();
    }

    fn question_connectivity(&mut self, now: u64) {
        if now.saturating_sub(self.last_questioned) > QUESTION_DEBOUNCE_SECS {
            self.questionable_connectivity = true;
            self.last_questioned = now;
        }
    }

    fn report_error(&mut self, issue: TransportIssue) {
        match &issue {
            TransportIssue::Eof => {
                if self.reliable {
                    log::info!("{}: connection closed by peer", self.name);
                } else {
                    log::debug!("{}: connection closed by peer", self.name);
                }
            }
            TransportIssue::Failure(msg) => {
                log::warn!("{}: connection dropped ({msg})", self.name);
            }
        }
        self.last_error = Some(issue);
    }

    // ========================================================================
    // Run loop
    // ========================================================================

    /// Drives whatever activity the current state requires: reconnects,
    /// probes, and drains the send queue. Loops until a pass leaves the
    /// state unchanged. A single pass would miss back-to-back transitions
    /// like ACTIVE → IDLE → BACKOFF, or a BACKOFF → CONNECTING whose
    /// deadline has already elapsed.
    pub fn run(&mut self) {
        loop {
            let old_state = self.state;
            match self.state {
                ConnState::Void => {}
                ConnState::Backoff => self.run_backoff(),
                ConnState::Connecting => self.run_connecting(),
                ConnState::Active => self.run_active(),
                ConnState::Idle => self.run_idle(),
            }
            if self.state == old_state {
                break;
            }
        }
    }

    fn run_backoff(&mut self) {
        let now = self.clock.now();
        if self.timed_out(now) {
            self.attempt_connect();
        }
    }

    fn run_connecting(&mut self) {
        let outcome = match self.vconn.as_mut() {
            Some(v) => v.connect(),
            None => return,
        };
        match outcome {
            TransportOutcome::Ok(()) => {
                log::info!("{}: connected", self.name);
                self.n_successful_connections += 1;
                let now = self.clock.now();
                self.transition(ConnState::Active, now);
                self.last_connected = now;
            }
            TransportOutcome::TryAgain => {
                let now = self.clock.now();
                if self.timed_out(now) {
                    log::info!("{}: connection timed out", self.name);
                    self.backoff_deadline = u64::MAX;
                    self.trigger_disconnect(true);
                }
            }
            TransportOutcome::Eof => {
                self.trigger_disconnect(false);
            }
            TransportOutcome::Failure(msg) => {
                log::info!("{}: connection failed ({msg})", self.name);
                self.trigger_disconnect(false);
            }
        }
    }

    fn run_active(&mut self) {
        let now = self.clock.now();
        if self.timed_out(now) {
            let base = self.last_received.max(self.state_entered);
            log::debug!(
                "{}: idle {} seconds, sending inactivity probe",
                self.name,
                now.saturating_sub(base)
            );
            // Ordering matters: transition before enqueueing. send() can
            // itself observe a disconnect and fall to BACKOFF; enqueueing
            // first could stuff a probe behind a transport we just closed.
            self.transition(ConnState::Idle, now);
            let _ = self.send(make_echo_request(), None);
            return;
        }
        self.do_tx_work();
    }

    fn run_idle(&mut self) {
        let now = self.clock.now();
        if self.timed_out(now) {
            self.question_connectivity(now);
            log::warn!(
                "{}: no response to inactivity probe after {} seconds, disconnecting",
                self.name,
                self.elapsed_in_state(now)
            );
            self.trigger_disconnect(false);
        } else {
            self.do_tx_work();
        }
    }

    fn do_tx_work(&mut self) {
        if self.txq.is_empty() {
            return;
        }
        while !self.txq.is_empty() {
            if self.try_send().is_err() {
                break;
            }
        }
        if self.txq.is_empty() {
            self.event_loop.poll_immediate_wake();
        }
    }

    fn try_send(&mut self) -> Result<(), ()> {
        let vconn = match self.vconn.as_mut() {
            Some(v) => v,
            None => return Err(()),
        };
        let front = match self.txq.front() {
            Some(f) => f,
            None => return Ok(()),
        };
        let outcome = vconn.send(&front.buf);
        match outcome {
            TransportOutcome::Ok(()) => {
                let item = self.txq.pop_front().expect("front just matched");
                if let Some(c) = &item.counter {
                    c.dec();
                }
                self.packets_sent += 1;
                Ok(())
            }
            TransportOutcome::TryAgain => Err(()),
            TransportOutcome::Eof => {
                self.report_error(TransportIssue::Eof);
                self.trigger_disconnect(false);
                Err(())
            }
            TransportOutcome::Failure(msg) => {
                self.report_error(TransportIssue::Failure(msg));
                self.trigger_disconnect(false);
                Err(())
            }
        }
    }

    // ========================================================================
    // Event-loop registration
    // ========================================================================

    /// Arms the timer for the current state's timeout, and, if connected
    /// with queued sends, registers send-readiness on the transport.
    pub fn wait(&self) {
        let now = self.clock.now();
        let to = self.timeout();
        if to != u64::MAX {
            let expires = self.state_entered.saturating_add(to);
            let remaining = expires.saturating_sub(now);
            self.event_loop.poll_timer_wait(remaining.saturating_mul(1000));
        }
        if self.state.is_connected() && !self.txq.is_empty() {
            if let Some(v) = &self.vconn {
                v.wait(WaitDirection::Send);
            }
        }
    }

    /// Registers recv-readiness on the transport, if any is open.
    pub fn recv_wait(&self) {
        if let Some(v) = &self.vconn {
            v.wait(WaitDirection::Recv);
        }
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Enqueues `buf` for sending. Returns `NotConnected` (with `buf` handed
    /// back) if not currently connected. `counter`, if given, is
    /// incremented while the packet is in flight and decremented once it
    /// leaves the queue (sent or dropped on disconnect).
    pub fn send(&mut self, buf: OfpBuf, counter: Option<PacketCounter>) -> Result<(), SendError> {
        if !self.state.is_connected() {
            return Err(SendError::NotConnected(buf));
        }
        self.copy_to_monitor(&buf);
        if let Some(c) = &counter {
            c.inc();
        }
        self.txq.push_back(QueuedMsg { buf, counter });

        // If the queue was empty before this push, try to send right away;
        // otherwise the transport is already backlogged and run() will
        // catch up on the next tick.
        if self.txq.len() == 1 {
            let _ = self.try_send();
        }
        Ok(())
    }

    /// Like [`Rconn::send`], but refuses (and drops `buf`) once
    /// `counter.n() >= limit`. Unlike `send`, `buf` is consumed on every
    /// path.
    pub fn send_with_limit(
        &mut self,
        buf: OfpBuf,
        counter: PacketCounter,
        limit: u32,
    ) -> Result<(), RconnError> {
        if counter.n() >= limit {
            drop(buf);
            return Err(RconnError::WouldBlock);
        }
        match self.send(buf, Some(counter)) {
            Ok(()) => Ok(()),
            Err(SendError::NotConnected(buf)) => {
                drop(buf);
                Err(RconnError::NotConnected)
            }
        }
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    /// Pulls one message from the transport, or `None` if not connected or
    /// nothing is available. On success, mirrors the message to monitors,
    /// updates liveness/admission bookkeeping, and (from IDLE) returns to
    /// ACTIVE.
    pub fn recv(&mut self) -> Option<OfpBuf> {
        if !self.state.is_connected() {
            return None;
        }
        let outcome = match self.vconn.as_mut() {
            Some(v) => v.recv(),
            None => return None,
        };
        match outcome {
            TransportOutcome::Ok(buf) => {
                self.copy_to_monitor(&buf);
                let now = self.clock.now();
                let admitting = !is_admission_class(msg_type(&buf));
                if self.probably_admitted
                    || admitting
                    || now.saturating_sub(self.last_connected) >= ADMISSION_GRACE_SECS
                {
                    self.probably_admitted = true;
                    self.last_admitted = now;
                }
                self.last_received = now;
                self.packets_received += 1;
                if self.state == ConnState::Idle {
                    self.transition(ConnState::Active, now);
                }
                Some(buf)
            }
            TransportOutcome::TryAgain => None,
            TransportOutcome::Eof => {
                self.report_error(TransportIssue::Eof);
                self.trigger_disconnect(false);
                None
            }
            TransportOutcome::Failure(msg) => {
                self.report_error(TransportIssue::Failure(msg));
                self.trigger_disconnect(false);
                None
            }
        }
    }

    // ========================================================================
    // Monitors
    // ========================================================================

    /// Adds a secondary transport that receives a clone of every message
    /// sent or received on the primary. Closes `vconn` immediately if
    /// already at capacity (8).
    pub fn add_monitor(&mut self, mut vconn: Box<dyn Vconn>) {
        if self.monitors.len() < MAX_MONITORS {
            log::info!("{}: new monitor connection", self.name);
            self.monitors.push(vconn);
        } else {
            log::debug!("{}: too many monitor connections, discarding", self.name);
            vconn.close();
        }
    }

    fn copy_to_monitor(&mut self, buf: &OfpBuf) {
        if self.monitors.is_empty() {
            return;
        }
        let mut clone: Option<OfpBuf> = None;
        let mut i = 0;
        while i < self.monitors.len() {
            if clone.is_none() {
                clone = Some(buf.clone());
            }
            let outcome = self.monitors[i].send(clone.as_ref().expect("set above"));
            match outcome {
                TransportOutcome::Ok(()) => {
                    clone = None;
                    i += 1;
                }
                TransportOutcome::TryAgain => {
                    // buf wasn't consumed; hand the same clone to the next
                    // monitor instead of allocating a fresh one.
                    i += 1;
                }
                TransportOutcome::Eof | TransportOutcome::Failure(_) => {
                    log::debug!("{}: closing monitor connection", self.name);
                    self.monitors[i].close();
                    self.monitors.swap_remove(i);
                }
            }
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn set_max_backoff(&mut self, max_backoff: u32) {
        self.max_backoff = max_backoff.max(1);
        if self.state == ConnState::Backoff && self.backoff > self.max_backoff {
            self.backoff = self.max_backoff;
            let now = self.clock.now();
            let clamped_deadline = now.saturating_add(self.max_backoff as u64);
            if self.backoff_deadline > clamped_deadline {
                self.backoff_deadline = clamped_deadline;
            }
        }
    }

    pub fn get_max_backoff(&self) -> u32 {
        self.max_backoff
    }

    pub fn set_probe_interval(&mut self, probe_interval: u32) {
        self.probe_interval = if probe_interval == 0 {
            0
        } else {
            probe_interval.max(5)
        };
    }

    pub fn get_probe_interval(&self) -> u32 {
        self.probe_interval
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_state(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_alive(&self) -> bool {
        self.state != ConnState::Void
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_admitted(&self) -> bool {
        self.is_connected() && self.last_admitted >= self.last_connected
    }

    pub fn failure_duration(&self) -> u64 {
        if self.is_admitted() {
            0
        } else {
            self.clock.now().saturating_sub(self.last_admitted)
        }
    }

    /// Consuming read: returns whether connectivity has looked questionable
    /// since the last call, then clears the flag.
    pub fn is_connectivity_questionable(&mut self) -> bool {
        let questionable = self.questionable_connectivity;
        self.questionable_connectivity = false;
        questionable
    }

    pub fn get_remote_ip(&self) -> Option<Ipv4Addr> {
        self.remote_ip
    }

    pub fn get_remote_port(&self) -> Option<u16> {
        self.remote_port
    }

    pub fn get_local_ip(&self) -> Option<Ipv4Addr> {
        self.local_ip
    }

    pub fn get_local_port(&self) -> Option<u16> {
        self.vconn.as_ref().and_then(|v| v.local_port())
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn get_attempted_connections(&self) -> u64 {
        self.n_attempted_connections
    }

    pub fn get_successful_connections(&self) -> u64 {
        self.n_successful_connections
    }

    pub fn get_last_connection(&self) -> u64 {
        self.last_connected
    }

    pub fn get_last_received(&self) -> u64 {
        self.last_received
    }

    pub fn get_creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn get_total_time_connected(&self) -> u64 {
        let now = self.clock.now();
        self.total_time_connected
            + if self.is_connected() {
                self.elapsed_in_state(now)
            } else {
                0
            }
    }

    pub fn get_backoff(&self) -> u32 {
        self.backoff
    }

    pub fn get_state_elapsed(&self) -> u64 {
        let now = self.clock.now();
        self.elapsed_in_state(now)
    }

    pub fn get_connection_seqno(&self) -> u64 {
        self.seqno
    }

    /// The most recently absorbed transport failure, for diagnostics only.
    /// It has no bearing on any invariant or transition.
    pub fn last_error(&self) -> Option<&TransportIssue> {
        self.last_error.as_ref()
    }

    pub fn stats(&self) -> RconnStats {
        RconnStats {
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            n_attempted_connections: self.n_attempted_connections,
            n_successful_connections: self.n_successful_connections,
            total_time_connected: self.get_total_time_connected(),
            seqno: self.seqno,
        }
    }
}

impl Drop for Rconn {
    fn drop(&mut self) {
        self.flush_queue();
        if let Some(mut v) = self.vconn.take() {
            v.close();
        }
        for mut m in self.monitors.drain(..) {
            m.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClock, MockEventLoop, MockVconn, MockVconnFactory, ScriptedOutcome};

    /// Scenario 4: ACTIVE, probe_interval=5, no traffic -> advance 5s, run()
    /// puts it in IDLE with one echo-request sent.
    #[test]
    fn active_goes_idle_and_sends_probe_after_silence() {
        let clock = MockClock::new(1000);
        let vconn = MockVconn::new();
        let mut rc = unreliable_rconn(vconn.clone(), clock.clone());
        assert_eq!(rc.get_state(), "ACTIVE");

        clock.advance(5);
        rc.run();

        assert_eq!(rc.get_state(), "IDLE");
        assert_eq!(vconn.sent_messages().len(), 1);
    }

    /// Scenario 5: receiving any message while IDLE returns to ACTIVE.
    #[test]
    fn recv_while_idle_returns_to_active() {
        let clock = MockClock::new(1000);
        let vconn = MockVconn::new();
        let mut rc = unreliable_rconn(vconn.clone(), clock.clone());
        clock.advance(5);
        rc.run();
        assert_eq!(rc.get_state(), "IDLE");

        vconn.feed_recv(OfpBuf::new(vec![1, 3, 0, 8, 0, 0, 0, 0]));
        let before = clock.now();
        let got = rc.recv();
        assert!(got.is_some());
        assert_eq!(rc.get_state(), "ACTIVE");
        assert_eq!(rc.get_last_received(), before);
    }

    /// Scenario 7: ACTIVE >= 30s of only pre-admission traffic, then a
    /// qualifying (non-pre-admission) message admits the connection.
    #[test]
    fn recv_of_admitting_message_sets_probably_admitted() {
        let clock = MockClock::new(1000);
        let vconn = MockVconn::new();
        let mut rc = unreliable_rconn(vconn.clone(), clock.clone());
        assert!(!rc.is_admitted());

        clock.advance(31);
        // type 10 (PACKET_IN-like) is not in the pre-admission class.
        vconn.feed_recv(OfpBuf::new(vec![1, 10, 0, 8, 0, 0, 0, 0]));
        rc.recv();

        assert!(rc.is_admitted());
        assert_eq!(rc.get_last_connection(), 1000);
    }

    /// Scenario 8: send_with_limit refuses once counter.n() reaches the
    /// limit, and still consumes the buffer.
    #[test]
    fn send_with_limit_refuses_at_limit() {
        let clock = MockClock::new(1000);
        let vconn = MockVconn::new();
        let mut rc = unreliable_rconn(vconn, clock);

        let counter = PacketCounter::new();
        for _ in 0..5 {
            counter.inc();
        }
        let buf = OfpBuf::new(vec![1, 0, 0, 8, 0, 0, 0, 0]);
        let result = rc.send_with_limit(buf, counter.clone(), 5);
        assert!(matches!(result, Err(RconnError::WouldBlock)));
        assert_eq!(counter.n(), 5);
    }

    /// Invariant 2: txq is only ever non-empty in ACTIVE/IDLE.
    #[test]
    fn send_while_disconnected_is_rejected_and_buffer_returned() {
        let clock = MockClock::new(1000);
        let mut rc = Rconn::create(
            0,
            8,
            Box::new(MockVconnFactory::new(|_| Err("down".to_string()))),
            Box::new(clock),
            Box::new(MockEventLoop::new()),
        );
        rc.connect("x");
        rc.run();
        assert_eq!(rc.get_state(), "BACKOFF");

        let buf = OfpBuf::new(vec![1, 0, 0, 8, 0, 0, 0, 0]);
        let err = rc.send(buf, None).unwrap_err();
        match err {
            SendError::NotConnected(returned) => {
                assert_eq!(returned.as_bytes(), &[1, 0, 0, 8, 0, 0, 0, 0])
            }
        }
    }

    /// Round-trip: disconnect() in VOID is a no-op.
    #[test]
    fn disconnect_in_void_is_noop() {
        let clock = MockClock::new(1000);
        let mut rc = Rconn::create(
            0,
            8,
            Box::new(MockVconnFactory::new(|_| Err("n/a".to_string()))),
            Box::new(clock),
            Box::new(MockEventLoop::new()),
        );
        assert_eq!(rc.get_state(), "VOID");
        rc.disconnect();
        assert_eq!(rc.get_state(), "VOID");
    }

    /// Round-trip: set_probe_interval/get_probe_interval clamping.
    #[test]
    fn probe_interval_clamps_to_five_or_zero() {
        let clock = MockClock::new(1000);
        let mut rc = Rconn::create(
            0,
            8,
            Box::new(MockVconnFactory::new(|_| Err("n/a".to_string()))),
            Box::new(clock),
            Box::new(MockEventLoop::new()),
        );
        rc.set_probe_interval(0);
        assert_eq!(rc.get_probe_interval(), 0);
        rc.set_probe_interval(2);
        assert_eq!(rc.get_probe_interval(), 5);
        rc.set_probe_interval(30);
        assert_eq!(rc.get_probe_interval(), 30);
    }

    /// `is_connectivity_questionable` only fires once per set.
    #[test]
    fn questionable_connectivity_is_edge_triggered() {
        let clock = MockClock::new(1000);
        let vconn = MockVconn::new();
        vconn.script_connect([ScriptedOutcome::Ok]);
        let vconn_for_factory = vconn.clone();
        let mut rc = Rconn::create(
            0,
            8,
            Box::new(MockVconnFactory::new(move |_| {
                Ok(Box::new(vconn_for_factory.clone()) as Box<dyn Vconn>)
            })),
            Box::new(clock.clone()),
            Box::new(MockEventLoop::new()),
        );
        rc.connect("x");
        rc.run();
        clock.advance(61);
        rc.reconnect();
        assert!(rc.is_connectivity_questionable());
        assert!(!rc.is_connectivity_questionable());
    }

    // --- helpers -----------------------------------------------------------

    /// Builds an rconn already ACTIVE over an unreliable `vconn` clone.
    fn unreliable_rconn(vconn: MockVconn, clock: MockClock) -> Rconn {
        let mut rc = Rconn::create(
            5,
            8,
            Box::new(MockVconnFactory::new(|_| Err("n/a".to_string()))),
            Box::new(clock),
            Box::new(MockEventLoop::new()),
        );
        rc.connect_unreliably("x", Box::new(vconn));
        rc
    }
}
