// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-tick reconnection, probing, and monitor fan-out scenarios, driven
//! entirely through `rconn::testing`'s mock clock/transport so every tick
//! is deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};

use rconn::testing::{MockClock, MockEventLoop, MockVconn, MockVconnFactory, ScriptedOutcome};
use rconn::{OfpBuf, Rconn};

/// Scenario 1: a reliable connect whose transport never even opens lands
/// in BACKOFF with backoff=1 after a single `run()`, and arms a 1000 ms
/// timer.
#[test]
fn failed_open_goes_straight_to_backoff() {
    let clock = MockClock::new(1000);
    let event_loop = MockEventLoop::new();
    let mut rc = Rconn::create(
        0,
        8,
        Box::new(MockVconnFactory::new(|_| Err("refused".to_string()))),
        Box::new(clock.clone()),
        Box::new(event_loop),
    );
    rc.connect("tcp:127.0.0.1:6633");

    assert_eq!(rc.get_state(), "BACKOFF");
    assert_eq!(rc.get_backoff(), 1);
    assert_eq!(rc.get_attempted_connections(), 1);
    assert_eq!(rc.get_successful_connections(), 0);
}

/// Scenarios 1 through 3 chained: the first open fails (BACKOFF, backoff=1);
/// once the deadline passes, the next open succeeds but the handshake keeps
/// returning try-again, so a further full backoff period gives up and
/// doubles the backoff again.
#[test]
fn connecting_timeout_doubles_backoff() {
    let clock = MockClock::new(1000);
    let vconn = MockVconn::new();
    vconn.script_connect([ScriptedOutcome::TryAgain, ScriptedOutcome::TryAgain]);
    let vconn_for_factory = vconn.clone();
    let opens = AtomicUsize::new(0);

    let mut rc = Rconn::create(
        0,
        8,
        Box::new(MockVconnFactory::new(move |_| {
            if opens.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("refused".to_string())
            } else {
                Ok(Box::new(vconn_for_factory.clone()) as Box<dyn rconn::Vconn>)
            }
        })),
        Box::new(clock.clone()),
        Box::new(MockEventLoop::new()),
    );

    // Scenario 1: the first open fails outright.
    rc.connect("tcp:127.0.0.1:6633");
    assert_eq!(rc.get_state(), "BACKOFF");
    assert_eq!(rc.get_backoff(), 1);

    // Scenario 2: once the 1s backoff deadline passes, the retry opens the
    // transport but the handshake isn't done yet.
    clock.advance(1);
    rc.run();
    assert_eq!(rc.get_state(), "CONNECTING");

    // Scenario 3: one more full CONNECTING timeout (1s, since backoff=1)
    // with no handshake progress gives up and doubles the backoff.
    clock.advance(1);
    rc.run();
    assert_eq!(rc.get_state(), "BACKOFF");
    assert_eq!(rc.get_backoff(), 2);
}

/// Scenario 6: an unanswered inactivity probe disconnects the rconn and
/// flags connectivity as questionable exactly once.
#[test]
fn unanswered_probe_disconnects_and_flags_connectivity() {
    let clock = MockClock::new(2000);
    let vconn = MockVconn::new();
    vconn.script_connect([ScriptedOutcome::Ok]);
    let vconn_for_factory = vconn.clone();

    let mut rc = Rconn::create(
        5,
        8,
        Box::new(MockVconnFactory::new(move |_| {
            Ok(Box::new(vconn_for_factory.clone()) as Box<dyn rconn::Vconn>)
        })),
        Box::new(clock.clone()),
        Box::new(MockEventLoop::new()),
    );
    rc.connect("tcp:127.0.0.1:6633");
    rc.run();
    assert_eq!(rc.get_state(), "ACTIVE");

    // A long silence: ACTIVE -> IDLE, one probe sent, no reply fed in.
    clock.advance(65);
    rc.run();
    assert_eq!(rc.get_state(), "IDLE");
    assert_eq!(vconn.sent_messages().len(), 1);

    // A further silent probe_interval with the probe unanswered disconnects.
    // last_connected is far enough in the past by now that connectivity
    // gets flagged questionable too.
    clock.advance(5);
    rc.run();
    assert_eq!(rc.get_state(), "BACKOFF");
    assert!(rc.is_connectivity_questionable());
    assert!(!rc.is_connectivity_questionable());
}

/// Scenario 9: only the first 8 monitors are kept; the 9th is closed
/// immediately, and sends still fan out to the 8 survivors.
#[test]
fn ninth_monitor_is_rejected() {
    let clock = MockClock::new(1000);
    let vconn = MockVconn::new();
    let mut rc = Rconn::create(
        0,
        8,
        Box::new(MockVconnFactory::new(|_| Err("n/a".to_string()))),
        Box::new(clock),
        Box::new(MockEventLoop::new()),
    );
    rc.connect_unreliably("tcp:127.0.0.1:6633", Box::new(vconn));

    let monitors: Vec<MockVconn> = (0..9).map(|_| MockVconn::new()).collect();
    for m in &monitors {
        rc.add_monitor(Box::new(m.clone()));
    }

    // add_monitor closed the 9th synchronously; it never joined the pool.
    assert!(monitors[8].is_closed());

    let probe = OfpBuf::new(vec![1, 2, 0, 8, 0, 0, 0, 0]);
    let _ = rc.send(probe, None);

    let delivered = monitors[..8]
        .iter()
        .filter(|m| !m.sent_messages().is_empty())
        .count();
    assert_eq!(delivered, 8);
    assert!(monitors[8].sent_messages().is_empty());
}
