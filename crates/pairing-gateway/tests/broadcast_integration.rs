//! Integration tests for the broadcast engine and subscriber registry.
//!
//! These exercise `Broadcaster` through its public API only: initial
//! snapshots, ordering, disconnect idempotence, and the live set under
//! concurrent add/remove while fan-outs are in flight.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use pairing_core::{ConnectionStatus, OutboundMessage, SessionState};
use pairing_gateway::application::{Broadcaster, Subscriber, SubscriberId};
use tokio::sync::mpsc;

fn subscriber(capacity: usize) -> (Subscriber, mpsc::Receiver<OutboundMessage>) {
    Subscriber::channel("integration", capacity)
}

fn drain(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn to_json(messages: &[OutboundMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| serde_json::from_str(&m.to_json().unwrap()).unwrap())
        .collect()
}

// ── Initial snapshot ──────────────────────────────────────────────────────────

#[test]
fn test_subscriber_added_while_connected_gets_exactly_already_connected() {
    let bc = Broadcaster::default();
    bc.broadcast_pairing_code("OLD");
    bc.broadcast_status(ConnectionStatus::from_wire("WhatsApp connected successfully!"));

    let (sub, mut rx) = subscriber(8);
    bc.add_subscriber(sub);

    assert_eq!(
        to_json(&drain(&mut rx)),
        vec![serde_json::json!({"type": "status", "status": "WhatsApp already connected!"})]
    );
}

#[test]
fn test_subscriber_added_while_pairing_gets_exactly_current_code() {
    let bc = Broadcaster::default();
    bc.broadcast_pairing_code("FIRST");
    bc.broadcast_pairing_code("CURRENT");

    let (sub, mut rx) = subscriber(8);
    bc.add_subscriber(sub);

    assert_eq!(
        to_json(&drain(&mut rx)),
        vec![serde_json::json!({"type": "qr", "code": "CURRENT"})]
    );
}

#[test]
fn test_subscriber_added_after_disconnect_gets_nothing() {
    let bc = Broadcaster::default();
    bc.broadcast_pairing_code("Q1");
    bc.broadcast_status(ConnectionStatus::Disconnected);

    let (sub, mut rx) = subscriber(8);
    bc.add_subscriber(sub);

    assert!(drain(&mut rx).is_empty());
}

// ── State transitions ─────────────────────────────────────────────────────────

#[test]
fn test_disconnect_snapshot_is_empty_and_idempotent() {
    let bc = Broadcaster::default();
    bc.broadcast_pairing_code("Q1");
    bc.broadcast_status(ConnectionStatus::Connected);

    bc.broadcast_status(ConnectionStatus::from_wire("WhatsApp disconnected"));
    let once = bc.snapshot();
    bc.broadcast_status(ConnectionStatus::from_wire("WhatsApp disconnected"));
    let twice = bc.snapshot();

    assert_eq!(once, SessionState::default());
    assert_eq!(once, twice);
}

#[test]
fn test_codes_arrive_in_issue_order_for_every_subscriber() {
    let bc = Broadcaster::default();
    let mut receivers = Vec::new();
    for _ in 0..5 {
        let (sub, rx) = subscriber(8);
        bc.add_subscriber(sub);
        receivers.push(rx);
    }

    bc.broadcast_pairing_code("ABC123");
    bc.broadcast_pairing_code("XYZ789");

    for rx in &mut receivers {
        assert_eq!(
            drain(rx),
            vec![OutboundMessage::qr("ABC123"), OutboundMessage::qr("XYZ789")]
        );
    }
}

// ── Live set consistency ──────────────────────────────────────────────────────

#[test]
fn test_sequential_add_remove_matches_program_order() {
    let bc = Broadcaster::default();
    let mut expected: HashSet<SubscriberId> = HashSet::new();
    let mut keep = Vec::new();

    for i in 0..20 {
        let (sub, rx) = subscriber(64);
        let id = sub.id();
        bc.add_subscriber(sub);
        expected.insert(id);
        keep.push(rx);

        if i % 3 == 0 {
            bc.broadcast_pairing_code(format!("code-{i}"));
        }
        if i % 4 == 0 {
            bc.remove_subscriber(id);
            expected.remove(&id);
        }
        if i % 5 == 0 {
            bc.broadcast_status(ConnectionStatus::Connected);
        }
    }

    let live: HashSet<SubscriberId> = bc.registry().snapshot().iter().map(|s| s.id()).collect();
    assert_eq!(live, expected);
}

#[test]
fn test_concurrent_add_remove_during_fan_out_loses_nothing() {
    // Arrange: four threads churn subscribers while a fifth broadcasts.
    let bc = Arc::new(Broadcaster::default());
    let broadcaster = {
        let bc = Arc::clone(&bc);
        thread::spawn(move || {
            for i in 0..500 {
                bc.broadcast_pairing_code(format!("code-{i}"));
            }
        })
    };

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let bc = Arc::clone(&bc);
            thread::spawn(move || {
                let mut kept = Vec::new();
                for i in 0..100 {
                    // Large queues so no subscriber is dropped for being slow.
                    let (sub, rx) = Subscriber::channel("churn", 1024);
                    let id = sub.id();
                    assert!(bc.add_subscriber(sub));
                    if i % 2 == 0 {
                        assert!(bc.remove_subscriber(id));
                    } else {
                        kept.push((id, rx));
                    }
                }
                kept
            })
        })
        .collect();

    // Act
    broadcaster.join().unwrap();
    let kept: Vec<_> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();

    // Assert: exactly the non-removed subscribers remain
    let expected: HashSet<SubscriberId> = kept.iter().map(|(id, _)| *id).collect();
    let live: HashSet<SubscriberId> = bc.registry().snapshot().iter().map(|s| s.id()).collect();
    assert_eq!(live.len(), 200);
    assert_eq!(live, expected);
}

#[test]
fn test_subscriber_added_mid_stream_receives_all_later_events() {
    let bc = Broadcaster::default();
    bc.broadcast_pairing_code("Q1");

    let (sub, mut rx) = subscriber(8);
    bc.add_subscriber(sub);
    bc.broadcast_pairing_code("Q2");
    bc.broadcast_status(ConnectionStatus::Connected);

    assert_eq!(
        drain(&mut rx),
        vec![
            OutboundMessage::qr("Q1"),
            OutboundMessage::qr("Q2"),
            OutboundMessage::status(&ConnectionStatus::Connected),
        ]
    );
}

#[test]
fn test_closed_subscriber_does_not_block_others() {
    let bc = Broadcaster::default();
    let (alive, mut alive_rx) = subscriber(8);
    let (gone, gone_rx) = subscriber(8);
    let gone_id = gone.id();
    bc.add_subscriber(alive);
    bc.add_subscriber(gone);
    drop(gone_rx);

    bc.broadcast_status(ConnectionStatus::Connected);
    bc.broadcast_status(ConnectionStatus::Disconnected);

    assert!(!bc.registry().contains(gone_id));
    assert_eq!(drain(&mut alive_rx).len(), 2);
}
