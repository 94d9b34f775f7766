use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded};

use super::harness::{Observed, Probe, TestNode, WAIT, start_graph};
use crate::config::NodeProperties;
use crate::event::Event;

#[test]
fn delivery_to_full_receiver_times_out() {
    let graph = start_graph();
    let (started_tx, started_rx) = unbounded();
    let (gate_tx, gate_rx) = bounded::<()>(0);
    let receiver = TestNode::new("s", "slow")
        .with_properties(NodeProperties::new().with_data_channel_size(1))
        .on_event(move |_, _| {
            let _ = started_tx.send(());
            // Blocks until the gate sender is dropped.
            let _ = gate_rx.recv();
        });
    let slow = Probe::add(&graph, receiver);
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let link_id = a.link_up("s", "slow").expect("link a->slow");

    assert!(a.delegate().deliver(link_id, Event::signal(1)));
    started_rx
        .recv_timeout(WAIT)
        .expect("slow node should start handling the first event");
    assert!(a.delegate().deliver(link_id, Event::signal(2)));

    let timeout = Duration::from_millis(100);
    let started = Instant::now();
    assert!(!a.delegate().deliver_with_timeout(link_id, Event::signal(3), timeout));
    assert!(started.elapsed() >= timeout);

    drop(gate_tx);
    assert!(slow.wait_event(1));
    assert!(slow.wait_event(2));
    slow.assert_none_within(Duration::from_millis(100), |observed| {
        *observed == Observed::Event(3)
    });
}

#[test]
fn event_callback_runs_after_on_event() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let observer = a.observer();

    let event = Event::with_callback(5, (), move || {
        let _ = observer.send(Observed::Marker("callback"));
    });
    assert!(a.delegate().deliver_self(event));

    assert!(a.wait_event(5));
    assert_eq!(
        a.wait_for(|observed| matches!(observed, Observed::Marker(_))),
        Some(Observed::Marker("callback"))
    );
}

#[test]
fn handler_can_forward_over_its_own_links() {
    let graph = start_graph();
    let sink = Probe::add(&graph, TestNode::new("s", "sink"));
    let relay = Probe::add(
        &graph,
        TestNode::new("s", "relay").on_event(|delegate, event| {
            if let Some(value) = event.obj::<u32>() {
                delegate.deliver(0, Event::new(event.cmd() + 1, *value * 2));
            }
        }),
    );
    assert_eq!(relay.link_up("s", "sink"), Some(0));

    assert!(relay.delegate().deliver_self(Event::new(40, 21_u32)));

    assert!(relay.wait_event(40));
    assert!(sink.wait_event(41));
}

#[test]
fn concurrent_self_deliveries_are_all_handled_or_refused() {
    let graph = start_graph();
    let a = Probe::add(
        &graph,
        TestNode::new("s", "a").with_properties(NodeProperties::new().with_data_channel_size(16)),
    );
    let accepted = Arc::new(AtomicUsize::new(0));

    let senders: Vec<_> = (0..4)
        .map(|_| {
            let delegate = a.delegate().clone();
            let accepted = Arc::clone(&accepted);
            thread::spawn(move || {
                for cmd in 0..200 {
                    if delegate.deliver_self(Event::signal(cmd)) {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    a.delegate()
        .request_node_exit()
        .expect("first exit request should be accepted");
    for sender in senders {
        sender.join().expect("sender thread should not panic");
    }

    let seen = a.collect_until_exit();
    assert_eq!(seen.last(), Some(&Observed::Exited));
    let handled = seen
        .iter()
        .filter(|observed| matches!(observed, Observed::Event(_)))
        .count();
    assert_eq!(handled, accepted.load(Ordering::SeqCst));
}
