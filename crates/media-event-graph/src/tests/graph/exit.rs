use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use super::harness::{Observed, Probe, TestNode, start_graph, wait_for_stats};
use crate::error::DelegateError;
use crate::event::Event;

#[test]
fn receiver_exit_tears_down_sender_link() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let b = Probe::add(&graph, TestNode::new("s", "b"));
    let link_id = a.link_up("s", "b").expect("link a->b");

    b.delegate()
        .request_node_exit()
        .expect("exit request should be accepted");

    assert!(b.wait_exit(), "b should reach on_exit");
    assert_eq!(a.wait_link_down(), Some((link_id, "b".to_string())));
    assert!(!a.delegate().deliver(link_id, Event::signal(1)));
    wait_for_stats(&graph, |stats| stats.nodes == 1 && stats.links == 0)
        .expect("only a should remain");
}

#[test]
fn sender_exit_is_silent_to_receiver() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let b = Probe::add(&graph, TestNode::new("s", "b"));
    a.link_up("s", "b").expect("link a->b");

    a.delegate()
        .request_node_exit()
        .expect("exit request should be accepted");
    assert!(a.wait_exit());

    b.assert_none_within(Duration::from_millis(150), |observed| {
        matches!(observed, Observed::LinkDown(..) | Observed::Exited)
    });
    assert!(b.delegate().deliver_self(Event::signal(3)));
    assert!(b.wait_event(3));
    wait_for_stats(&graph, |stats| stats.nodes == 1 && stats.links == 0)
        .expect("link should be gone with its sender");
}

#[test]
fn exit_handles_every_accepted_event_first() {
    let graph = start_graph();
    let a = Probe::add(
        &graph,
        TestNode::new("s", "a").on_event(|_, _| thread::sleep(Duration::from_millis(1))),
    );

    for cmd in 0..50 {
        assert!(a.delegate().deliver_self(Event::signal(cmd)));
    }
    a.delegate()
        .request_node_exit()
        .expect("exit request should be accepted");
    assert!(!a.delegate().deliver_self(Event::signal(99)));

    let seen = a.collect_until_exit();
    let expected: Vec<_> = (0..50)
        .map(Observed::Event)
        .chain([Observed::Exited])
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn concurrent_exit_requests_are_forwarded_once() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let barrier = Arc::new(Barrier::new(8));

    let callers: Vec<_> = (0..8)
        .map(|_| {
            let delegate = a.delegate().clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                delegate.request_node_exit()
            })
        })
        .collect();
    let results: Vec<_> = callers
        .into_iter()
        .map(|caller| caller.join().expect("caller should not panic"))
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(|error| *error == DelegateError::AlreadyExiting)
    );
    assert!(a.wait_exit());
    a.assert_none_within(Duration::from_millis(100), |observed| {
        *observed == Observed::Exited
    });
}

#[test]
fn identity_is_free_again_after_exit() {
    let graph = start_graph();
    let first = Probe::add(&graph, TestNode::new("s", "a"));
    first
        .delegate()
        .request_node_exit()
        .expect("exit request should be accepted");
    assert!(first.wait_exit());

    let second = Probe::add(&graph, TestNode::new("s", "a"));
    assert!(!second.delegate().is_exiting());
    assert!(second.delegate().deliver_self(Event::signal(1)));
    assert!(second.wait_event(1));

    // Requests through the stale delegate no longer reach the new node.
    assert_eq!(
        first.delegate().request_node_exit(),
        Err(DelegateError::AlreadyExiting)
    );
    assert!(!first.delegate().deliver_self(Event::signal(2)));
    first
        .delegate()
        .request_link_up("s", "a")
        .expect("request is submitted and refused by the arbiter");
    let stats = wait_for_stats(&graph, |stats| stats.nodes == 1).expect("one node");
    assert_eq!(stats.links, 0);
}
