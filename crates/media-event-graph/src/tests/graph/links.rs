use std::time::Duration;

use super::harness::{Observed, Probe, TestNode, start_graph, wait_for_stats};
use crate::config::NodeProperties;
use crate::error::DelegateError;
use crate::event::Event;

#[test]
fn event_travels_over_link() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let b = Probe::add(&graph, TestNode::new("s", "b"));

    let link_id = a.link_up("s", "b").expect("link a->b should be created");
    assert_eq!(link_id, 0);
    assert!(a.delegate().deliver(link_id, Event::new(7, "x")));

    assert!(b.wait_event(7), "b should handle the event");
}

#[test]
fn events_on_one_link_keep_sender_order() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let b = Probe::add(&graph, TestNode::new("s", "b"));
    let link_id = a.link_up("s", "b").expect("link a->b should be created");

    for cmd in 0..32 {
        assert!(a.delegate().deliver(link_id, Event::signal(cmd)));
    }

    let mut handled = Vec::new();
    while handled.len() < 32 {
        match b.wait_for(|observed| matches!(observed, Observed::Event(_))) {
            Some(Observed::Event(cmd)) => handled.push(cmd),
            other => panic!("missing event, got {other:?}"),
        }
    }
    assert_eq!(handled, (0..32).collect::<Vec<_>>());
}

#[test]
fn duplicate_link_is_rejected() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    let _b = Probe::add(&graph, TestNode::new("s", "b"));

    assert!(a.link_up("s", "b").is_some());
    assert_eq!(a.link_up("s", "b"), None);

    let stats = graph.stats(Duration::from_secs(1)).expect("stats");
    assert_eq!(stats.links, 1);
}

#[test]
fn link_to_missing_node_is_rejected() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));

    assert_eq!(a.link_up("s", "ghost"), None);
    assert_eq!(a.link_up("other", "a"), None);
    assert_eq!(
        a.delegate().request_link_up("s", ""),
        Err(DelegateError::EmptyLinkTarget)
    );
}

#[test]
fn max_link_bounds_outgoing_links() {
    let graph = start_graph();
    let a = Probe::add(
        &graph,
        TestNode::new("s", "a").with_properties(NodeProperties::new().with_max_link(2)),
    );
    for name in ["b", "c", "d"] {
        let _ = Probe::add(&graph, TestNode::new("s", name));
    }

    assert_eq!(a.delegate().max_link(), 2);
    assert!(a.link_up("s", "b").is_some());
    assert!(a.link_up("s", "c").is_some());
    assert_eq!(a.link_up("s", "d"), None);

    // Inbound links do not count toward the limit.
    let d = Probe::add(&graph, TestNode::new("t", "d"));
    assert!(d.link_up("s", "a").is_some());
}

#[test]
fn link_down_vacates_slot_for_reuse() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));
    for name in ["b", "c", "d"] {
        let _ = Probe::add(&graph, TestNode::new("s", name));
    }
    let to_b = a.link_up("s", "b").expect("link a->b");
    let to_c = a.link_up("s", "c").expect("link a->c");
    assert_eq!((to_b, to_c), (0, 1));

    a.delegate()
        .request_link_down(to_b)
        .expect("link down request should be submitted");
    assert_eq!(a.wait_link_down(), Some((to_b, "b".to_string())));
    assert!(!a.delegate().deliver(to_b, Event::signal(1)));
    assert_eq!(
        a.delegate().request_link_down(to_b),
        Err(DelegateError::LinkNotActive { link_id: to_b })
    );

    assert_eq!(a.link_up("s", "d"), Some(to_b));
    assert!(a.delegate().deliver(to_c, Event::signal(2)));

    wait_for_stats(&graph, |stats| stats.links == 2).expect("two links remain");
}

#[test]
fn self_link_delivers_to_own_data_loop() {
    let graph = start_graph();
    let a = Probe::add(&graph, TestNode::new("s", "a"));

    let link_id = a.link_up("s", "a").expect("self link");
    assert!(a.delegate().deliver(link_id, Event::signal(11)));
    assert!(a.wait_event(11));
}

#[test]
fn max_link_holds_under_concurrent_requests() {
    const LIMIT: usize = 3;
    let graph = start_graph();
    let a = Probe::add(
        &graph,
        TestNode::new("s", "a").with_properties(NodeProperties::new().with_max_link(LIMIT)),
    );
    let targets: Vec<String> = (0..=LIMIT).map(|n| format!("t{n}")).collect();
    for name in &targets {
        let _ = Probe::add(&graph, TestNode::new("s", name));
    }

    let requests: Vec<_> = targets
        .iter()
        .cloned()
        .map(|name| {
            let delegate = a.delegate().clone();
            std::thread::spawn(move || {
                delegate
                    .request_link_up("s", &name)
                    .expect("link up request should be submitted");
            })
        })
        .collect();
    for request in requests {
        request.join().expect("request thread");
    }

    let mut outcomes = Vec::new();
    while outcomes.len() <= LIMIT {
        match a.wait_for(|observed| matches!(observed, Observed::LinkUp(..))) {
            Some(Observed::LinkUp(link_id, _)) => outcomes.push(link_id),
            other => panic!("missing on_link_up, got {other:?}"),
        }
    }
    assert_eq!(outcomes.iter().filter(|link_id| link_id.is_none()).count(), 1);
    let mut granted: Vec<_> = outcomes.into_iter().flatten().collect();
    granted.sort_unstable();
    assert_eq!(granted, (0..LIMIT).collect::<Vec<_>>());
    wait_for_stats(&graph, |stats| stats.links == LIMIT).expect("limit many links");
}
