//! One source node fanning frames out to two sinks.
//!
//! Run with `RUST_LOG=media_event_graph=debug` to watch the arbiter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use media_event_graph::{Event, EventGraph, LinkId, Node, NodeDelegate};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CMD_FRAME: i32 = 1;

struct Fanout {
    delegate: OnceLock<NodeDelegate>,
    links: Mutex<Vec<LinkId>>,
    linked: Sender<()>,
}

impl Node for Fanout {
    fn name(&self) -> &str {
        "fanout"
    }

    fn scope(&self) -> &str {
        "call-1"
    }

    fn on_event(&self, event: Event) {
        let Some(delegate) = self.delegate.get() else {
            return;
        };
        let Some(frame) = event.obj::<Vec<u8>>() else {
            return;
        };
        let links = self.links.lock().map(|links| links.clone()).unwrap_or_default();
        for link_id in links {
            if !delegate.deliver(link_id, Event::new(CMD_FRAME, frame.clone())) {
                info!(link_id, "sink did not accept frame");
            }
        }
    }

    fn on_link_up(&self, link_id: Option<LinkId>, scope: &str, name: &str) {
        match link_id {
            Some(link_id) => {
                if let Ok(mut links) = self.links.lock() {
                    links.push(link_id);
                }
                info!(link_id, target = %format!("{scope}:{name}"), "linked");
            },
            None => info!(target = %format!("{scope}:{name}"), "link refused"),
        }
        let _ = self.linked.send(());
    }

    fn on_link_down(&self, link_id: LinkId, _scope: &str, _name: &str) {
        if let Ok(mut links) = self.links.lock() {
            links.retain(|current| *current != link_id);
        }
    }

    fn on_enter(&self, delegate: NodeDelegate) {
        for sink in ["sink-a", "sink-b"] {
            if let Err(error) = delegate.request_link_up("call-1", sink) {
                info!(message = %error, "link request failed");
            }
        }
        let _ = self.delegate.set(delegate);
    }

    fn on_exit(&self) {
        let _ = self.linked.send(());
    }
}

struct Sink {
    name: &'static str,
    delegate: OnceLock<NodeDelegate>,
    bytes: AtomicUsize,
    done: Sender<(&'static str, usize)>,
}

impl Node for Sink {
    fn name(&self) -> &str {
        self.name
    }

    fn scope(&self) -> &str {
        "call-1"
    }

    fn on_event(&self, event: Event) {
        if let Some(frame) = event.obj::<Vec<u8>>() {
            self.bytes.fetch_add(frame.len(), Ordering::Relaxed);
        }
    }

    fn on_enter(&self, delegate: NodeDelegate) {
        let _ = self.delegate.set(delegate);
    }

    fn on_exit(&self) {
        let _ = self.done.send((self.name, self.bytes.load(Ordering::Relaxed)));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let graph = EventGraph::new()?;
    let (done_tx, done_rx) = unbounded();
    let mut sinks = Vec::new();
    for name in ["sink-a", "sink-b"] {
        let sink = Arc::new(Sink {
            name,
            delegate: OnceLock::new(),
            bytes: AtomicUsize::new(0),
            done: done_tx.clone(),
        });
        graph.add_node_with_default_timeout(sink.clone())?;
        sinks.push(sink);
    }

    let (linked_tx, linked_rx) = unbounded();
    let fanout = Arc::new(Fanout {
        delegate: OnceLock::new(),
        links: Mutex::new(Vec::new()),
        linked: linked_tx,
    });
    graph.add_node_with_default_timeout(fanout.clone())?;
    for _ in 0..2 {
        linked_rx.recv_timeout(Duration::from_secs(1))?;
    }
    let stats = graph.stats(Duration::from_secs(1))?;
    info!(nodes = stats.nodes, links = stats.links, scopes = stats.scopes, "graph ready");

    let delegate = fanout
        .delegate
        .get()
        .ok_or("fanout delegate missing after on_enter")?;
    const FRAMES: usize = 10;
    let queued = (0..FRAMES)
        .filter(|_| delegate.deliver_self(Event::new(CMD_FRAME, vec![0_u8; 160])))
        .count();
    if queued < FRAMES {
        warn!(queued, dropped = FRAMES - queued, "fanout did not accept every frame");
    } else {
        info!(queued, "frames queued");
    }
    delegate.request_node_exit()?;
    // Fires once every queued frame went out.
    linked_rx.recv_timeout(Duration::from_secs(1))?;

    for sink in &sinks {
        if let Some(delegate) = sink.delegate.get() {
            delegate.request_node_exit()?;
        }
    }
    for _ in 0..sinks.len() {
        let (name, bytes) = done_rx.recv_timeout(Duration::from_secs(1))?;
        info!(sink = name, bytes, "sink finished");
    }
    Ok(())
}
