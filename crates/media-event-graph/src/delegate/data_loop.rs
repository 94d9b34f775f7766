//! Data loop running `on_event` for one node.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, warn};

use crate::delegate::{DelegateCore, NodeDelegate, panic_message};
use crate::error::DelegateError;
use crate::event::Event;
use crate::node::Node;

/// Runs until the control loop drops `stop_rx`'s sender or the node panics.
///
/// Dropping `done_tx` tells the lifecycle worker that no further `on_event`
/// call will happen.
pub(crate) fn run_data_loop(
    node: Arc<dyn Node>,
    delegate: NodeDelegate,
    data_rx: Receiver<Event>,
    stop_rx: Receiver<()>,
    done_tx: Sender<()>,
) {
    let core = delegate.core();
    let crashed = loop {
        crossbeam_channel::select_biased! {
            recv(data_rx) -> event => {
                match event {
                    Ok(event) => {
                        if !dispatch(node.as_ref(), core, event) {
                            break true;
                        }
                    },
                    Err(_) => break false,
                }
            }
            recv(stop_rx) -> _ => break false,
        }
    };

    if crashed {
        let dropped = data_rx.len();
        // Senders blocked on a full channel fail right away.
        drop(data_rx);
        if dropped > 0 {
            warn!(node = %core.id(), dropped, "discarding events queued for crashed node");
        }
        match delegate.request_node_exit() {
            Ok(()) | Err(DelegateError::AlreadyExiting) => {},
            Err(error) => warn!(node = %core.id(), message = %error, "crashed node could not request exit"),
        }
    } else {
        drain(node.as_ref(), core, &data_rx);
    }

    debug!(node = %core.id(), "data loop finished");
    drop(done_tx);
}

/// Handles every event that was accepted before the node started exiting.
///
/// A delivery counted in flight may still land after the queue looked empty,
/// so the queue is only considered final when the in-flight count was zero
/// before the last sweep.
fn drain(node: &dyn Node, core: &DelegateCore, data_rx: &Receiver<Event>) {
    let poll = core.settings().exit_drain_poll;
    let mut drained = 0_usize;
    loop {
        let settled = core.in_flight() == 0;
        while let Ok(event) = data_rx.try_recv() {
            if !dispatch(node, core, event) {
                return;
            }
            drained += 1;
        }
        if settled {
            break;
        }
        match data_rx.recv_timeout(poll) {
            Ok(event) => {
                if !dispatch(node, core, event) {
                    return;
                }
                drained += 1;
            },
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if drained > 0 {
        debug!(node = %core.id(), drained, "drained events after stop");
    }
}

/// Runs `on_event` and the event's callback. Returns `false` if either
/// panicked.
fn dispatch(node: &dyn Node, core: &DelegateCore, mut event: Event) -> bool {
    let cmd = event.cmd();
    let callback = event.take_callback();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        node.on_event(event);
        if let Some(callback) = callback {
            callback();
        }
    }));
    match outcome {
        Ok(()) => true,
        Err(payload) => {
            error!(
                node = %core.id(),
                cmd,
                panic = panic_message(&*payload),
                "on_event panicked, isolating node"
            );
            false
        },
    }
}
