//! Lifecycle worker serializing a node's non-event callbacks.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, error, warn};

use crate::delegate::{NodeDelegate, panic_message};
use crate::error::{DelegateError, GraphError};
use crate::node::{LinkId, Node};
use crate::protocol::AddNodeAck;

/// Work scheduled by the control loop.
pub(crate) enum LifecycleTask {
    Enter {
        ack: Option<AddNodeAck>,
    },
    LinkUp {
        link_id: Option<LinkId>,
        scope: String,
        name: String,
    },
    LinkDown {
        link_id: LinkId,
        scope: String,
        name: String,
    },
    Exit,
}

pub(crate) fn run_lifecycle_worker(
    node: Arc<dyn Node>,
    delegate: NodeDelegate,
    tasks: Receiver<LifecycleTask>,
    done_rx: Receiver<()>,
) {
    while let Ok(task) = tasks.recv() {
        match task {
            LifecycleTask::Enter { ack } => {
                let entered = invoke(&delegate, "on_enter", || node.on_enter(delegate.clone()));
                if let Some(ack) = ack {
                    let result = if entered {
                        Ok(())
                    } else {
                        Err(GraphError::NodeEnterFailed {
                            node_id: delegate.id().to_string(),
                        })
                    };
                    let _ = ack.send(result);
                }
            },
            LifecycleTask::LinkUp {
                link_id,
                scope,
                name,
            } => {
                invoke(&delegate, "on_link_up", || {
                    node.on_link_up(link_id, &scope, &name)
                });
            },
            LifecycleTask::LinkDown {
                link_id,
                scope,
                name,
            } => {
                invoke(&delegate, "on_link_down", || {
                    node.on_link_down(link_id, &scope, &name)
                });
            },
            LifecycleTask::Exit => {
                // Disconnects once the data loop handled its last event.
                let _ = done_rx.recv();
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| node.on_exit())) {
                    error!(
                        node = %delegate.id(),
                        panic = panic_message(&*payload),
                        "on_exit panicked"
                    );
                }
                debug!(node = %delegate.id(), "node exited");
                return;
            },
        }
    }
}

/// Runs one callback; a panic requests the node's exit.
fn invoke(delegate: &NodeDelegate, callback: &'static str, body: impl FnOnce()) -> bool {
    let Err(payload) = catch_unwind(AssertUnwindSafe(body)) else {
        return true;
    };
    error!(
        node = %delegate.id(),
        callback,
        panic = panic_message(&*payload),
        "lifecycle callback panicked, isolating node"
    );
    match delegate.request_node_exit() {
        Ok(()) | Err(DelegateError::AlreadyExiting) => {},
        Err(error) => warn!(node = %delegate.id(), message = %error, "failed to request exit after panic"),
    }
    false
}
