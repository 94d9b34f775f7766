//! Control loop applying arbiter responses to one delegate.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::delegate::DelegateCore;
use crate::delegate::SlotAllocator;
use crate::delegate::lifecycle::LifecycleTask;
use crate::protocol::ControlResponse;

/// Runs until the arbiter confirms the node's removal.
///
/// Slot changes happen here before the matching lifecycle callback is
/// scheduled, so a node never sees a link id in `on_link_up` that is not yet
/// deliverable.
pub(crate) fn run_system_loop(
    core: Arc<DelegateCore>,
    ctrl_rx: Receiver<ControlResponse>,
    tasks: Sender<LifecycleTask>,
    stop_tx: Sender<()>,
) {
    let mut allocator = SlotAllocator::default();

    while let Ok(response) = ctrl_rx.recv() {
        match response {
            ControlResponse::NodeAdded { ack } => {
                let _ = tasks.send(LifecycleTask::Enter { ack });
            },
            ControlResponse::LinkUp {
                status,
                link,
                scope,
                name,
            } => {
                let link_id = match link {
                    Some(link) if status.is_success() => {
                        Some(allocator.attach(core.slots(), link))
                    },
                    _ => {
                        debug!(
                            node = %core.id(),
                            target_scope = %scope,
                            target_name = %name,
                            status = status.as_str(),
                            code = status.code(),
                            "link up rejected"
                        );
                        None
                    },
                };
                let _ = tasks.send(LifecycleTask::LinkUp {
                    link_id,
                    scope,
                    name,
                });
            },
            ControlResponse::LinkDown { status, link } => {
                if !status.is_success() {
                    debug!(
                        node = %core.id(),
                        link = link.name(),
                        status = status.as_str(),
                        "link down ignored"
                    );
                    continue;
                }
                let Some(link_id) = allocator.detach(core.slots(), &link) else {
                    warn!(node = %core.id(), link = link.name(), "link down for a link without slot");
                    continue;
                };
                let receiver = link.receiver();
                let _ = tasks.send(LifecycleTask::LinkDown {
                    link_id,
                    scope: receiver.scope().to_string(),
                    name: receiver.name().to_string(),
                });
            },
            ControlResponse::NodeExit => {
                let cleared = allocator.clear(core.slots());
                // Stops the data loop; it drains before signalling the
                // lifecycle worker.
                drop(stop_tx);
                let _ = tasks.send(LifecycleTask::Exit);
                debug!(node = %core.id(), cleared_links = cleared, "control loop finished");
                return;
            },
        }
        debug_assert!(core.slots().active() <= core.settings().max_link);
    }

    debug!(node = %core.id(), "control channel closed before node exit");
}
