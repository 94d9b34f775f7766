//! Single-threaded arbiter applying topology requests in arrival order.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::delegate::{DelegateCore, PendingNode};
use crate::error::GraphError;
use crate::graph::topology::Topology;
use crate::link::{Link, link_name};
use crate::protocol::{AddNodeAck, ControlResponse, GraphRequest, LinkStatus};

/// Arbiter thread body. Returns once every graph handle and delegate is gone.
pub(crate) fn run_arbiter(rx: Receiver<GraphRequest>, ready_tx: Sender<()>) {
    let _ = ready_tx.send(());
    drop(ready_tx);

    let mut arbiter = Arbiter::default();
    while let Ok(request) = rx.recv() {
        arbiter.handle(request);
    }
    info!(
        nodes = arbiter.topology.stats().nodes,
        "event graph arbiter stopped"
    );
}

#[derive(Default)]
pub(crate) struct Arbiter {
    topology: Topology,
}

impl Arbiter {
    pub(crate) fn handle(&mut self, request: GraphRequest) {
        match request {
            GraphRequest::AddNode { pending, ack } => self.on_add_node(pending, ack),
            GraphRequest::LinkUp { from, scope, name } => self.on_link_up(&from, scope, name),
            GraphRequest::LinkDown { link } => self.on_link_down(link),
            GraphRequest::NodeExit { delegate } => self.on_node_exit(&delegate),
            GraphRequest::Stats { resp_tx } => {
                let _ = resp_tx.send(self.topology.stats());
            },
        }
    }

    fn on_add_node(&mut self, pending: PendingNode, ack: Option<AddNodeAck>) {
        let delegate = Arc::clone(pending.core());
        if self.topology.contains_node(delegate.id()) {
            warn!(node = %delegate.id(), "rejecting node with an identity already in the graph");
            reply_ack(
                ack,
                Err(GraphError::DuplicateNode {
                    node_id: delegate.id().to_string(),
                }),
            );
            return;
        }
        if let Err(source) = pending.start() {
            error!(node = %delegate.id(), message = %source, "failed to spawn node loops");
            reply_ack(
                ack,
                Err(GraphError::SpawnNode {
                    node_id: delegate.id().to_string(),
                    source,
                }),
            );
            return;
        }
        self.register(Arc::clone(&delegate));
        delegate.post_control(ControlResponse::NodeAdded { ack });
    }

    fn register(&mut self, delegate: Arc<DelegateCore>) {
        debug!(
            node = %delegate.id(),
            max_link = delegate.settings().max_link,
            data_channel_size = delegate.settings().data_channel_size,
            "node added"
        );
        self.topology.add_node(delegate);
    }

    fn on_link_up(&mut self, from: &Arc<DelegateCore>, scope: String, name: String) {
        let (status, link) = match self.try_link_up(from, &scope, &name) {
            Ok(link) => {
                debug!(link = link.name(), "link up");
                (LinkStatus::Success, Some(link))
            },
            Err(status) => (status, None),
        };
        from.post_control(ControlResponse::LinkUp {
            status,
            link,
            scope,
            name,
        });
    }

    fn try_link_up(
        &mut self,
        from: &Arc<DelegateCore>,
        scope: &str,
        name: &str,
    ) -> Result<Arc<Link>, LinkStatus> {
        let Some(info) = self.topology.node_info(from) else {
            return Err(LinkStatus::LinkRefuse);
        };
        if from.is_exiting() {
            return Err(LinkStatus::LinkRefuse);
        }
        if info.output_links.len() >= info.max_link {
            return Err(LinkStatus::NodeExceedMaxLink);
        }
        let Some(to) = self.topology.find_node(scope, name) else {
            return Err(LinkStatus::NodeNotExist);
        };
        if self
            .topology
            .contains_link_name(&link_name(from.scope(), from.name(), scope, name))
        {
            return Err(LinkStatus::LinkDuplicated);
        }
        if to.is_exiting() {
            return Err(LinkStatus::LinkRefuse);
        }
        let link = Arc::new(Link::new(Arc::clone(from), to));
        self.topology.insert_link(Arc::clone(&link));
        Ok(link)
    }

    fn on_link_down(&mut self, link: Arc<Link>) {
        let sender = Arc::clone(link.sender());
        if !self.topology.remove_link(&link) {
            debug!(link = link.name(), "link already torn down");
            sender.post_control(ControlResponse::LinkDown {
                status: LinkStatus::LinkNotExist,
                link,
            });
            return;
        }
        debug!(link = link.name(), "link down");
        sender.post_control(ControlResponse::LinkDown {
            status: LinkStatus::Success,
            link,
        });
    }

    /// Removes every link touching `delegate`, then the node itself.
    ///
    /// Senders of inbound links are told their link went down. Receivers of
    /// outbound links are not notified.
    fn on_node_exit(&mut self, delegate: &Arc<DelegateCore>) {
        let Some(info) = self.topology.node_info(delegate) else {
            debug!(node = %delegate.id(), "ignoring exit of unregistered node");
            return;
        };
        let inputs = info.input_links.clone();
        let outputs = info.output_links.clone();

        for link in inputs {
            if self.topology.remove_link(&link) {
                link.sender().post_control(ControlResponse::LinkDown {
                    status: LinkStatus::Success,
                    link: Arc::clone(&link),
                });
            }
        }
        for link in &outputs {
            self.topology.remove_link(link);
        }

        if let Some(info) = self.topology.node_info(delegate)
            && (!info.input_links.is_empty() || !info.output_links.is_empty())
        {
            panic!(
                "node '{}' still has {} input and {} output links after exit",
                delegate.id(),
                info.input_links.len(),
                info.output_links.len()
            );
        }

        self.topology.remove_node(delegate);
        debug!(node = %delegate.id(), outputs = outputs.len(), "node removed");
        delegate.post_control(ControlResponse::NodeExit);
    }
}

fn reply_ack(ack: Option<AddNodeAck>, result: Result<(), GraphError>) {
    if let Some(ack) = ack {
        let _ = ack.send(result);
    }
}
