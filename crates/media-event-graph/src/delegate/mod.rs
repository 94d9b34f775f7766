//! Per-node runtime: the delegate handle and the loops that host a node.
//!
//! Each added node gets three named threads:
//! - the control loop applies arbiter responses to the node's link slots,
//! - the data loop runs `on_event` for every accepted event,
//! - the lifecycle worker runs `on_enter`, `on_link_up`, `on_link_down` and
//!   `on_exit` one at a time.
//!
//! The control loop owns slot mutation; deliveries from other nodes only read
//! the slot table and never block on it.

mod data_loop;
mod lifecycle;
mod slots;
mod system_loop;

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use tracing::trace;

use crate::config::DelegateSettings;
use crate::error::DelegateError;
use crate::event::Event;
use crate::link::node_key;
use crate::node::{LinkId, Node};
use crate::protocol::{ControlResponse, GraphRequest};

pub(crate) use slots::{LinkSlots, SlotAllocator};

/// Shared state of one delegate.
///
/// Referenced by links, the arbiter's topology and the node's own loops. It
/// never references the node itself.
pub(crate) struct DelegateCore {
    id: String,
    scope: String,
    name: String,
    settings: DelegateSettings,
    graph_tx: Sender<GraphRequest>,
    ctrl_tx: Sender<ControlResponse>,
    data_tx: Sender<Event>,
    exiting: AtomicBool,
    in_flight: AtomicUsize,
    slots: LinkSlots,
}

/// Receiving ends handed to the control and data loops on start.
pub(crate) struct DelegateChannels {
    pub(crate) ctrl_rx: Receiver<ControlResponse>,
    pub(crate) data_rx: Receiver<Event>,
}

impl DelegateCore {
    pub(crate) fn new(
        scope: &str,
        name: &str,
        settings: DelegateSettings,
        graph_tx: Sender<GraphRequest>,
    ) -> (Arc<Self>, DelegateChannels) {
        let (ctrl_tx, ctrl_rx) = crossbeam_channel::unbounded();
        let (data_tx, data_rx) = crossbeam_channel::bounded(settings.data_channel_size);
        let core = Arc::new(Self {
            id: node_key(scope, name),
            scope: scope.to_string(),
            name: name.to_string(),
            settings,
            graph_tx,
            ctrl_tx,
            data_tx,
            exiting: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            slots: LinkSlots::with_capacity(settings.max_link),
        });
        (core, DelegateChannels { ctrl_rx, data_rx })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn scope(&self) -> &str {
        &self.scope
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn settings(&self) -> &DelegateSettings {
        &self.settings
    }

    pub(crate) fn slots(&self) -> &LinkSlots {
        &self.slots
    }

    pub(crate) fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Posts an arbiter response to this node's control loop.
    ///
    /// Never blocks. Responses to a node whose control loop already finished
    /// are dropped.
    pub(crate) fn post_control(&self, response: ControlResponse) {
        if self.ctrl_tx.send(response).is_err() {
            trace!(node = %self.id, "control loop gone, dropping response");
        }
    }

    fn submit(&self, request: GraphRequest) -> Result<(), DelegateError> {
        self.graph_tx
            .send(request)
            .map_err(|_| DelegateError::GraphClosed)
    }

    /// Enqueues `event` on this node's data channel.
    ///
    /// Waits at most `timeout` when the channel is full. Returns `false` when
    /// the node is exiting, its data loop is gone, or the wait elapsed.
    pub(crate) fn receive_data(&self, event: Event, timeout: Duration) -> bool {
        // The counter is raised before the exit flag is read so a stopping
        // data loop either sees this delivery in flight or the delivery sees
        // the flag.
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let accepted = if self.exiting.load(Ordering::SeqCst) {
            false
        } else {
            match self.data_tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Disconnected(_)) => false,
                Err(TrySendError::Full(event)) => match self.data_tx.send_timeout(event, timeout) {
                    Ok(()) => true,
                    Err(SendTimeoutError::Timeout(_)) => {
                        trace!(node = %self.id, timeout_ms = timeout.as_millis(), "delivery timed out");
                        false
                    },
                    Err(SendTimeoutError::Disconnected(_)) => false,
                },
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        accepted
    }
}

/// A node accepted by the graph handle but not yet started by the arbiter.
pub(crate) struct PendingNode {
    node: Arc<dyn Node>,
    core: Arc<DelegateCore>,
    channels: DelegateChannels,
}

impl PendingNode {
    pub(crate) fn new(
        node: Arc<dyn Node>,
        settings: DelegateSettings,
        graph_tx: Sender<GraphRequest>,
    ) -> Self {
        let (core, channels) = DelegateCore::new(node.scope(), node.name(), settings, graph_tx);
        Self {
            node,
            core,
            channels,
        }
    }

    pub(crate) fn core(&self) -> &Arc<DelegateCore> {
        &self.core
    }

    /// Spawns the lifecycle worker, data loop and control loop.
    ///
    /// When a later spawn fails, the threads already running observe their
    /// channels disconnect and finish without calling into the node.
    pub(crate) fn start(self) -> std::io::Result<()> {
        let Self {
            node,
            core,
            channels,
        } = self;
        let DelegateChannels { ctrl_rx, data_rx } = channels;
        let delegate = NodeDelegate::new(Arc::clone(&core));
        let (task_tx, task_rx) = crossbeam_channel::unbounded();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        {
            let node = Arc::clone(&node);
            let delegate = delegate.clone();
            spawn_named(format!("graph-life-{}", core.id()), move || {
                lifecycle::run_lifecycle_worker(node, delegate, task_rx, done_rx)
            })?;
        }
        spawn_named(format!("graph-data-{}", core.id()), move || {
            data_loop::run_data_loop(node, delegate, data_rx, stop_rx, done_tx)
        })?;
        spawn_named(format!("graph-ctrl-{}", core.id()), move || {
            system_loop::run_system_loop(core, ctrl_rx, task_tx, stop_tx)
        })?;
        Ok(())
    }
}

fn spawn_named<F>(name: String, body: F) -> std::io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).spawn(body).map(|_| ())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle through which node logic talks to the graph.
///
/// Handed to the node in [`Node::on_enter`]. Cheap to clone; every clone
/// refers to the same delegate.
///
/// Link and exit requests are asynchronous: their outcome arrives later as
/// [`Node::on_link_up`], [`Node::on_link_down`] or [`Node::on_exit`].
/// Deliveries are synchronous and may block up to the delivery timeout.
#[derive(Clone)]
pub struct NodeDelegate {
    core: Arc<DelegateCore>,
}

impl NodeDelegate {
    pub(crate) fn new(core: Arc<DelegateCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<DelegateCore> {
        &self.core
    }

    /// `scope:name` identity of the node.
    pub fn id(&self) -> &str {
        self.core.id()
    }

    pub fn scope(&self) -> &str {
        self.core.scope()
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn is_exiting(&self) -> bool {
        self.core.is_exiting()
    }

    pub fn max_link(&self) -> usize {
        self.core.settings().max_link
    }

    pub fn data_channel_size(&self) -> usize {
        self.core.settings().data_channel_size
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.core.settings().delivery_timeout
    }

    /// Asks the graph for a link from this node to `scope:name`.
    ///
    /// The outcome is reported through [`Node::on_link_up`], with `None` for
    /// every rejection.
    pub fn request_link_up(&self, scope: &str, name: &str) -> Result<(), DelegateError> {
        if scope.is_empty() || name.is_empty() {
            return Err(DelegateError::EmptyLinkTarget);
        }
        self.core.submit(GraphRequest::LinkUp {
            from: Arc::clone(&self.core),
            scope: scope.to_string(),
            name: name.to_string(),
        })
    }

    /// Asks the graph to tear down the outgoing link in slot `link_id`.
    pub fn request_link_down(&self, link_id: LinkId) -> Result<(), DelegateError> {
        let slots = self.core.slots();
        if link_id >= slots.len() {
            return Err(DelegateError::LinkIdOutOfRange { link_id });
        }
        let Some(link) = slots.get(link_id) else {
            return Err(DelegateError::LinkNotActive { link_id });
        };
        if !link.is_sent_by(&self.core) {
            return Err(DelegateError::NotOutputLink { link_id });
        }
        self.core.submit(GraphRequest::LinkDown { link })
    }

    /// Asks the graph to remove this node.
    ///
    /// Only the first call across all clones and threads is forwarded; later
    /// calls return [`DelegateError::AlreadyExiting`]. From this point the
    /// node accepts no new events.
    pub fn request_node_exit(&self) -> Result<(), DelegateError> {
        if self.core.exiting.swap(true, Ordering::SeqCst) {
            return Err(DelegateError::AlreadyExiting);
        }
        self.core.submit(GraphRequest::NodeExit {
            delegate: Arc::clone(&self.core),
        })
    }

    /// Delivers `event` over the outgoing link `link_id` with the node's
    /// delivery timeout.
    pub fn deliver(&self, link_id: LinkId, event: Event) -> bool {
        self.deliver_with_timeout(link_id, event, self.core.settings().delivery_timeout)
    }

    /// Delivers `event` over the outgoing link `link_id`.
    ///
    /// Returns `false` when the slot is empty, the receiver is exiting, or
    /// the receiver stayed full for `timeout`.
    pub fn deliver_with_timeout(&self, link_id: LinkId, event: Event, timeout: Duration) -> bool {
        let Some(link) = self.core.slots().get(link_id) else {
            return false;
        };
        if !link.is_sent_by(&self.core) {
            return false;
        }
        link.receiver().receive_data(event, timeout)
    }

    /// Enqueues `event` on this node's own data channel.
    pub fn deliver_self(&self, event: Event) -> bool {
        self.core
            .receive_data(event, self.core.settings().delivery_timeout)
    }
}

impl fmt::Debug for NodeDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDelegate")
            .field("id", &self.core.id())
            .field("exiting", &self.core.is_exiting())
            .finish_non_exhaustive()
    }
}

/// Builds a core whose graph channel has no arbiter behind it.
#[cfg(test)]
pub(crate) fn test_core(
    scope: &str,
    name: &str,
    max_link: usize,
) -> (Arc<DelegateCore>, DelegateChannels) {
    use crate::config::{GraphConfig, NodeProperties};

    let settings = NodeProperties::new()
        .with_max_link(max_link)
        .resolve(&GraphConfig::default());
    let (graph_tx, _graph_rx) = crossbeam_channel::unbounded();
    DelegateCore::new(scope, name, settings, graph_tx)
}
