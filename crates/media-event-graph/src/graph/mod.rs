//! Graph handle and arbiter thread.

mod arbiter;
mod topology;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::debug;

use crate::config::GraphConfig;
use crate::delegate::PendingNode;
use crate::error::GraphError;
use crate::link::node_key;
use crate::node::Node;
use crate::protocol::{AddNodeAck, GraphRequest};

/// Point-in-time counts of the arbiter's topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub nodes: usize,
    pub links: usize,
    pub scopes: usize,
}

/// Handle to a running event graph.
///
/// Cloning is cheap; all clones feed the same arbiter. The arbiter thread
/// finishes once every handle and every node delegate has been dropped.
#[derive(Clone)]
pub struct EventGraph {
    tx: Sender<GraphRequest>,
    config: Arc<GraphConfig>,
}

impl EventGraph {
    pub fn new() -> Result<Self, GraphError> {
        Self::with_config(GraphConfig::default())
    }

    /// Starts the arbiter thread and waits until it accepts requests.
    pub fn with_config(config: GraphConfig) -> Result<Self, GraphError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("graph-arbiter".to_string())
            .spawn(move || arbiter::run_arbiter(rx, ready_tx))
            .map_err(|source| GraphError::SpawnArbiter { source })?;
        ready_rx.recv().map_err(|_| GraphError::ArbiterStopped)?;
        debug!(
            max_link = config.max_link,
            data_channel_size = config.data_channel_size,
            delivery_timeout_ms = config.delivery_timeout.as_millis(),
            "event graph started"
        );
        Ok(Self {
            tx,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Submits `node` without waiting for it to enter.
    ///
    /// A rejected node (duplicate identity, spawn failure) is logged and
    /// dropped; use [`Self::add_node_and_wait`] to observe the outcome.
    pub fn add_node(&self, node: Arc<dyn Node>) -> Result<(), GraphError> {
        self.submit_node(node, None)
    }

    /// Submits `node` and waits until its `on_enter` returned.
    pub fn add_node_and_wait(&self, node: Arc<dyn Node>, timeout: Duration) -> Result<(), GraphError> {
        let node_id = node_key(node.scope(), node.name());
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.submit_node(node, Some(ack_tx))?;
        match ack_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(GraphError::AddNodeTimedOut {
                node_id,
                timeout_ms: timeout.as_millis(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(GraphError::NodeEnterFailed { node_id }),
        }
    }

    /// [`Self::add_node_and_wait`] with [`GraphConfig::add_node_timeout`].
    pub fn add_node_with_default_timeout(&self, node: Arc<dyn Node>) -> Result<(), GraphError> {
        self.add_node_and_wait(node, self.config.add_node_timeout)
    }

    /// Counts of registered nodes, live links and non-empty scopes.
    pub fn stats(&self, timeout: Duration) -> Result<GraphStats, GraphError> {
        let (resp_tx, resp_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(GraphRequest::Stats { resp_tx })
            .map_err(|_| GraphError::ArbiterStopped)?;
        resp_rx.recv_timeout(timeout).map_err(|error| match error {
            RecvTimeoutError::Timeout => GraphError::StatsTimedOut {
                timeout_ms: timeout.as_millis(),
            },
            RecvTimeoutError::Disconnected => GraphError::ArbiterStopped,
        })
    }

    fn submit_node(&self, node: Arc<dyn Node>, ack: Option<AddNodeAck>) -> Result<(), GraphError> {
        let settings = node.properties().resolve(&self.config);
        let pending = PendingNode::new(node, settings, self.tx.clone());
        self.tx
            .send(GraphRequest::AddNode { pending, ack })
            .map_err(|_| GraphError::ArbiterStopped)
    }
}

impl std::fmt::Debug for EventGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventGraph")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "../tests/graph/mod.rs"]
mod tests;
