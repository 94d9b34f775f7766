//! Typed error enums for graph and delegate operations.
//!
//! Only synchronous failures are typed. Graph-level outcomes of a request
//! (target missing, duplicate link, refused link, max links reached) reach
//! the node as `on_link_up(None, ..)` or a `false` delivery instead.

use thiserror::Error;

use crate::node::LinkId;

/// Errors produced by the [`crate::EventGraph`] handle.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Arbiter thread could not be spawned.
    #[error("failed to spawn event graph arbiter: {source}")]
    SpawnArbiter {
        /// I/O error returned by thread spawn.
        #[source]
        source: std::io::Error,
    },
    /// Arbiter thread is no longer receiving requests.
    #[error("event graph arbiter stopped")]
    ArbiterStopped,
    /// A live node already uses this `scope:name` identity.
    #[error("node '{node_id}' is already registered")]
    DuplicateNode {
        /// Colliding identity.
        node_id: String,
    },
    /// One of the node's loop threads could not be spawned.
    #[error("failed to spawn loops for node '{node_id}': {source}")]
    SpawnNode {
        /// Identity of the node being added.
        node_id: String,
        /// I/O error returned by thread spawn.
        #[source]
        source: std::io::Error,
    },
    /// `on_enter` did not complete within the wait budget.
    #[error("node '{node_id}' did not enter the graph within {timeout_ms}ms")]
    AddNodeTimedOut {
        /// Identity of the node being added.
        node_id: String,
        /// Timeout budget used while waiting.
        timeout_ms: u128,
    },
    /// `on_enter` panicked, or the node was dropped before entering.
    #[error("node '{node_id}' failed to enter the graph")]
    NodeEnterFailed {
        /// Identity of the node being added.
        node_id: String,
    },
    /// Stats query was not answered in time.
    #[error("graph stats query timed out after {timeout_ms}ms")]
    StatsTimedOut {
        /// Timeout budget used while waiting.
        timeout_ms: u128,
    },
}

/// Errors produced by [`crate::NodeDelegate`] requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegateError {
    #[error("link target scope and name must not be empty")]
    EmptyLinkTarget,
    #[error("link id {link_id} is out of range")]
    LinkIdOutOfRange { link_id: LinkId },
    #[error("link id {link_id} is not active")]
    LinkNotActive { link_id: LinkId },
    #[error("link id {link_id} is not an output link of this node")]
    NotOutputLink { link_id: LinkId },
    #[error("node is already exiting")]
    AlreadyExiting,
    #[error("event graph is closed")]
    GraphClosed,
}
