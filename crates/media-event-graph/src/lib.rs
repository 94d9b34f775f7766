//! Concurrent event-graph runtime for media processing sessions.
//!
//! A session is a directed graph of processing nodes (transcoders, fan-out,
//! RTP entry/exit points, command dispatchers). This crate owns the substrate
//! those nodes run on:
//!
//! - [`EventGraph`] is the arbiter. A single thread owns the global topology
//!   (registered nodes, live links, scope/name lookup) and applies add,
//!   link-up, link-down and exit requests strictly one at a time.
//! - [`NodeDelegate`] wraps one [`Node`]. It runs the node's control loop,
//!   its data loop and a lifecycle worker, and is the only handle through
//!   which node logic may link, deliver events or exit.
//! - [`Event`] is the envelope carried on data channels.
//!
//! ```text
//!  node logic ──request──▶ arbiter (one thread) ──response──▶ control loop
//!                                                              │
//!                                   lifecycle worker ◀─────────┘
//!                                   (on_enter / on_link_up / on_link_down / on_exit)
//!
//!  sender ──deliver(link)──▶ receiver data channel ──▶ data loop (on_event)
//! ```
//!
//! Panics inside node callbacks are caught per node: the crashed node stops
//! accepting events and is removed from the graph, and its senders observe
//! `on_link_down`. The rest of the graph keeps running.
#![deny(clippy::wildcard_imports)]

pub mod config;
pub mod delegate;
pub mod error;
pub mod event;
pub mod graph;
pub(crate) mod link;
pub mod node;
pub(crate) mod protocol;

pub use config::{GraphConfig, NodeProperties};
pub use delegate::NodeDelegate;
pub use error::{DelegateError, GraphError};
pub use event::{Event, EventCallback};
pub use graph::{EventGraph, GraphStats};
pub use node::{LinkId, Node};
