//! Graph-wide defaults and per-node overrides.
//!
//! [`GraphConfig`] carries the defaults every node starts from. A node may
//! override some of them through [`NodeProperties`], which the graph reads
//! exactly once when the node is added; changing a node's properties after
//! that has no effect.

use std::time::Duration;

/// Default maximum number of outgoing links per node.
pub const DEFAULT_MAX_LINK: usize = 4;
/// Default capacity of a node's data channel.
pub const DEFAULT_DATA_CHANNEL_SIZE: usize = 128;
/// Largest data channel a node gets; bigger requests are clamped to it.
///
/// The channel buffer is allocated in full when the node starts.
pub const MAX_DATA_CHANNEL_SIZE: usize = 65_536;
/// Default time a delivery may block on a full receiver.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(100);
/// Default poll interval of a stopping data loop while deliveries are in flight.
pub const DEFAULT_EXIT_DRAIN_POLL: Duration = Duration::from_millis(50);
/// Default wait budget of [`crate::EventGraph::add_node_with_default_timeout`].
pub const DEFAULT_ADD_NODE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub max_link: usize,
    pub data_channel_size: usize,
    pub delivery_timeout: Duration,
    pub exit_drain_poll: Duration,
    pub add_node_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_link: DEFAULT_MAX_LINK,
            data_channel_size: DEFAULT_DATA_CHANNEL_SIZE,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            exit_drain_poll: DEFAULT_EXIT_DRAIN_POLL,
            add_node_timeout: DEFAULT_ADD_NODE_TIMEOUT,
        }
    }
}

/// Optional per-node overrides of [`GraphConfig`] defaults.
///
/// Nodes usually embed a `NodeProperties` value and return a copy of it from
/// [`crate::Node::properties`]. Unset or zero values fall back to the graph
/// defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeProperties {
    max_link: Option<usize>,
    data_channel_size: Option<usize>,
    delivery_timeout: Option<Duration>,
}

impl NodeProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_link(&mut self, max_link: usize) {
        self.max_link = Some(max_link);
    }

    /// Values above [`MAX_DATA_CHANNEL_SIZE`] are clamped when the node is added.
    pub fn set_data_channel_size(&mut self, size: usize) {
        self.data_channel_size = Some(size);
    }

    pub fn set_delivery_timeout(&mut self, timeout: Duration) {
        self.delivery_timeout = Some(timeout);
    }

    pub fn with_max_link(mut self, max_link: usize) -> Self {
        self.set_max_link(max_link);
        self
    }

    /// See [`NodeProperties::set_data_channel_size`].
    pub fn with_data_channel_size(mut self, size: usize) -> Self {
        self.set_data_channel_size(size);
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.set_delivery_timeout(timeout);
        self
    }

    pub fn max_link(&self) -> Option<usize> {
        self.max_link
    }

    pub fn data_channel_size(&self) -> Option<usize> {
        self.data_channel_size
    }

    pub fn delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout
    }

    /// Merges these overrides into the graph defaults.
    pub(crate) fn resolve(&self, config: &GraphConfig) -> DelegateSettings {
        DelegateSettings {
            max_link: self
                .max_link
                .filter(|value| *value > 0)
                .unwrap_or(config.max_link),
            data_channel_size: self
                .data_channel_size
                .filter(|value| *value > 0)
                .unwrap_or(config.data_channel_size)
                .clamp(1, MAX_DATA_CHANNEL_SIZE),
            delivery_timeout: self
                .delivery_timeout
                .filter(|value| !value.is_zero())
                .unwrap_or(config.delivery_timeout),
            exit_drain_poll: config.exit_drain_poll.max(Duration::from_millis(1)),
        }
    }
}

/// Effective settings of one delegate, fixed for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelegateSettings {
    pub(crate) max_link: usize,
    pub(crate) data_channel_size: usize,
    pub(crate) delivery_timeout: Duration,
    pub(crate) exit_drain_poll: Duration,
}
