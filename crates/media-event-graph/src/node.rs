//! Node contract implemented by graph participants.

use crate::config::NodeProperties;
use crate::delegate::NodeDelegate;
use crate::event::Event;

/// Index of an outgoing link slot, local to one node.
pub type LinkId = usize;

/// User logic hosted by the graph.
///
/// Identity is the `(scope, name)` pair and must be unique among live nodes.
///
/// Two callback families run on different threads and may interleave:
/// - `on_event` runs on the data loop, strictly sequentially;
/// - `on_enter`, `on_link_up`, `on_link_down` and `on_exit` run on the
///   lifecycle worker, never concurrently with each other.
///
/// A panic in any callback is caught; the node is then removed from the graph.
pub trait Node: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn scope(&self) -> &str;

    fn on_event(&self, event: Event);

    /// Result of a [`NodeDelegate::request_link_up`]; `None` when the link
    /// could not be created for any reason.
    fn on_link_up(&self, _link_id: Option<LinkId>, _scope: &str, _name: &str) {}

    /// An outgoing link went down, either on request or because its receiver
    /// left the graph.
    fn on_link_down(&self, _link_id: LinkId, _scope: &str, _name: &str) {}

    /// Called once the node is registered. The only place a node receives its
    /// delegate.
    fn on_enter(&self, delegate: NodeDelegate);

    /// Final callback, after every accepted event was handled.
    fn on_exit(&self) {}

    /// Overrides read once when the node is added.
    fn properties(&self) -> NodeProperties {
        NodeProperties::default()
    }
}
