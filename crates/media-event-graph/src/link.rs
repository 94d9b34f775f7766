//! Directed link between two delegates.

use std::fmt;
use std::sync::Arc;

use crate::delegate::DelegateCore;

/// Builds the unique `scope:name` identity of a node.
pub(crate) fn node_key(scope: &str, name: &str) -> String {
    format!("{scope}:{name}")
}

/// Builds the de-duplication key `fromScope:fromName#toScope:toName`.
pub(crate) fn link_name(from_scope: &str, from_name: &str, to_scope: &str, to_name: &str) -> String {
    format!("{from_scope}:{from_name}#{to_scope}:{to_name}")
}

/// One-way edge; events flow from `from` to `to` only.
///
/// The value is immutable once created. Positions inside each endpoint's
/// bookkeeping are tracked by the arbiter.
pub(crate) struct Link {
    name: String,
    from: Arc<DelegateCore>,
    to: Arc<DelegateCore>,
}

impl Link {
    pub(crate) fn new(from: Arc<DelegateCore>, to: Arc<DelegateCore>) -> Self {
        let name = link_name(from.scope(), from.name(), to.scope(), to.name());
        Self { name, from, to }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn sender(&self) -> &Arc<DelegateCore> {
        &self.from
    }

    pub(crate) fn receiver(&self) -> &Arc<DelegateCore> {
        &self.to
    }

    pub(crate) fn is_sent_by(&self, core: &DelegateCore) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.from), core)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Link").field(&self.name).finish()
    }
}
