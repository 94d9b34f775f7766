//! Arbiter-owned view of registered nodes and live links.

use std::collections::HashMap;
use std::sync::Arc;

use crate::delegate::DelegateCore;
use crate::graph::GraphStats;
use crate::link::Link;

pub(crate) struct NodeInfo {
    pub(crate) delegate: Arc<DelegateCore>,
    pub(crate) input_links: Vec<Arc<Link>>,
    pub(crate) output_links: Vec<Arc<Link>>,
    pub(crate) max_link: usize,
}

/// Positions of a link inside its sender's output list and its receiver's
/// input list.
struct LinkEntry {
    link: Arc<Link>,
    from_index: usize,
    to_index: usize,
}

#[derive(Default)]
pub(crate) struct Topology {
    scope_map: HashMap<String, Vec<Arc<DelegateCore>>>,
    node_map: HashMap<String, NodeInfo>,
    link_set: HashMap<String, LinkEntry>,
}

impl Topology {
    pub(crate) fn contains_node(&self, node_id: &str) -> bool {
        self.node_map.contains_key(node_id)
    }

    /// Bookkeeping of `delegate`, if that exact delegate is registered.
    pub(crate) fn node_info(&self, delegate: &Arc<DelegateCore>) -> Option<&NodeInfo> {
        self.node_map
            .get(delegate.id())
            .filter(|info| Arc::ptr_eq(&info.delegate, delegate))
    }

    pub(crate) fn find_node(&self, scope: &str, name: &str) -> Option<Arc<DelegateCore>> {
        self.scope_map
            .get(scope)?
            .iter()
            .find(|delegate| delegate.name() == name)
            .cloned()
    }

    pub(crate) fn add_node(&mut self, delegate: Arc<DelegateCore>) {
        self.scope_map
            .entry(delegate.scope().to_string())
            .or_default()
            .push(Arc::clone(&delegate));
        self.node_map.insert(
            delegate.id().to_string(),
            NodeInfo {
                max_link: delegate.settings().max_link,
                delegate,
                input_links: Vec::new(),
                output_links: Vec::new(),
            },
        );
    }

    pub(crate) fn remove_node(&mut self, delegate: &Arc<DelegateCore>) -> bool {
        if self.node_info(delegate).is_none() {
            return false;
        }
        if let Some(members) = self.scope_map.get_mut(delegate.scope()) {
            members.retain(|member| !Arc::ptr_eq(member, delegate));
            if members.is_empty() {
                self.scope_map.remove(delegate.scope());
            }
        }
        self.node_map.remove(delegate.id());
        true
    }

    pub(crate) fn contains_link_name(&self, name: &str) -> bool {
        self.link_set.contains_key(name)
    }

    /// True only for the exact link value currently registered under its name.
    pub(crate) fn contains_link(&self, link: &Arc<Link>) -> bool {
        self.link_set
            .get(link.name())
            .is_some_and(|entry| Arc::ptr_eq(&entry.link, link))
    }

    /// Registers `link` on both endpoints. Both must be registered nodes.
    pub(crate) fn insert_link(&mut self, link: Arc<Link>) {
        let outputs = &mut self.info_mut(link.sender()).output_links;
        let from_index = outputs.len();
        outputs.push(Arc::clone(&link));

        let inputs = &mut self.info_mut(link.receiver()).input_links;
        let to_index = inputs.len();
        inputs.push(Arc::clone(&link));

        self.link_set.insert(
            link.name().to_string(),
            LinkEntry {
                link,
                from_index,
                to_index,
            },
        );
    }

    /// Unregisters `link` from both endpoints in constant time.
    pub(crate) fn remove_link(&mut self, link: &Arc<Link>) -> bool {
        if !self.contains_link(link) {
            return false;
        }
        let Some(entry) = self.link_set.remove(link.name()) else {
            return false;
        };

        let outputs = &mut self.info_mut(link.sender()).output_links;
        debug_assert!(Arc::ptr_eq(&outputs[entry.from_index], link));
        outputs.swap_remove(entry.from_index);
        let moved = outputs.get(entry.from_index).cloned();
        if let Some(moved) = moved
            && let Some(moved_entry) = self.link_set.get_mut(moved.name())
        {
            moved_entry.from_index = entry.from_index;
        }

        let inputs = &mut self.info_mut(link.receiver()).input_links;
        debug_assert!(Arc::ptr_eq(&inputs[entry.to_index], link));
        inputs.swap_remove(entry.to_index);
        let moved = inputs.get(entry.to_index).cloned();
        if let Some(moved) = moved
            && let Some(moved_entry) = self.link_set.get_mut(moved.name())
        {
            moved_entry.to_index = entry.to_index;
        }
        true
    }

    pub(crate) fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.node_map.len(),
            links: self.link_set.len(),
            scopes: self.scope_map.len(),
        }
    }

    fn info_mut(&mut self, delegate: &Arc<DelegateCore>) -> &mut NodeInfo {
        match self.node_map.get_mut(delegate.id()) {
            Some(info) if Arc::ptr_eq(&info.delegate, delegate) => info,
            _ => panic!("link endpoint '{}' is not registered", delegate.id()),
        }
    }

    /// Asserts that every link sits at its recorded positions.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for (name, entry) in &self.link_set {
            assert_eq!(name, entry.link.name());
            let sender = &self.node_map[entry.link.sender().id()];
            let receiver = &self.node_map[entry.link.receiver().id()];
            assert!(Arc::ptr_eq(&sender.output_links[entry.from_index], &entry.link));
            assert!(Arc::ptr_eq(&receiver.input_links[entry.to_index], &entry.link));
        }
        let outputs: usize = self.node_map.values().map(|info| info.output_links.len()).sum();
        let inputs: usize = self.node_map.values().map(|info| info.input_links.len()).sum();
        assert_eq!(outputs, self.link_set.len());
        assert_eq!(inputs, self.link_set.len());
    }
}
